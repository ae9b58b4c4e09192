//! Error types for the Darkroom ingestion pipeline.
//!
//! Errors are split by concern so callers can tell a transient storage fault
//! (retry it) from a permanently bad object (dead-letter it). Expected skips
//! such as a disallowed extension are not errors at all; they are reported
//! through [`crate::types::ProcessingStatus`].

use thiserror::Error;

/// Top-level error type for Darkroom operations.
#[derive(Error, Debug)]
pub enum DarkroomError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Object store errors raised outside a pipeline stage
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Metadata record errors
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// An environment override could not be parsed
    #[error("Invalid value for {var}: {message}")]
    Env { var: String, message: String },

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Object store failures.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The key does not exist
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// The store could not serve the request right now
    #[error("Store unavailable during {operation} on {key}: {message}")]
    Unavailable {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// Underlying I/O failure of a local backend
    #[error("IO error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The key is not a valid `namespace/name` path
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// Whether the caller's retry policy should try again.
    ///
    /// Missing keys and malformed keys will not fix themselves.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Unavailable { .. } => true,
            StorageError::Io { source, .. } => !matches!(
                source.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::InvalidInput
            ),
            StorageError::NotFound { .. } | StorageError::InvalidKey(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {key}: {message}")]
    Decode { key: String, message: String },

    /// Re-encoding a derived image failed
    #[error("Encode error for {key}: {message}")]
    Encode { key: String, message: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {key} after {timeout_ms}ms")]
    Timeout {
        key: String,
        stage: String,
        timeout_ms: u64,
    },

    /// Object exceeds size limit
    #[error("Object too large: {key} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        key: String,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {key} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        key: String,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Stage configuration is unusable
    #[error("Validation error: {0}")]
    Validation(String),

    /// A stage tried to write into a namespace it does not own
    #[error("Refusing to write {key}: namespace {namespace} is not owned by {stage}")]
    ForbiddenNamespace {
        key: String,
        namespace: String,
        stage: String,
    },

    /// Storage failure while the stage was running
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Metadata store failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MetadataError {
    /// No record carries this file name
    #[error("No metadata record for file name: {file_name}")]
    NotFound { file_name: String },

    /// The file name is unusable as a record key
    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),
}

impl PipelineError {
    /// Whether the failure is worth handing back to a retry policy.
    ///
    /// Only storage hiccups and timeouts qualify; a corrupt image stays
    /// corrupt no matter how often it is decoded.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Storage(e) => e.is_transient(),
            PipelineError::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Convenience type alias for Darkroom results.
pub type Result<T> = std::result::Result<T, DarkroomError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Convenience type alias for metadata store results.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Convenience type alias for object store results.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
