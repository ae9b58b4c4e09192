//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store identity; events from any other store are ignored
    pub name: String,

    /// Root directory of the filesystem store
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "darkroom".to_string(),
            root: PathBuf::from("~/.darkroom/store"),
        }
    }
}

/// Digest used to name canonical objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// 128-bit MD5, hex encoded (32 chars)
    #[default]
    Md5,
    /// 256-bit BLAKE3, hex encoded (64 chars)
    Blake3,
}

/// IngestGate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Accepted filename extensions, with leading dot, compared case-insensitively
    pub allowed_extensions: Vec<String>,

    /// Digest used for canonical keys
    pub hash_algorithm: HashAlgorithm,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec![".jpg".to_string(), ".jpeg".to_string(), ".png".to_string()],
            hash_algorithm: HashAlgorithm::default(),
        }
    }
}

/// Transcoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Infix placed immediately before the extension of derived keys
    pub marker: String,

    /// Container format used when the source format cannot be determined
    pub fallback_format: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            marker: "_mono".to_string(),
            fallback_format: "png".to_string(),
        }
    }
}

/// Tensorizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorConfig {
    /// Side length of the square output canvas
    pub target_pixels: u32,

    /// Emit a single channel instead of RGB
    pub grayscale: bool,

    /// Canvas fill color around the resized image
    pub background_color: [u8; 3],
}

impl Default for TensorConfig {
    fn default() -> Self {
        Self {
            target_pixels: 500,
            grayscale: false,
            background_color: [0, 0, 0],
        }
    }
}

impl TensorConfig {
    pub fn channels(&self) -> usize {
        if self.grayscale {
            1
        } else {
            3
        }
    }

    /// Number of floats in one serialized tensor.
    pub fn tensor_len(&self) -> usize {
        let side = self.target_pixels as usize;
        side * side * self.channels()
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum object size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
        }
    }
}

/// Local router settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Events handled concurrently
    pub parallel_workers: usize,

    /// Max notifications queued between stages
    pub buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 4,
            buffer_size: 100,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
