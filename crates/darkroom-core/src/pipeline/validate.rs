//! Stage entry checks and pre-decode validation.
//!
//! Every stage calls [`Admission::admit`] exactly once on entry. It either
//! hands back the object to work on or the skip status to report; nothing
//! else in a stage re-checks namespace, folder markers, extensions or
//! derived markers.

use crate::config::LimitsConfig;
use crate::error::PipelineError;
use crate::types::{ObjectEvent, ObjectRef, ProcessingStatus, Stage};

/// Lowercased extension including the leading dot, if the name has one.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

/// Name with its final extension removed (`a/b.png` -> `a/b`).
pub fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() && !stem.ends_with('/') => stem,
        _ => name,
    }
}

/// Whether `file_name` already carries `marker` immediately before its extension.
pub fn has_marker(file_name: &str, marker: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((stem, _)) => stem.ends_with(marker),
        None => false,
    }
}

/// Entry predicate for one stage.
#[derive(Debug, Clone)]
pub struct Admission {
    stage: Stage,
    store_name: String,
    allowed_extensions: Vec<String>,
    derived_marker: Option<String>,
}

impl Admission {
    pub fn new(stage: Stage, store_name: impl Into<String>, allowed_extensions: &[String]) -> Self {
        Self {
            stage,
            store_name: store_name.into(),
            allowed_extensions: allowed_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            derived_marker: None,
        }
    }

    /// Also skip inputs whose filename carries `marker`.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.derived_marker = Some(marker.into());
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Decide whether this stage should process `event`.
    ///
    /// Order matters: foreign store, then namespace, then folder marker, then
    /// derived marker, then extension. A marked file with a valid extension is
    /// reported as already processed, not as an extension problem.
    pub fn admit(&self, event: &ObjectEvent) -> Result<ObjectRef, ProcessingStatus> {
        if event.store != self.store_name {
            return Err(ProcessingStatus::SkippedForeignStore);
        }
        if event.namespace != self.stage.watches() {
            return Err(ProcessingStatus::SkippedWrongNamespace);
        }
        let object = event.object();
        if object.is_folder_marker() {
            return Err(ProcessingStatus::SkippedFolder);
        }
        if let Some(marker) = &self.derived_marker {
            if has_marker(object.file_name(), marker) {
                return Err(ProcessingStatus::SkippedAlreadyProcessed);
            }
        }
        if !self.extension_allowed(object.file_name()) {
            return Err(ProcessingStatus::SkippedInvalidExtension);
        }
        Ok(object)
    }

    pub fn extension_allowed(&self, file_name: &str) -> bool {
        extension_of(file_name).is_some_and(|ext| self.allowed_extensions.contains(&ext))
    }
}

/// Refuse writes outside the namespace `stage` owns.
pub fn guard_write(stage: Stage, target: &ObjectRef) -> Result<(), PipelineError> {
    if target.namespace != stage.owns() {
        return Err(PipelineError::ForbiddenNamespace {
            key: target.key(),
            namespace: target.namespace.to_string(),
            stage: stage.to_string(),
        });
    }
    Ok(())
}

/// Validates object bytes before a full decode.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Quick checks before decode: size limit and JPEG/PNG magic bytes.
    pub fn validate(&self, key: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        let max_bytes = self.limits.max_file_size_mb.saturating_mul(1024 * 1024);
        if bytes.len() as u64 > max_bytes {
            return Err(PipelineError::FileTooLarge {
                key: key.to_string(),
                size_mb: bytes.len() as u64 / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        if bytes.len() < 4 {
            return Err(PipelineError::Decode {
                key: key.to_string(),
                message: "Object too small to be a valid image".to_string(),
            });
        }

        if !Self::is_supported_header(bytes) {
            return Err(PipelineError::Decode {
                key: key.to_string(),
                message: "Unrecognized image format (invalid magic bytes)".to_string(),
            });
        }

        Ok(())
    }

    /// JPEG (`FF D8 FF`) or PNG (`89 P N G`).
    fn is_supported_header(header: &[u8]) -> bool {
        if header.len() < 4 {
            return false;
        }
        if header[0] == 0xFF && header[1] == 0xD8 && header[2] == 0xFF {
            return true;
        }
        header[0] == 0x89 && header[1] == b'P' && header[2] == b'N' && header[3] == b'G'
    }
}
