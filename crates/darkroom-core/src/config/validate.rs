//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "store.name must not be empty".into(),
            ));
        }
        if self.ingest.allowed_extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "ingest.allowed_extensions must not be empty".into(),
            ));
        }
        if let Some(bad) = self
            .ingest
            .allowed_extensions
            .iter()
            .find(|ext| !ext.starts_with('.') || ext.len() < 2)
        {
            return Err(ConfigError::ValidationError(format!(
                "ingest.allowed_extensions entry '{bad}' must look like '.ext'"
            )));
        }
        if self.transcode.marker.is_empty() || self.transcode.marker.contains('.') {
            return Err(ConfigError::ValidationError(
                "transcode.marker must be non-empty and contain no '.'".into(),
            ));
        }
        if image::ImageFormat::from_extension(&self.transcode.fallback_format).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "transcode.fallback_format '{}' is not a known image format",
                self.transcode.fallback_format
            )));
        }
        if self.tensor.target_pixels == 0 {
            return Err(ConfigError::ValidationError(
                "tensor.target_pixels must be > 0".into(),
            ));
        }
        if self.tensor.target_pixels > self.limits.max_image_dimension {
            return Err(ConfigError::ValidationError(format!(
                "tensor.target_pixels ({}) must not exceed limits.max_image_dimension ({})",
                self.tensor.target_pixels, self.limits.max_image_dimension
            )));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.pipeline.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.parallel_workers must be > 0".into(),
            ));
        }
        if self.pipeline.buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.buffer_size must be > 0".into(),
            ));
        }
        Ok(())
    }
}
