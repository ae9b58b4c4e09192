//! Configuration management for Darkroom.
//!
//! Configuration is loaded from the platform config directory, then
//! environment overrides are applied, then the result is validated.

mod env;
mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Darkroom.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Object store settings
    pub store: StoreConfig,

    /// Ingest settings
    pub ingest: IngestConfig,

    /// Grayscale transcode settings
    pub transcode: TranscodeConfig,

    /// Tensor derivation settings
    pub tensor: TensorConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Local router settings
    pub pipeline: PipelineConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location plus environment overrides.
    ///
    /// Returns the default configuration (still env-overridden) if the file
    /// doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let base = if path.exists() {
            Self::read_file(&path)?
        } else {
            Self::default()
        };
        base.finish()
    }

    /// Load configuration from a specific file path plus environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::read_file(path)?.finish()
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn finish(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        self.validate()?;
        Ok(self)
    }

    /// Get the default config file path.
    ///
    /// Falls back to ~/.darkroom/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "darkroom", "darkroom")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".darkroom").join("config.toml")
            })
    }

    /// Get the resolved filesystem store root (with ~ expansion).
    pub fn store_root(&self) -> PathBuf {
        let path_str = self.store.root.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
