//! Environment variable overrides, applied after the config file is read.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

use super::Config;

pub const ENV_STORE_NAME: &str = "DARKROOM_STORE_NAME";
pub const ENV_STORE_ROOT: &str = "DARKROOM_STORE_ROOT";
pub const ENV_TARGET_PIXELS: &str = "DARKROOM_TARGET_PIXELS";
pub const ENV_GRAYSCALE: &str = "DARKROOM_GRAYSCALE";
pub const ENV_ALLOWED_EXTENSIONS: &str = "DARKROOM_ALLOWED_EXTENSIONS";
pub const ENV_BACKGROUND_COLOR: &str = "DARKROOM_BACKGROUND_COLOR";

impl Config {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_STORE_NAME) {
            self.store.name = name;
        }
        if let Some(root) = lookup(ENV_STORE_ROOT) {
            self.store.root = PathBuf::from(root);
        }
        if let Some(raw) = lookup(ENV_TARGET_PIXELS) {
            self.tensor.target_pixels = parse_var(ENV_TARGET_PIXELS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_GRAYSCALE) {
            self.tensor.grayscale = parse_bool(&raw).ok_or_else(|| ConfigError::Env {
                var: ENV_GRAYSCALE.to_string(),
                message: format!("expected a boolean, got '{raw}'"),
            })?;
        }
        if let Some(raw) = lookup(ENV_ALLOWED_EXTENSIONS) {
            self.ingest.allowed_extensions = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(normalize_extension)
                .collect();
        }
        if let Some(raw) = lookup(ENV_BACKGROUND_COLOR) {
            self.tensor.background_color = parse_rgb(&raw)?;
        }
        Ok(())
    }
}

fn parse_var<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `.JPG`, `jpg` and ` .jpg ` all become `.jpg`.
fn normalize_extension(ext: &str) -> String {
    let lower = ext.to_ascii_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

fn parse_rgb(raw: &str) -> Result<[u8; 3], ConfigError> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(ConfigError::Env {
            var: ENV_BACKGROUND_COLOR.to_string(),
            message: format!("expected 'r,g,b', got '{raw}'"),
        });
    }
    let mut rgb = [0u8; 3];
    for (slot, part) in rgb.iter_mut().zip(parts) {
        *slot = parse_var(ENV_BACKGROUND_COLOR, part)?;
    }
    Ok(rgb)
}
