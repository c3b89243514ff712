//! Configuration management for Postcraft.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. All config structs implement `Default`.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Postcraft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-provider credentials, endpoints and generation defaults
    pub providers: ProvidersConfig,

    /// Gemini upload and polling settings
    pub gemini: GeminiConfig,

    /// Image intake limits
    pub upload: UploadConfig,

    /// CSV post recorder
    pub recorder: RecorderConfig,

    /// Post composition limits
    pub composer: ComposerConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.postcraft.postcraft/config.toml
    /// - Linux: ~/.config/postcraft/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\postcraft\config\config.toml
    ///
    /// Falls back to ~/.postcraft/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "postcraft", "postcraft")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".postcraft").join("config.toml")
            })
    }

    /// Get the resolved recorder CSV path (with ~ expansion).
    pub fn recorder_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.recorder.path);
        PathBuf::from(expanded.into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
