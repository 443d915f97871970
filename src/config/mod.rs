//! Configuration module for pipectl
//!
//! This module handles the settings shared by the library and the desktop
//! driver:
//! - Controller settings (command queue depth, worker thread name, default tag)
//! - Logging settings (filter directive, optional log file)
//!
//! # Config Location
//!
//! The default configuration file lives in the platform config directory:
//! - **Linux**: `~/.config/dev.hxyulin.pipectl/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.pipectl/config.toml`
//! - **Windows**: `%APPDATA%\dev.hxyulin.pipectl\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use pipectl::config::PlayerConfig;
//!
//! let config = PlayerConfig::load_or_default();
//! let controller = Controller::builder(&config.controller.default_tag)
//!     .config(config.controller.clone())
//!     .build(engine, callbacks)?;
//! ```

use crate::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.hxyulin.pipectl";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default depth of a controller's command queue
pub const DEFAULT_COMMAND_CAPACITY: usize = 256;

/// Default name of a controller's worker thread
pub const DEFAULT_THREAD_NAME: &str = "player_thread";

/// Get the application config directory path
pub fn app_config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Controller ====================

/// Settings applied to each controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Bound of the command channel between callers and the worker
    pub command_capacity: usize,
    /// Name given to the worker thread
    pub thread_name: String,
    /// Diagnostic tag used when the caller does not provide one
    pub default_tag: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            default_tag: "player".to_string(),
        }
    }
}

// ==================== Logging ====================

/// Logging settings used by the desktop driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
    /// Also write logs to this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            log_file: None,
        }
    }
}

// ==================== Top Level ====================

/// Complete configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Config format version
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_config_version() -> u32 {
    1
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            controller: ControllerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlayerError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            PlayerError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or the default location when `path` is `None`
    ///
    /// Falls back to defaults when the file is missing or invalid.
    pub fn load_or_default_from(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => return Self::default(),
            },
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Load from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(None)
    }

    /// Save configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PlayerError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PlayerError::Serialization(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            PlayerError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject values the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.controller.command_capacity == 0 {
            return Err(PlayerError::Config(
                "controller.command_capacity must be at least 1".to_string(),
            ));
        }
        if self.controller.thread_name.is_empty() {
            return Err(PlayerError::Config(
                "controller.thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = PlayerConfig::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.controller.command_capacity, DEFAULT_COMMAND_CAPACITY);
        assert_eq!(config.controller.thread_name, "player_thread");
        assert_eq!(config.logging.filter, "info");
        assert!(config.logging.log_file.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = PlayerConfig::default();
        config.controller.default_tag = "desktop".to_string();
        config.logging.log_file = Some(dir.path().join("pipectl.log"));
        config.save(&path).unwrap();

        let loaded = PlayerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[controller]\nthread_name = \"gst\"\n").unwrap();

        let config = PlayerConfig::load(&path).unwrap();
        assert_eq!(config.controller.thread_name, "gst");
        assert_eq!(config.controller.command_capacity, DEFAULT_COMMAND_CAPACITY);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[controller]\ncommand_capacity = 0\n").unwrap();

        assert!(matches!(PlayerConfig::load(&path), Err(PlayerError::Config(_))));
        assert_eq!(
            PlayerConfig::load_or_default_from(Some(&path)),
            PlayerConfig::default()
        );
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert_eq!(
            PlayerConfig::load_or_default_from(Some(&path)),
            PlayerConfig::default()
        );
    }
}
