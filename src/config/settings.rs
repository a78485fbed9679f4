//! Application settings and configuration types.
//!
//! Settings are read from `settings.json` in the user's config directory (or
//! the file named by `MAILMIRROR_CONFIG`) at startup. Every field has a
//! default, so the file may be partial or absent.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "MAILMIRROR_CONFIG";

/// File name looked up in the config directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Store connection settings.
    pub connection: ConnectionSettings,
    /// Copy behavior.
    pub copy: CopySettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Settings {
    /// Reads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads settings from the configured location, or returns defaults when
    /// no settings file exists.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if a settings file exists but is invalid.
    pub fn load_or_default() -> Result<Self, SettingsError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Location of the settings file: `MAILMIRROR_CONFIG` if set, otherwise
    /// the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("io", "mailmirror", "mailmirror")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }
}

/// Store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Seconds to wait for a TCP connection to a store.
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
        }
    }
}

/// Copy behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopySettings {
    /// Carry message flags (`\Seen`, `\Flagged`, ...) over to the target.
    pub preserve_flags: bool,
    /// Carry the received date of each message over to the target.
    pub preserve_internal_date: bool,
}

impl Default for CopySettings {
    fn default() -> Self {
        Self {
            preserve_flags: true,
            preserve_internal_date: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
