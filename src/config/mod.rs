//! Configuration and settings management.
//!
//! This module provides application settings types and loading.
//! Settings are stored in the user's config directory as JSON.

mod settings;

pub use settings::{
    ConnectionSettings, CopySettings, LoggingSettings, Settings, SettingsError, CONFIG_ENV,
    SETTINGS_FILE,
};
