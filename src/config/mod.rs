//! Configuration module
//!
//! Read-only application settings; nothing is written back.

mod settings;

pub use settings::{AppConfig, ConfigError, IngestConfig, LoggingConfig};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "nmeamon", "Nmeamon").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE))
}

/// Get the application data directory, where captures go by default
pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "nmeamon", "Nmeamon").map(|dirs| dirs.data_dir().to_path_buf())
}
