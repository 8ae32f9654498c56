//! Application settings

use crate::core::bridge::BridgeConfig;
use crate::core::dispatch::{DispatchChain, DispatchError};
use crate::core::driver::{catalog, is_valid_prefix};
use crate::core::protocol::framing::DEFAULT_MAX_LINE;
use crate::core::protocol::{ChecksumPolicy, LineSplitter, OverflowPolicy};
use crate::core::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Config path
        path: PathBuf,
        /// Cause
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`AppConfig`]
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or unknown
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Raw stream monitor
    pub monitor: BridgeConfig,
    /// Sentence ingest
    pub ingest: IngestConfig,
    /// Connection handling
    pub session: SessionConfig,
    /// Diagnostic logging
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from the platform config directory; a missing file yields defaults
    pub fn load() -> Result<Self, ConfigError> {
        match super::default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but make no sense
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.capacity == 0 {
            return Err(ConfigError::Invalid("monitor.capacity must be > 0".into()));
        }
        if self.monitor.chunk_size == 0 {
            return Err(ConfigError::Invalid("monitor.chunk_size must be > 0".into()));
        }
        if self.ingest.max_line_length == 0 {
            return Err(ConfigError::Invalid("ingest.max_line_length must be > 0".into()));
        }
        if let Some(name) = self.ingest.drivers.iter().find(|n| catalog::find(n).is_none()) {
            return Err(ConfigError::Invalid(format!("unknown driver: {}", name)));
        }
        if let Some(prefix) = self.ingest.checksum.keys().find(|p| !is_valid_prefix(p)) {
            return Err(ConfigError::Invalid(format!(
                "invalid sentence prefix in ingest.checksum: {:?}",
                prefix
            )));
        }
        Ok(())
    }
}

/// Sentence ingest settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Longest accepted line in bytes
    pub max_line_length: usize,
    /// What to do with longer lines
    pub overflow: OverflowPolicy,
    /// Drivers tried in order
    pub drivers: Vec<String>,
    /// Per-prefix checksum policy overrides
    pub checksum: HashMap<String, ChecksumPolicy>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE,
            overflow: OverflowPolicy::default(),
            drivers: catalog::default_names(),
            checksum: HashMap::new(),
        }
    }
}

impl IngestConfig {
    /// Line splitter for one device
    pub fn splitter(&self) -> LineSplitter {
        LineSplitter::new(self.max_line_length, self.overflow)
    }

    /// Dispatch chain over the configured drivers
    pub fn build_chain(&self) -> Result<DispatchChain, DispatchError> {
        DispatchChain::from_catalog(&self.drivers, &self.checksum)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// JSON lines on stderr
    pub json: bool,
    /// Also append logs to this file
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}
