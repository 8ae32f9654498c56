//! # Nmeamon Core Library
//!
//! Ingest and monitoring for ASCII sentence-based instruments (NMEA 0183
//! and vendor extensions) over:
//! - Serial ports (RS-232, USB-Serial adapters, Bluetooth SPP)
//! - TCP/IP connections
//!
//! ## Features
//!
//! - Line reassembly and sentence tokenizing with typed field reads
//! - Per-sentence checksum policy
//! - Driver registry with first-match dispatch into telemetry state
//! - Raw stream bridge with bounded buffering and debounced delivery
//! - Capture logging
//! - CLI with exit codes and pipe support
//!
//! ## Example
//!
//! ```rust,no_run
//! use nmeamon_core::{DispatchChain, TelemetryState};
//! use std::collections::HashMap;
//!
//! fn main() -> anyhow::Result<()> {
//!     let names = vec!["nmea-key".to_string()];
//!     let mut chain = DispatchChain::from_catalog(&names, &HashMap::new())?;
//!     let mut state = TelemetryState::default();
//!
//!     assert!(chain.parse_line("$PDKEY,5", &mut state));
//!     assert!(state.keys.is_set(5));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ConfigError};
pub use crate::core::bridge::{BridgeConfig, BridgeConsumer, BridgeStats, StreamBridge, TerminalSink};
pub use crate::core::buffer::FrameBuffer;
pub use crate::core::device::{DataHandler, DeviceDescriptor};
pub use crate::core::dispatch::{DispatchChain, DispatchError, DispatchStats, IngestDispatcher};
pub use crate::core::driver::{DriverRegistry, RegistryError, SentenceHandler};
pub use crate::core::logger::{CaptureFormat, CaptureLog};
pub use crate::core::notify::DelayedNotify;
pub use crate::core::protocol::{
    ChecksumPolicy, ChecksumStatus, InputLine, LineSplitter, OverflowPolicy, Sentence,
};
pub use crate::core::session::{Session, SessionConfig, SessionEvent, SessionState};
pub use crate::core::telemetry::{KeyFlags, TelemetryState};
pub use crate::core::transport::{SerialConfig, TcpConfig, Transport, TransportType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
