//! Core module containing the main functionality of Nmeamon
//!
//! This module provides:
//! - Line protocol: reassembly, sentence tokenizing, NMEA checksums
//! - Driver registry and built-in driver catalog
//! - Ingest dispatch into shared telemetry state
//! - Stream bridge: ring buffer plus debounced consumer notification
//! - Device descriptor with a detachable raw-byte monitor
//! - Capture logging of the raw stream
//! - Transport layer (Serial, TCP) and session management

pub mod bridge;
pub mod buffer;
pub mod device;
pub mod dispatch;
pub mod driver;
pub mod logger;
pub mod notify;
pub mod protocol;
pub mod session;
pub mod telemetry;
pub mod transport;
