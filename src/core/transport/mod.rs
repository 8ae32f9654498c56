//! Transport layer for instrument connections
//!
//! Supports:
//! - Serial ports (RS-232, USB-Serial, Bluetooth SPP exposed as a tty)
//! - Raw TCP connections (NMEA multiplexers, simulators)
//!
//! Transport failures surface here as [`TransportError`] and are handled by
//! the session, never by the sentence parser.

mod serial;
mod tcp;

pub use serial::{list_ports, SerialConfig, SerialParity, SerialTransport};
pub use tcp::{TcpConfig, TcpTransport};

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// Transport configuration
#[derive(Debug, Clone)]
pub enum Transport {
    /// Serial port connection
    Serial(SerialConfig),
    /// Raw TCP connection
    Tcp(TcpConfig),
}

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Serial port
    Serial,
    /// Raw TCP
    Tcp,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "Serial"),
            Self::Tcp => write!(f, "TCP"),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection timeout
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// Peer closed the connection
    #[error("Disconnected")]
    Disconnected,
}

impl TransportError {
    /// Worth retrying after a delay?
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::PortNotFound(_) | Self::PermissionDenied(_))
    }
}

/// Transport statistics
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    /// Bytes received
    pub bytes_received: u64,
    /// Reads that returned data
    pub packets_received: u64,
    /// Errors count
    pub errors: u64,
    /// Connection uptime in seconds
    pub uptime_secs: u64,
}

/// Read side of an instrument connection
#[async_trait]
pub trait TransportTrait: Send + Sync {
    /// Connect to the target
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Disconnect from the target
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Wait for the next chunk of data.
    ///
    /// Cancel-safe: dropping the future loses no data.
    async fn receive(&mut self) -> Result<Bytes, TransportError>;

    /// Get transport type
    fn transport_type(&self) -> TransportType;

    /// Get connection info string
    fn connection_info(&self) -> String;

    /// Get statistics
    fn stats(&self) -> TransportStats;
}

/// Create a transport instance from configuration
pub fn create_transport(config: Transport) -> Box<dyn TransportTrait> {
    match config {
        Transport::Serial(cfg) => Box::new(SerialTransport::new(cfg)),
        Transport::Tcp(cfg) => Box::new(TcpTransport::new(cfg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_transport() {
        let tcp = create_transport(Transport::Tcp(TcpConfig::new("127.0.0.1", 10110)));
        assert_eq!(tcp.transport_type(), TransportType::Tcp);
        assert_eq!(tcp.connection_info(), "127.0.0.1:10110");
        assert!(!tcp.is_connected());

        let serial = create_transport(Transport::Serial(SerialConfig::new("/dev/ttyUSB0", 4800)));
        assert_eq!(serial.transport_type().to_string(), "Serial");
    }

    #[test]
    fn test_transient_errors() {
        assert!(TransportError::Disconnected.is_transient());
        assert!(TransportError::Timeout(5).is_transient());
        assert!(!TransportError::PortNotFound("COM9".into()).is_transient());
    }
}
