//! Device descriptor
//!
//! The byte-producing side of a connection. Every chunk read from a
//! transport goes through [`DeviceDescriptor::data_received`], which hands
//! the raw bytes to the attached monitor (if any) and reassembles lines for
//! the dispatch chain. The two paths share no lock.

use crate::core::dispatch::{DispatchChain, DispatchStats};
use crate::core::protocol::LineSplitter;
use crate::core::telemetry::TelemetryState;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Receives raw bytes from a device
#[cfg_attr(test, mockall::automock)]
pub trait DataHandler: Send + Sync {
    /// Called on the I/O thread for every chunk; returns false when the
    /// data was not taken
    fn data_received(&self, data: &[u8]) -> bool;
}

struct IngestState {
    splitter: LineSplitter,
    chain: DispatchChain,
    telemetry: TelemetryState,
}

/// One connected instrument
pub struct DeviceDescriptor {
    name: String,
    monitor: Mutex<Option<Arc<dyn DataHandler>>>,
    ingest: Mutex<IngestState>,
}

impl fmt::Debug for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceDescriptor")
            .field("name", &self.name)
            .field("monitor", &self.has_monitor())
            .finish()
    }
}

impl DeviceDescriptor {
    /// Create a device that dispatches complete lines through `chain`
    pub fn new(name: impl Into<String>, splitter: LineSplitter, chain: DispatchChain) -> Self {
        Self {
            name: name.into(),
            monitor: Mutex::new(None),
            ingest: Mutex::new(IngestState {
                splitter,
                chain,
                telemetry: TelemetryState::default(),
            }),
        }
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach or detach the monitor.
    ///
    /// Takes the same lock used for delivery, so once this returns the
    /// previous monitor receives no further bytes. `None` is always safe.
    pub fn set_monitor(&self, monitor: Option<Arc<dyn DataHandler>>) {
        let attached = monitor.is_some();
        *self.monitor.lock() = monitor;
        tracing::debug!(device = %self.name, attached, "monitor changed");
    }

    /// Is a monitor attached?
    pub fn has_monitor(&self) -> bool {
        self.monitor.lock().is_some()
    }

    /// Feed raw bytes from the transport.
    ///
    /// Returns the number of complete lines a handler consumed.
    pub fn data_received(&self, data: &[u8]) -> usize {
        if let Some(monitor) = self.monitor.lock().as_ref() {
            monitor.data_received(data);
        }

        let mut guard = self.ingest.lock();
        let IngestState {
            splitter,
            chain,
            telemetry,
        } = &mut *guard;

        let mut handled = 0;
        splitter.push(data, |line| {
            if chain.parse_line(line, telemetry) {
                handled += 1;
            }
        });
        handled
    }

    /// Dispatch one already-framed line
    pub fn parse_line(&self, line: &str) -> bool {
        let mut guard = self.ingest.lock();
        let IngestState {
            chain, telemetry, ..
        } = &mut *guard;
        chain.parse_line(line, telemetry)
    }

    /// Snapshot of the telemetry state
    pub fn telemetry(&self) -> TelemetryState {
        self.ingest.lock().telemetry.clone()
    }

    /// Run `f` against the live telemetry state, e.g. to consume key presses
    pub fn with_telemetry<R>(&self, f: impl FnOnce(&mut TelemetryState) -> R) -> R {
        f(&mut self.ingest.lock().telemetry)
    }

    /// Dispatch counters per driver
    pub fn dispatch_stats(&self) -> Vec<(String, DispatchStats)> {
        self.ingest.lock().chain.stats()
    }

    /// Discard any partial line, e.g. after a reconnect
    pub fn reset_line(&self) {
        self.ingest.lock().splitter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::driver::key;
    use crate::core::dispatch::IngestDispatcher;
    use crate::core::protocol::OverflowPolicy;

    fn device() -> DeviceDescriptor {
        let mut chain = DispatchChain::new();
        chain.push(IngestDispatcher::new(key::create().unwrap()));
        DeviceDescriptor::new("test", LineSplitter::new(64, OverflowPolicy::Discard), chain)
    }

    #[test]
    fn test_byte_by_byte_lines() {
        let device = device();
        let mut handled = 0;
        for b in b"$PDKEY,2\r\n$PDKEY,7\r\n" {
            handled += device.data_received(std::slice::from_ref(b));
        }
        assert_eq!(handled, 2);

        let state = device.telemetry();
        assert!(state.keys.is_set(2));
        assert!(state.keys.is_set(7));
    }

    #[test]
    fn test_monitor_sees_raw_bytes() {
        let device = device();
        let mut monitor = MockDataHandler::new();
        monitor
            .expect_data_received()
            .withf(|data| data == b"$PDKEY,1\n")
            .times(1)
            .return_const(true);

        device.set_monitor(Some(Arc::new(monitor)));
        assert!(device.has_monitor());
        device.data_received(b"$PDKEY,1\n");

        device.set_monitor(None);
        assert!(!device.has_monitor());
        device.data_received(b"$PDKEY,2\n");
        assert!(device.telemetry().keys.is_set(2));
    }

    #[test]
    fn test_detach_without_monitor() {
        let device = device();
        device.set_monitor(None);
        device.set_monitor(None);
        assert!(!device.has_monitor());
    }

    #[test]
    fn test_with_telemetry_takes_key() {
        let device = device();
        assert!(device.parse_line("$PDKEY,4"));
        assert!(device.with_telemetry(|t| t.keys.take(4)));
        assert!(!device.telemetry().keys.is_set(4));
    }

    #[test]
    fn test_reset_line_drops_partial() {
        let device = device();
        device.data_received(b"$PDKEY,");
        device.reset_line();
        assert_eq!(device.data_received(b"3\n"), 0);
        assert!(!device.telemetry().keys.any());
        assert_eq!(device.dispatch_stats()[0].1.unhandled, 1);
    }
}
