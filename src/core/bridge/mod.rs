//! Stream Bridge - raw byte handoff from an I/O thread to a display consumer
//!
//! The producer side ([`StreamBridge::on_bytes`]) copies into a bounded
//! [`FrameBuffer`] under a short lock and arms a coalescing timer. When the
//! timer fires a notification is posted to the [`BridgeConsumer`], which
//! drains the buffer in bounded chunks, releasing the lock before every
//! chunk is forwarded to its sink.
//!
//! Under overload the oldest bytes are dropped; the consumer always sees
//! the most recent data in the order it was written.

use crate::core::buffer::FrameBuffer;
use crate::core::device::DataHandler;
use crate::core::notify::DelayedNotify;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Default ring buffer capacity in bytes
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default debounce interval
pub const DEFAULT_NOTIFY_INTERVAL_MS: u64 = 100;

/// Default number of bytes copied out per lock acquisition
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Ring buffer capacity
    pub capacity: usize,
    /// Debounce window for consumer notifications
    pub notify_interval_ms: u64,
    /// Drain chunk size
    pub chunk_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            notify_interval_ms: DEFAULT_NOTIFY_INTERVAL_MS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl BridgeConfig {
    /// Debounce window as a duration
    pub fn notify_interval(&self) -> Duration {
        Duration::from_millis(self.notify_interval_ms)
    }
}

/// Bridge statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Bytes offered by the producer
    pub bytes_received: u64,
    /// Oldest bytes discarded on overflow
    pub bytes_dropped: u64,
    /// Bytes handed to a sink
    pub bytes_delivered: u64,
    /// Debounced wakeups sent to the consumer
    pub notifications: u64,
}

/// Where drained bytes end up
pub trait TerminalSink {
    /// Forward one chunk
    fn write(&mut self, data: &[u8]);
}

impl<F: FnMut(&[u8])> TerminalSink for F {
    fn write(&mut self, data: &[u8]) {
        self(data)
    }
}

struct BridgeInner {
    buffer: FrameBuffer,
    stats: BridgeStats,
}

struct BridgeShared {
    inner: Mutex<BridgeInner>,
    chunk_size: usize,
}

impl BridgeShared {
    fn drain(&self, sink: &mut dyn TerminalSink) -> usize {
        let mut chunk = vec![0u8; self.chunk_size];
        let mut total = 0;

        loop {
            let n = {
                let mut inner = self.inner.lock();
                let n = inner.buffer.read_into(&mut chunk);
                inner.stats.bytes_delivered += n as u64;
                n
            };
            if n == 0 {
                break;
            }
            sink.write(&chunk[..n]);
            total += n;
        }

        total
    }
}

/// Producer half of the bridge
pub struct StreamBridge {
    shared: Arc<BridgeShared>,
    notify: DelayedNotify,
}

impl StreamBridge {
    /// Create a bridge and the consumer that drains it
    pub fn new(config: &BridgeConfig) -> (Self, BridgeConsumer) {
        let shared = Arc::new(BridgeShared {
            inner: Mutex::new(BridgeInner {
                buffer: FrameBuffer::new(config.capacity),
                stats: BridgeStats::default(),
            }),
            chunk_size: config.chunk_size.max(1),
        });

        let (tx, rx) = bounded(1);
        let notify = DelayedNotify::new(config.notify_interval(), timer_callback(&shared, tx));

        let consumer = BridgeConsumer {
            shared: shared.clone(),
            rx,
        };

        (Self { shared, notify }, consumer)
    }

    /// Buffer bytes from the producer and schedule a notification.
    ///
    /// Never blocks on the consumer.
    pub fn on_bytes(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let dropped = {
            let mut inner = self.shared.inner.lock();
            let dropped = inner.buffer.write(data);
            inner.stats.bytes_received += data.len() as u64;
            inner.stats.bytes_dropped += dropped as u64;
            dropped
        };

        if dropped > 0 {
            tracing::trace!(dropped, "bridge buffer overflow");
        }

        self.notify.send_notification();
    }

    /// Drain synchronously on the calling thread
    pub fn drain(&self, sink: &mut dyn TerminalSink) -> usize {
        self.shared.drain(sink)
    }

    /// Bytes waiting for the consumer
    pub fn buffered(&self) -> usize {
        self.shared.inner.lock().buffer.len()
    }

    /// Statistics snapshot
    pub fn stats(&self) -> BridgeStats {
        self.shared.inner.lock().stats
    }
}

impl DataHandler for StreamBridge {
    fn data_received(&self, data: &[u8]) -> bool {
        self.on_bytes(data);
        true
    }
}

/// Timer callback; only a weak reference so the bridge can be dropped
/// while a notification is in flight.
fn timer_callback(shared: &Arc<BridgeShared>, tx: Sender<()>) -> impl Fn() + Send + 'static {
    let weak: Weak<BridgeShared> = Arc::downgrade(shared);
    move || {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        shared.inner.lock().stats.notifications += 1;
        match tx.try_send(()) {
            // consumer has not picked up the previous one yet
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::trace!("bridge consumer gone");
            }
        }
    }
}

/// Consumer half of the bridge
pub struct BridgeConsumer {
    shared: Arc<BridgeShared>,
    rx: Receiver<()>,
}

impl BridgeConsumer {
    /// Wait for a notification.
    ///
    /// Returns false on timeout or once the bridge is gone.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Drain if a notification is pending, without blocking
    pub fn poll(&self, sink: &mut dyn TerminalSink) -> usize {
        if self.rx.try_recv().is_ok() {
            self.shared.drain(sink)
        } else {
            0
        }
    }

    /// Drain unconditionally
    pub fn drain(&self, sink: &mut dyn TerminalSink) -> usize {
        self.shared.drain(sink)
    }

    /// Statistics snapshot
    pub fn stats(&self) -> BridgeStats {
        self.shared.inner.lock().stats
    }

    /// Drain on every notification until the bridge is dropped, then flush
    /// whatever is left.
    pub fn run(self, mut sink: impl TerminalSink) -> BridgeStats {
        while self.rx.recv().is_ok() {
            self.shared.drain(&mut sink);
        }
        self.shared.drain(&mut sink);
        self.stats()
    }
}
