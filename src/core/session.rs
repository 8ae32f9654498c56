//! Session management for instrument connections
//!
//! A Session owns a transport and a task that feeds every received chunk
//! into a [`DeviceDescriptor`]. Transport failures are reported as
//! [`SessionEvent`]s and optionally retried; they never reach the parser.

use crate::core::device::DeviceDescriptor;
use crate::core::transport::{TransportError, TransportTrait};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    Disconnected,
    /// Connected and active
    Connected,
    /// Waiting to reconnect after a failure
    Reconnecting,
    /// Gave up after an unrecoverable error
    Error,
}

/// Session events
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// State changed
    StateChanged(SessionState),
    /// Transport error
    Error(String),
    /// Peer closed the connection
    Disconnected,
    /// A reconnect attempt is about to start
    ReconnectRequested {
        /// 1-based attempt number
        attempt: u32,
    },
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Reconnect after a transient failure
    pub auto_reconnect: bool,
    /// Reconnect delay in seconds
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect attempts (0 = infinite)
    pub max_reconnect_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: false,
            reconnect_delay_secs: 5,
            max_reconnect_attempts: 0,
        }
    }
}

/// Active session
pub struct Session {
    id: Uuid,
    info: String,
    device: Arc<DeviceDescriptor>,
    state: Arc<RwLock<SessionState>>,
    event_tx: broadcast::Sender<SessionEvent>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

struct Link {
    transport: Box<dyn TransportTrait>,
    device: Arc<DeviceDescriptor>,
    config: SessionConfig,
    state: Arc<RwLock<SessionState>>,
    event_tx: broadcast::Sender<SessionEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Session {
    /// Connect the transport and start feeding `device`
    pub async fn open(
        mut transport: Box<dyn TransportTrait>,
        device: Arc<DeviceDescriptor>,
        config: SessionConfig,
    ) -> Result<Self, TransportError> {
        transport.connect().await?;

        let id = Uuid::new_v4();
        let info = transport.connection_info();
        tracing::info!(session = %id, %info, device = device.name(), "connected");

        let state = Arc::new(RwLock::new(SessionState::Connected));
        let (event_tx, _) = broadcast::channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let link = Link {
            transport,
            device: device.clone(),
            config,
            state: state.clone(),
            event_tx: event_tx.clone(),
            shutdown_rx,
        };
        let task = tokio::spawn(link.run());

        Ok(Self {
            id,
            info,
            device,
            state,
            event_tx,
            shutdown_tx,
            task: Some(task),
        })
    }

    /// Get session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get connection info string
    pub fn connection_info(&self) -> &str {
        &self.info
    }

    /// Device fed by this session
    pub fn device(&self) -> &Arc<DeviceDescriptor> {
        &self.device
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Wait until the session ends on its own
    pub async fn join(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }

    /// Disconnect and wait for the receive task to finish
    pub async fn close(mut self) {
        let _ = self.shutdown_tx.send(true);
        self.join().await;
    }
}

impl Link {
    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
        let _ = self.event_tx.send(SessionEvent::StateChanged(state));
    }

    async fn run(mut self) {
        loop {
            let received = tokio::select! {
                _ = self.shutdown_rx.changed() => None,
                result = self.transport.receive() => Some(result),
            };

            match received {
                None => {
                    let _ = self.transport.disconnect().await;
                    self.set_state(SessionState::Disconnected);
                    break;
                }
                Some(Ok(bytes)) => {
                    self.device.data_received(&bytes);
                }
                Some(Err(e)) => {
                    self.device.reset_line();
                    if matches!(e, TransportError::Disconnected) {
                        tracing::info!(info = %self.transport.connection_info(), "peer closed connection");
                        let _ = self.event_tx.send(SessionEvent::Disconnected);
                    } else {
                        tracing::warn!(error = %e, "receive failed");
                        let _ = self.event_tx.send(SessionEvent::Error(e.to_string()));
                    }
                    let _ = self.transport.disconnect().await;

                    if !self.config.auto_reconnect || !e.is_transient() {
                        self.set_state(if matches!(e, TransportError::Disconnected) {
                            SessionState::Disconnected
                        } else {
                            SessionState::Error
                        });
                        break;
                    }
                    if !self.reconnect().await {
                        break;
                    }
                }
            }
        }
    }

    /// Retry until connected, shut down or out of attempts
    async fn reconnect(&mut self) -> bool {
        let delay = Duration::from_secs(self.config.reconnect_delay_secs);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if self.config.max_reconnect_attempts > 0 && attempt > self.config.max_reconnect_attempts {
                tracing::warn!(attempts = attempt - 1, "giving up reconnecting");
                self.set_state(SessionState::Error);
                return false;
            }

            self.set_state(SessionState::Reconnecting);
            let _ = self.event_tx.send(SessionEvent::ReconnectRequested { attempt });

            let shutdown = tokio::select! {
                _ = self.shutdown_rx.changed() => true,
                _ = tokio::time::sleep(delay) => false,
            };
            if shutdown {
                self.set_state(SessionState::Disconnected);
                return false;
            }

            match self.transport.connect().await {
                Ok(()) => {
                    tracing::info!(attempt, info = %self.transport.connection_info(), "reconnected");
                    self.set_state(SessionState::Connected);
                    return true;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "reconnect failed");
                    let _ = self.event_tx.send(SessionEvent::Error(e.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatch::{DispatchChain, IngestDispatcher};
    use crate::core::driver::key;
    use crate::core::protocol::{LineSplitter, OverflowPolicy};
    use crate::core::transport::{TcpConfig, TcpTransport};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn device() -> Arc<DeviceDescriptor> {
        let mut chain = DispatchChain::new();
        chain.push(IngestDispatcher::new(key::create().unwrap()));
        Arc::new(DeviceDescriptor::new(
            "tcp",
            LineSplitter::new(128, OverflowPolicy::Discard),
            chain,
        ))
    }

    #[tokio::test]
    async fn test_feeds_device_until_peer_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"$PDKEY,3\r\n$PDK").await.unwrap();
            socket.write_all(b"EY,9\r\n").await.unwrap();
        });

        let transport = Box::new(TcpTransport::new(TcpConfig::new("127.0.0.1", port)));
        let mut session = Session::open(transport, device(), SessionConfig::default())
            .await
            .unwrap();
        let mut events = session.subscribe();

        session.join().await;

        assert_eq!(session.state(), SessionState::Disconnected);
        let keys = session.device().telemetry().keys;
        assert!(keys.is_set(3));
        assert!(keys.is_set(9));
        assert!(matches!(events.recv().await, Ok(SessionEvent::Disconnected)));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
            // listener dropped here, so reconnects are refused
        });

        let config = SessionConfig {
            auto_reconnect: true,
            reconnect_delay_secs: 0,
            max_reconnect_attempts: 2,
        };
        let transport = Box::new(TcpTransport::new(TcpConfig::new("127.0.0.1", port)));
        let mut session = Session::open(transport, device(), config).await.unwrap();
        let mut events = session.subscribe();
        server.await.unwrap();

        session.join().await;
        assert_eq!(session.state(), SessionState::Error);

        let mut attempts = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::ReconnectRequested { attempt } = event {
                attempts.push(attempt);
            }
        }
        assert_eq!(attempts, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_close_stops_idle_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let transport = Box::new(TcpTransport::new(TcpConfig::new("127.0.0.1", port)));
        let session = Session::open(transport, device(), SessionConfig::default())
            .await
            .unwrap();
        assert!(session.is_connected());

        session.close().await;
        server.abort();
    }
}
