//! Server wiring: connection lifecycle, dispatch, and message delivery.
//!
//! [`RoomServer`] owns the [`SessionCoordinator`] and a peer map of
//! per-connection outbound channels. Each accepted [`Connection`] runs in
//! its own task ([`RoomServer::handle_connection`]) that multiplexes
//! outbound frames and inbound events via `tokio::select!`. Delivery is
//! fire-and-forget: broadcasts are queued on unbounded channels and never
//! block the registry mutation that produced them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::coordinator::{Outbound, SessionCoordinator};
use crate::protocol::{ClientEvent, ConnectionId, ServerEvent};
use crate::transport::Connection;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 9000;

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`RoomServer`] front-end.
///
/// # Example
///
/// ```
/// use roomcast::server::ServerConfig;
///
/// let config = ServerConfig::new().with_port(4200);
/// assert_eq!(config.addr(), "0.0.0.0:4200");
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind, defaults to `0.0.0.0`.
    pub host: String,
    /// Listen port, defaults to **9000**.
    pub port: u16,
}

impl ServerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: DEFAULT_PORT,
        }
    }

    /// Set the interface to bind.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the listen port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// The bind address in `host:port` form.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Server ──────────────────────────────────────────────────────────

/// The roomcast server: coordinator plus connected-peer bookkeeping.
///
/// Wrap it in an [`Arc`] and hand each accepted connection to
/// [`handle_connection`](Self::handle_connection); with the
/// `transport-websocket` feature, [`run`](Self::run) does both.
#[derive(Debug, Default)]
pub struct RoomServer {
    coordinator: SessionCoordinator,
    /// Outbound frame channel per live connection.
    peers: StdMutex<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

impl RoomServer {
    /// Create a server over a fresh coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a server over an existing coordinator, e.g. one whose registry
    /// was pre-seeded by tests.
    pub fn with_coordinator(coordinator: SessionCoordinator) -> Self {
        Self {
            coordinator,
            peers: StdMutex::new(HashMap::new()),
        }
    }

    /// The coordinator driving this server.
    pub fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    /// Accept WebSocket connections forever.
    ///
    /// Handshakes run on the per-connection task, so a stalled client cannot
    /// block the accept loop; failed handshakes are logged and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RoomcastError`](crate::error::RoomcastError) only if the
    /// accept call itself fails fatally.
    #[cfg(feature = "transport-websocket")]
    pub async fn run(
        self: Arc<Self>,
        listener: crate::transports::WebSocketListener,
    ) -> crate::error::Result<()> {
        loop {
            let (tcp, peer_addr) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                match crate::transports::WebSocketConnection::accept(tcp).await {
                    Ok(conn) => server.handle_connection(conn).await,
                    Err(e) => warn!(%peer_addr, error = %e, "WebSocket handshake failed"),
                }
            });
        }
    }

    /// Drive one client connection until it closes.
    ///
    /// Registers the connection, dispatches its events into the coordinator,
    /// and — exactly once, on teardown — feeds the disconnect notification
    /// back so remaining room members hear about it.
    pub async fn handle_connection(self: Arc<Self>, mut conn: impl Connection) {
        let connection_id: ConnectionId = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        self.peers().insert(connection_id, tx);
        info!(%connection_id, "connection established");

        loop {
            tokio::select! {
                // Outbound frame queued for this connection.
                frame = rx.recv() => {
                    match frame {
                        Some(text) => {
                            if let Err(e) = conn.send(text).await {
                                warn!(%connection_id, error = %e, "send failed, dropping connection");
                                break;
                            }
                        }
                        // Sender side removed from the peer map.
                        None => break,
                    }
                }

                // Inbound event from the client.
                incoming = conn.recv() => {
                    match incoming {
                        Some(Ok(text)) => self.dispatch(connection_id, &text),
                        Some(Err(e)) => {
                            warn!(%connection_id, error = %e, "receive error");
                            break;
                        }
                        None => {
                            debug!(%connection_id, "connection closed by client");
                            break;
                        }
                    }
                }
            }
        }

        let _ = conn.close().await;
        self.peers().remove(&connection_id);

        // The disconnect notification fires exactly once per teardown.
        let outbound = self.coordinator.handle_disconnect(connection_id);
        self.deliver(connection_id, outbound);
        info!(%connection_id, "connection closed");
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Parse one inbound frame and run it through the coordinator.
    fn dispatch(&self, connection_id: ConnectionId, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => {
                debug!(%connection_id, event = ?std::mem::discriminant(&event), "event received");
                let outbound = self.coordinator.handle_event(connection_id, event);
                self.deliver(connection_id, outbound);
            }
            Err(e) => {
                warn!(%connection_id, error = %e, "malformed event, answering with error");
                self.send_event(
                    connection_id,
                    &ServerEvent::Error {
                        message: "malformed event".to_owned(),
                    },
                );
            }
        }
    }

    /// Fan out the coordinator's outbound messages.
    ///
    /// `origin` receives acks and replies; broadcasts go to the resolved
    /// recipient lists. Recipients that disappeared between resolution and
    /// delivery are skipped silently.
    fn deliver(&self, origin: ConnectionId, outbound: Vec<Outbound>) {
        for message in outbound {
            match message {
                // This transport layer has no native ack callback, so acks
                // travel as an `ack` event frame.
                Outbound::Ack(payload) => self.send_event(origin, &ServerEvent::Ack(payload)),
                Outbound::Reply(event) => self.send_event(origin, &event),
                Outbound::Broadcast { to, event } => {
                    let Some(frame) = encode(&event) else { continue };
                    let peers = self.peers();
                    for recipient in to {
                        if let Some(tx) = peers.get(&recipient) {
                            let _ = tx.send(frame.clone());
                        }
                    }
                }
            }
        }
    }

    /// Serialize and queue one event for one connection.
    fn send_event(&self, to: ConnectionId, event: &ServerEvent) {
        let Some(frame) = encode(event) else { return };
        if let Some(tx) = self.peers().get(&to) {
            let _ = tx.send(frame);
        }
    }

    fn peers(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, mpsc::UnboundedSender<String>>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serialize an event to its wire frame.
///
/// Serialization failures are programming bugs; they are logged and the
/// event is dropped rather than killing the connection task.
fn encode(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize server event");
            None
        }
    }
}
