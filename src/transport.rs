//! The seam between the server core and its transports.
//!
//! Everything above this line speaks in whole JSON text messages; everything
//! below it deals in whatever the wire actually carries. [`Connection`]
//! captures that boundary: one accepted client, one ordered stream of text
//! messages in each direction, framing handled inside the implementation.
//! The bundled [`transports::websocket`](crate::transports::websocket) maps
//! messages onto WebSocket text frames; a length-prefixed TCP or in-memory
//! channel implementation would be equally valid.
//!
//! The trait deliberately starts *after* accept. Listener shapes vary too
//! much between transports to abstract profitably, so each transport exposes
//! its own way of producing connections and the server takes over from
//! [`RoomServer::handle_connection`](crate::server::RoomServer::handle_connection)
//! onward.
//!
//! A minimal implementation over a pair of in-process channels:
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use tokio::sync::mpsc;
//! use roomcast::error::RoomcastError;
//! use roomcast::transport::Connection;
//!
//! struct ChannelConnection {
//!     outgoing: mpsc::UnboundedSender<String>,
//!     incoming: mpsc::UnboundedReceiver<String>,
//! }
//!
//! #[async_trait]
//! impl Connection for ChannelConnection {
//!     async fn send(&mut self, message: String) -> Result<(), RoomcastError> {
//!         self.outgoing
//!             .send(message)
//!             .map_err(|e| RoomcastError::TransportSend(e.to_string()))
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, RoomcastError>> {
//!         // None once the sending side is gone, i.e. a clean close.
//!         self.incoming.recv().await.map(Ok)
//!     }
//!
//!     async fn close(&mut self) -> Result<(), RoomcastError> {
//!         self.incoming.close();
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::RoomcastError;

/// One client's bidirectional text message channel.
///
/// Each [`send`](Connection::send) ships one complete serialized event to
/// the client; each [`recv`](Connection::recv) yields the next one the
/// client sent. The trait is object-safe, so `Box<dyn Connection>` works
/// where heterogeneous transports must coexist, though
/// `RoomServer::handle_connection` takes `impl Connection` and
/// monomorphizes.
///
/// # Cancel Safety
///
/// The per-connection task polls [`recv`](Connection::recv) inside
/// `tokio::select!`, so a `recv` future may be dropped before it resolves.
/// Implementations must not lose a message when that happens — the next
/// `recv` call has to yield it. Channel-backed implementations get this for
/// free; hand-rolled socket reads need buffering.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Send one JSON text message to the client.
    ///
    /// # Errors
    ///
    /// Returns [`RoomcastError::TransportSend`] when the message cannot be
    /// delivered, or [`RoomcastError::TransportClosed`] after a close.
    async fn send(&mut self, message: String) -> Result<(), RoomcastError>;

    /// Receive the next JSON text message from the client.
    ///
    /// Yields `Some(Ok(text))` per message, `Some(Err(_))` on a transport
    /// fault, and `None` once the client has closed cleanly. Must be
    /// cancel-safe (see the [trait docs](Connection)).
    async fn recv(&mut self) -> Option<Result<String, RoomcastError>>;

    /// Shut the connection down gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error when the close handshake fails; local resources are
    /// released regardless.
    async fn close(&mut self) -> Result<(), RoomcastError>;
}
