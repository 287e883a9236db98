//! Error types for the roomcast server.

use thiserror::Error;

/// Errors that can occur while running the roomcast server.
///
/// Domain-level failures (room not found, wrong passphrase, …) are not
/// represented here — they are recoverable by the client and travel as
/// [`RegistryError`](crate::registry::RegistryError) values that the
/// coordinator turns into wire messages.
#[derive(Debug, Error)]
pub enum RoomcastError {
    /// Failed to send a message through a connection.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from a connection.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred (bind, accept, or handshake).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for roomcast operations.
pub type Result<T> = std::result::Result<T, RoomcastError>;
