//! # Roomcast
//!
//! Room coordination and broadcast server for ephemeral multiplayer game
//! sessions over persistent bidirectional connections.
//!
//! Players create or join a named, passphrase-protected room with a fixed
//! capacity; the server tracks membership and one shared, opaque game-state
//! blob per room, and relays player actions to the other occupants in real
//! time. Rooms live purely in memory and are garbage-collected once every
//! occupant has disconnected.
//!
//! ## Architecture
//!
//! - [`registry`] — the authoritative in-memory room store: membership,
//!   capacity and identity invariants, and the reverse
//!   connection-to-room index.
//! - [`coordinator`] — translates each inbound event into one registry
//!   operation plus a deterministic set of outbound messages.
//! - [`protocol`] — the JSON wire event surface (`create-room`,
//!   `join-room`, `game-action`, …).
//! - [`transport`] / [`transports`] — the per-connection channel contract
//!   and the built-in WebSocket implementation.
//! - [`server`] — connection lifecycle, dispatch, and broadcast delivery.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> roomcast::error::Result<()> {
//! use std::sync::Arc;
//! use roomcast::server::{RoomServer, ServerConfig};
//! use roomcast::transports::WebSocketListener;
//!
//! let config = ServerConfig::new().with_port(9000);
//! let listener = WebSocketListener::bind(&config.addr()).await?;
//! let server = Arc::new(RoomServer::new());
//! server.run(listener).await
//! # }
//! ```

pub mod coordinator;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use coordinator::{Outbound, SessionCoordinator};
pub use error::RoomcastError;
pub use protocol::{ClientEvent, ServerEvent};
pub use registry::{RegistryError, RoomRegistry};
pub use server::{RoomServer, ServerConfig};
pub use transport::Connection;
