//! Transport implementations for roomcast.
//!
//! Concrete [`Connection`](crate::Connection) implementations live here
//! behind feature gates:
//!
//! | Feature                | Transport                                      |
//! |------------------------|------------------------------------------------|
//! | `transport-websocket`  | [`WebSocketConnection`], [`WebSocketListener`] |

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnection, WebSocketListener};
