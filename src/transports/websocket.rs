//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketListener`] binds a TCP socket and yields raw streams;
//! [`WebSocketConnection`] performs the server-side upgrade handshake and
//! implements [`Connection`] over the resulting frame stream. Splitting the
//! two keeps the handshake off the accept loop — a client that stalls
//! mid-upgrade only blocks its own task.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is
//! enabled (it is enabled by default).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::RoomcastError;
use crate::transport::Connection;

/// Type alias for the underlying server-side WebSocket stream.
pub type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

// ── Listener ────────────────────────────────────────────────────────

/// Accepts TCP connections destined to become WebSocket sessions.
#[derive(Debug)]
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    /// Bind to the given address, e.g. `"0.0.0.0:9000"`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomcastError::Io`] if the address cannot be bound.
    pub async fn bind(addr: &str) -> Result<Self, RoomcastError> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    /// Local address the listener is bound to (useful with port 0 in tests).
    ///
    /// # Errors
    ///
    /// Returns [`RoomcastError::Io`] if the socket has no local address.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, RoomcastError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept the next raw TCP stream.
    ///
    /// The WebSocket upgrade is deliberately left to the caller (via
    /// [`WebSocketConnection::accept`]) so it can run on the per-connection
    /// task instead of the accept loop.
    ///
    /// # Errors
    ///
    /// Returns [`RoomcastError::Io`] if the accept fails.
    pub async fn accept(&self) -> Result<(TcpStream, std::net::SocketAddr), RoomcastError> {
        Ok(self.listener.accept().await?)
    }
}

// ── Connection ──────────────────────────────────────────────────────

/// A [`Connection`] implementation backed by a server-side WebSocket.
///
/// Translates between the JSON text-message session protocol and WebSocket
/// frames: text frames carry messages, close frames end the stream, pings
/// are answered by tungstenite automatically, and binary frames are skipped
/// with a warning.
///
/// # Cancel Safety
///
/// The [`recv`](Connection::recv) method is cancel-safe. Dropping the future
/// returned by `recv` before it completes will not consume or lose any
/// messages, making it safe to use inside `tokio::select!`.
#[derive(Debug)]
pub struct WebSocketConnection {
    stream: WsStream,
    closed: bool,
}

impl WebSocketConnection {
    /// Perform the server-side WebSocket upgrade on an accepted TCP stream.
    ///
    /// # Errors
    ///
    /// Returns [`RoomcastError::Io`] if the handshake fails. When the
    /// underlying error is an I/O error its
    /// [`ErrorKind`](std::io::ErrorKind) is preserved; all other errors are
    /// mapped to [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn accept(stream: TcpStream) -> Result<Self, RoomcastError> {
        let stream = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            RoomcastError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::debug!("WebSocket handshake completed");

        Ok(Self {
            stream,
            closed: false,
        })
    }

    /// Wrap an already-upgraded WebSocket stream.
    ///
    /// Useful when the upgrade happened elsewhere (custom handshake
    /// validation, HTTP router integration).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send(&mut self, message: String) -> Result<(), RoomcastError> {
        if self.closed {
            return Err(RoomcastError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| RoomcastError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, RoomcastError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(RoomcastError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                Message::Ping(_) => {
                    // tungstenite auto-queues a Pong reply; nothing to do.
                }
                Message::Pong(_) => {
                    // Ignored; continue the loop.
                }
                Message::Binary(_) => {
                    tracing::warn!("received unexpected binary WebSocket frame, skipping");
                }
                Message::Frame(_) => {
                    // Never produced by the read half; kept for exhaustiveness.
                    tracing::debug!("received raw WebSocket frame, skipping");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), RoomcastError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| RoomcastError::TransportSend(e.to_string()))
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn websocket_connection_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketConnection>();
    }

    #[tokio::test]
    async fn bind_to_ephemeral_port_reports_local_addr() {
        let listener = WebSocketListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn bind_fails_on_invalid_address() {
        let result = WebSocketListener::bind("not-an-address").await;
        assert!(matches!(result, Err(RoomcastError::Io(_))));
    }

    /// Accept one connection, upgrade it, and run `handler` on the stream.
    async fn start_server<F, Fut>(handler: F) -> std::net::SocketAddr
    where
        F: FnOnce(WebSocketConnection) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = WebSocketListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let conn = WebSocketConnection::accept(tcp).await.unwrap();
            handler(conn).await;
        });

        addr
    }

    #[tokio::test]
    async fn text_frames_round_trip() {
        let addr = start_server(|mut conn| async move {
            // Echo everything until the client closes.
            while let Some(Ok(text)) = conn.recv().await {
                conn.send(text).await.unwrap();
            }
        })
        .await;

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        client.send(Message::Text("hello".into())).await.unwrap();

        let reply = client.next().await.unwrap().unwrap();
        assert_eq!(reply, Message::Text("hello".into()));
    }

    #[tokio::test]
    async fn recv_returns_none_on_client_close() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let addr = start_server(|mut conn| async move {
            let result = conn.recv().await;
            let _ = done_tx.send(result.is_none());
        })
        .await;

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        client.close(None).await.unwrap();

        assert!(done_rx.await.unwrap());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let addr = start_server(|mut conn| async move {
            let first = conn.recv().await.unwrap().unwrap();
            let _ = done_tx.send(first);
        })
        .await;

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        client
            .send(Message::Binary(vec![0xDE, 0xAD].into()))
            .await
            .unwrap();
        client
            .send(Message::Text("after_binary".into()))
            .await
            .unwrap();

        assert_eq!(done_rx.await.unwrap(), "after_binary");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let addr = start_server(|mut conn| async move {
            conn.close().await.unwrap();
            // Second close is idempotent.
            conn.close().await.unwrap();
            let err = conn.send("oops".to_string()).await.unwrap_err();
            assert!(matches!(err, RoomcastError::TransportClosed));
        })
        .await;

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        // Drain until the server's close frame arrives.
        while let Some(Ok(_)) = client.next().await {}
    }
}
