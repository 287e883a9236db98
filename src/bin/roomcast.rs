//! Roomcast server binary.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roomcast::server::{RoomServer, ServerConfig, DEFAULT_PORT};
use roomcast::transports::WebSocketListener;

/// Room coordination and broadcast server for ephemeral multiplayer game
/// sessions.
#[derive(Debug, Parser)]
#[command(name = "roomcast", version, about)]
struct Args {
    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Listen port.
    #[arg(long, env = "ROOMCAST_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> roomcast::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig::new().with_host(args.host).with_port(args.port);

    let listener = WebSocketListener::bind(&config.addr()).await?;
    info!(addr = %config.addr(), "roomcast listening");

    let server = Arc::new(RoomServer::new());
    server.run(listener).await
}
