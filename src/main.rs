//! Line Chat Server - Entry Point
//!
//! Reads configuration, binds the listener and runs the accept loop.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use line_chat::{ChatServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=line_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("line_chat=info")),
        )
        .init();

    // Address and timeouts from flags or CHAT_* environment variables
    let config = ServerConfig::parse();

    // Bind failure is fatal
    let server = ChatServer::bind(config).await?;
    server.run().await?;

    Ok(())
}
