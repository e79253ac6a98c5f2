//! ChatServer: listener plus accept loop
//!
//! Owns the listening socket and a handle to the directory actor, and
//! spawns one handler task per accepted connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::directory::{Directory, DirectoryHandle};
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::transport::Listener;

/// A bound, not yet running, chat server
pub struct ChatServer {
    listener: Listener,
    directory: DirectoryHandle,
    config: Arc<ServerConfig>,
}

impl ChatServer {
    /// Bind the listener and start the directory actor
    ///
    /// Must be called inside a tokio runtime. A bind failure is returned
    /// to the caller and is fatal to the process.
    pub async fn bind(config: ServerConfig) -> Result<Self, AppError> {
        let listener = Listener::bind(&config.addr).await?;
        let directory = Directory::spawn();

        info!("Chat server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            directory,
            config: Arc::new(config),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        self.listener.local_addr()
    }

    /// Handle to the server's directory
    pub fn directory(&self) -> DirectoryHandle {
        self.directory.clone()
    }

    /// Accept connections forever
    ///
    /// Accept errors are logged and the loop keeps going.
    pub async fn run(self) -> Result<(), AppError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let directory = self.directory.clone();
                    let config = Arc::clone(&self.config);

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        match handle_connection(stream, addr.to_string(), directory, &config).await
                        {
                            Ok(reason) => debug!("Connection {} ended: {:?}", addr, reason),
                            Err(e) => error!("Connection handler error: {}", e),
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
