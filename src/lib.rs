//! Line-Oriented TCP Chat Server Library
//!
//! A small group/direct messaging server over newline-terminated text,
//! built on tokio using the Actor pattern for the shared user directory.
//!
//! # Features
//! - Users identified by name, defaulting to their remote address
//! - Public messages delivered to everyone online, sender included
//! - Direct messages (`to|name|message`)
//! - Renaming (`rename|name`) and roster queries (`who`)
//! - Idle timeout with forced disconnect
//!
//! # Architecture
//! - `Directory` is the central actor owning all online sessions
//! - Each connection has a `handler` task reading lines and a drain task
//!   writing its inbox back out
//! - No locks needed - all directory access goes through message passing
//!
//! # Example
//! ```ignore
//! use line_chat::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default().with_addr("127.0.0.1:8888");
//!     let server = ChatServer::bind(config).await.unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod handler;
pub mod message;
pub mod router;
pub mod server;
pub mod session;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::ChatClient;
pub use config::{ClientConfig, ServerConfig};
pub use directory::{Directory, DirectoryCommand, DirectoryHandle};
pub use error::{AppError, SendError};
pub use handler::{handle_connection, Disconnect};
pub use message::{Command, ServerMessage};
pub use server::ChatServer;
pub use session::{Session, SessionHandle};
pub use transport::{LineCodec, Listener};
pub use types::{Member, SessionId};
