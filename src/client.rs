//! Client-side connection
//!
//! `ChatClient` is the entry point for anything talking to the server:
//! connect, send a raw line, read a line. The command helpers only build
//! the line; the server does all interpretation.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::AppError;
use crate::transport::{line_reader, line_writer, LineCodec, DEFAULT_MAX_LINE_LENGTH};

/// Lines arriving from the server
pub type ServerLines = FramedRead<OwnedReadHalf, LineCodec>;

/// Lines going to the server
pub type ServerSink = FramedWrite<OwnedWriteHalf, LineCodec>;

/// A connection to a chat server
pub struct ChatClient {
    lines: ServerLines,
    sink: ServerSink,
    local_addr: SocketAddr,
}

impl ChatClient {
    /// Connect to `addr` (`host:port`)
    pub async fn connect(addr: &str) -> Result<Self, AppError> {
        let stream = TcpStream::connect(addr).await?;
        let local_addr = stream.local_addr()?;
        let (read, write) = stream.into_split();

        Ok(Self {
            lines: line_reader(read, DEFAULT_MAX_LINE_LENGTH),
            sink: line_writer(write),
            local_addr,
        })
    }

    /// Local address, which is also this client's initial name on the server
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send one line; a trailing newline is added
    pub async fn send_line(&mut self, line: &str) -> Result<(), AppError> {
        self.sink.send(line).await
    }

    /// Next line from the server, `None` once the server closed the connection
    pub async fn read_line(&mut self) -> Result<Option<String>, AppError> {
        self.lines.next().await.transpose()
    }

    /// Ask for the online user list
    pub async fn who(&mut self) -> Result<(), AppError> {
        self.send_line("who").await
    }

    /// Ask to be known as `name`
    pub async fn rename(&mut self, name: &str) -> Result<(), AppError> {
        self.send_line(&format!("rename|{}", name)).await
    }

    /// Send `body` to `target` only
    pub async fn direct(&mut self, target: &str, body: &str) -> Result<(), AppError> {
        self.send_line(&format!("to|{}|{}", target, body)).await
    }

    /// Split into independent read and write sides
    pub fn split(self) -> (ServerLines, ServerSink) {
        (self.lines, self.sink)
    }
}
