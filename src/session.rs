//! Session definitions
//!
//! `Session` is the directory's record of one online connection: its
//! identity plus the sending side of its inbox. `SessionHandle` is the
//! connection handler's view of the same session, used to drive the
//! Online, Rename and Offline transitions through the directory.
//! `drain_loop` is the per-session task writing inbox contents to the
//! socket in FIFO order.

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::directory::DirectoryHandle;
use crate::error::{AppError, SendError};
use crate::message::{Command, ServerMessage};
use crate::transport::line_writer;
use crate::types::{Member, SessionId};

/// Sending side of a session inbox (unbounded, never blocks the producer)
pub type Inbox = mpsc::UnboundedSender<ServerMessage>;

/// Receiving side of a session inbox, owned by the drain task
pub type InboxReceiver = mpsc::UnboundedReceiver<ServerMessage>;

/// Create a new session inbox
pub fn inbox() -> (Inbox, InboxReceiver) {
    mpsc::unbounded_channel()
}

/// Online session as stored in the directory
#[derive(Debug)]
pub struct Session {
    /// Stable identifier, survives renames
    pub id: SessionId,
    /// Current display name, unique among online sessions
    pub name: String,
    /// Remote address, also the initial name
    pub addr: String,
    inbox: Inbox,
}

impl Session {
    /// Create a session named after its address
    pub fn new(id: SessionId, addr: String, inbox: Inbox) -> Self {
        Self {
            id,
            name: addr.clone(),
            addr,
            inbox,
        }
    }

    /// Queue a message for this session
    ///
    /// Returns an error if the drain task has stopped (connection gone).
    pub fn enqueue(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.inbox.send(msg).map_err(|_| SendError::ChannelClosed)
    }

    pub fn member(&self) -> Member {
        Member::new(self.name.clone(), self.addr.clone())
    }

    /// Format a broadcast from this session
    pub fn broadcast(&self, body: impl Into<String>) -> ServerMessage {
        ServerMessage::Broadcast {
            addr: self.addr.clone(),
            name: self.name.clone(),
            body: body.into(),
        }
    }
}

/// Write every queued message to `writer`, one line each
///
/// Ends when all inbox senders are dropped or a write fails, then shuts
/// down the writer. Returns the number of lines written.
pub async fn drain_loop<W>(mut inbox: InboxReceiver, writer: W) -> usize
where
    W: AsyncWrite + Unpin,
{
    let mut sink = line_writer(writer);
    let mut written = 0;

    while let Some(msg) = inbox.recv().await {
        if let Err(e) = sink.send(msg).await {
            debug!("Write failed, ending drain loop: {}", e);
            break;
        }
        written += 1;
    }

    let _ = SinkExt::<ServerMessage>::close(&mut sink).await;
    written
}

/// Spawn the drain task for one session
pub fn spawn_drain<W>(inbox: InboxReceiver, writer: W) -> JoinHandle<usize>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(drain_loop(inbox, writer))
}

/// Connection-side handle for one session
///
/// Tracks whether the session is registered so that `offline` runs at
/// most once per connection.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    addr: String,
    directory: DirectoryHandle,
    online: bool,
}

impl SessionHandle {
    pub fn new(addr: String, directory: DirectoryHandle) -> Self {
        Self {
            id: SessionId::new(),
            addr,
            directory,
            online: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Register under the address-derived name and announce arrival
    ///
    /// The directory takes ownership of `inbox`; on failure it has already
    /// queued the reason to the client and dropped the inbox.
    pub async fn online(&mut self, inbox: Inbox) -> Result<String, AppError> {
        let name = self
            .directory
            .online(self.id, self.addr.clone(), inbox)
            .await?;
        self.online = true;
        Ok(name)
    }

    /// Remove from the directory and announce departure
    ///
    /// No-op after the first call.
    pub async fn offline(&mut self) -> Result<(), AppError> {
        if !self.online {
            return Ok(());
        }
        self.online = false;
        self.directory.offline(self.id).await
    }

    /// Decode one inbound line and hand it to the directory
    ///
    /// Malformed commands are answered to this session only.
    pub async fn interpret(&self, line: &str) -> Result<(), AppError> {
        match Command::parse(line) {
            Ok(Command::Who) => self.directory.who(self.id).await,
            Ok(Command::Rename { name }) => self.directory.rename(self.id, name).await,
            Ok(Command::Direct { target, body }) => {
                self.directory.direct(self.id, target, body).await
            }
            Ok(Command::Broadcast { body }) => self.directory.broadcast(self.id, body).await,
            Err(e) => {
                debug!("Rejected line from {}: {}", self.addr, e);
                self.notify(e.into()).await
            }
        }
    }

    /// Queue a message to this session, ordered after anything the
    /// directory has already queued
    pub async fn notify(&self, msg: ServerMessage) -> Result<(), AppError> {
        self.directory.notify(self.id, msg).await
    }
}
