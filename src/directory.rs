//! Directory actor implementation
//!
//! The directory owns the set of online sessions and the name index over
//! them. It runs as a single task fed by an mpsc channel, so every
//! registration, rename, lookup and fan-out is one atomic step with
//! respect to all others, and a `who` listing is always a consistent
//! snapshot.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::message::{ServerMessage, ARRIVAL, DEPARTURE};
use crate::router;
use crate::session::{Inbox, Session};
use crate::types::{Member, SessionId};

/// Channel buffer size for directory commands
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// Commands sent from connection handlers to the directory
#[derive(Debug)]
pub enum DirectoryCommand {
    /// Register a new session under its address
    Online {
        id: SessionId,
        addr: String,
        inbox: Inbox,
        reply: oneshot::Sender<Result<String, AppError>>,
    },
    /// Remove a session
    Offline { id: SessionId },
    /// Change a session's name
    Rename { id: SessionId, name: String },
    /// List online users to the requester
    Who { id: SessionId },
    /// Message to everyone
    Broadcast { id: SessionId, body: String },
    /// Message to one named user
    Direct {
        id: SessionId,
        target: String,
        body: String,
    },
    /// Queue a message to the session itself
    Notify {
        id: SessionId,
        message: ServerMessage,
    },
    /// Current members, sorted by name
    Snapshot {
        reply: oneshot::Sender<Vec<Member>>,
    },
}

/// The directory actor
///
/// `sessions` is keyed by id; `names` maps each current name to its id.
/// Both always hold exactly the same set of sessions.
pub struct Directory {
    sessions: HashMap<SessionId, Session>,
    names: HashMap<String, SessionId>,
    receiver: mpsc::Receiver<DirectoryCommand>,
}

impl Directory {
    /// Create a new Directory with the given command receiver
    pub fn new(receiver: mpsc::Receiver<DirectoryCommand>) -> Self {
        Self {
            sessions: HashMap::new(),
            names: HashMap::new(),
            receiver,
        }
    }

    /// Start a directory task and return a handle to it
    pub fn spawn() -> DirectoryHandle {
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        tokio::spawn(Directory::new(receiver).run());
        DirectoryHandle { sender }
    }

    /// Run the directory event loop
    ///
    /// Continuously receives and processes commands until all handles are dropped.
    pub async fn run(mut self) {
        info!("Directory started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("Directory shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: DirectoryCommand) {
        match cmd {
            DirectoryCommand::Online {
                id,
                addr,
                inbox,
                reply,
            } => {
                let _ = reply.send(self.handle_online(id, addr, inbox));
            }
            DirectoryCommand::Offline { id } => self.handle_offline(id),
            DirectoryCommand::Rename { id, name } => self.handle_rename(id, name),
            DirectoryCommand::Who { id } => self.handle_who(id),
            DirectoryCommand::Broadcast { id, body } => self.handle_broadcast(id, body),
            DirectoryCommand::Direct { id, target, body } => {
                self.handle_direct(id, target, body)
            }
            DirectoryCommand::Notify { id, message } => {
                if let Some(session) = self.sessions.get(&id) {
                    router::deliver(session, message);
                }
            }
            DirectoryCommand::Snapshot { reply } => {
                let _ = reply.send(self.members());
            }
        }
    }

    /// Handle session registration
    fn handle_online(
        &mut self,
        id: SessionId,
        addr: String,
        inbox: Inbox,
    ) -> Result<String, AppError> {
        let session = Session::new(id, addr, inbox);

        if self.names.contains_key(&session.name) {
            warn!("Cannot register {}: name already in use", session.addr);
            router::deliver(&session, AppError::NameConflict(session.name.clone()).into());
            return Err(AppError::NameConflict(session.name));
        }

        info!("{} is online", session.name);
        let name = session.name.clone();
        let arrival = session.broadcast(ARRIVAL);
        self.names.insert(name.clone(), id);
        self.sessions.insert(id, session);

        router::broadcast(self.sessions.values(), &arrival);
        debug!("Online sessions: {}", self.sessions.len());

        Ok(name)
    }

    /// Handle session removal
    fn handle_offline(&mut self, id: SessionId) {
        let Some(session) = self.sessions.remove(&id) else {
            debug!("Session {} already offline", id);
            return;
        };
        self.names.remove(&session.name);

        info!("{} is offline", session.name);
        let departure = session.broadcast(DEPARTURE);
        // Dropping the session closes its inbox
        drop(session);

        router::broadcast(self.sessions.values(), &departure);
        debug!("Online sessions: {}", self.sessions.len());
    }

    /// Handle rename
    fn handle_rename(&mut self, id: SessionId, name: String) {
        if self.names.contains_key(&name) {
            if let Some(session) = self.sessions.get(&id) {
                router::deliver(session, AppError::NameConflict(name).into());
            }
            return;
        }

        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };

        info!("{} renamed to {}", session.name, name);
        self.names.remove(&session.name);
        self.names.insert(name.clone(), id);
        session.name = name.clone();

        router::deliver(session, ServerMessage::Renamed { name });
    }

    /// Handle online user listing
    fn handle_who(&self, id: SessionId) {
        let Some(session) = self.sessions.get(&id) else {
            return;
        };

        for member in self.members() {
            router::deliver(
                session,
                ServerMessage::Online {
                    addr: member.addr,
                    name: member.name,
                },
            );
        }
    }

    /// Handle public message
    fn handle_broadcast(&self, id: SessionId, body: String) {
        let Some(sender) = self.sessions.get(&id) else {
            return;
        };

        debug!("Broadcast from {}", sender.name);
        let msg = sender.broadcast(body);
        router::broadcast(self.sessions.values(), &msg);
    }

    /// Handle direct message
    fn handle_direct(&self, id: SessionId, target: String, body: String) {
        let Some(sender) = self.sessions.get(&id) else {
            return;
        };

        let Some(recipient) = self
            .names
            .get(&target)
            .and_then(|target_id| self.sessions.get(target_id))
        else {
            debug!("{} messaged unknown user {}", sender.name, target);
            router::deliver(sender, AppError::RecipientNotFound(target).into());
            return;
        };

        debug!("Direct message from {} to {}", sender.name, recipient.name);
        router::deliver(
            recipient,
            ServerMessage::Direct {
                from: sender.name.clone(),
                body,
            },
        );
    }

    /// Helper: all online members sorted by name
    fn members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self.sessions.values().map(Session::member).collect();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        members
    }
}

/// Cloneable handle for talking to the directory actor
#[derive(Debug, Clone)]
pub struct DirectoryHandle {
    sender: mpsc::Sender<DirectoryCommand>,
}

impl DirectoryHandle {
    /// Wrap an existing command sender
    pub fn new(sender: mpsc::Sender<DirectoryCommand>) -> Self {
        Self { sender }
    }

    async fn send(&self, cmd: DirectoryCommand) -> Result<(), AppError> {
        self.sender.send(cmd).await.map_err(|_| AppError::ChannelSend)
    }

    /// Register a session; returns the name it was registered under
    pub async fn online(
        &self,
        id: SessionId,
        addr: String,
        inbox: Inbox,
    ) -> Result<String, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(DirectoryCommand::Online {
            id,
            addr,
            inbox,
            reply,
        })
        .await?;
        rx.await.map_err(|_| AppError::ChannelSend)?
    }

    pub async fn offline(&self, id: SessionId) -> Result<(), AppError> {
        self.send(DirectoryCommand::Offline { id }).await
    }

    pub async fn rename(&self, id: SessionId, name: String) -> Result<(), AppError> {
        self.send(DirectoryCommand::Rename { id, name }).await
    }

    pub async fn who(&self, id: SessionId) -> Result<(), AppError> {
        self.send(DirectoryCommand::Who { id }).await
    }

    pub async fn broadcast(&self, id: SessionId, body: String) -> Result<(), AppError> {
        self.send(DirectoryCommand::Broadcast { id, body }).await
    }

    pub async fn direct(&self, id: SessionId, target: String, body: String) -> Result<(), AppError> {
        self.send(DirectoryCommand::Direct { id, target, body }).await
    }

    pub async fn notify(&self, id: SessionId, message: ServerMessage) -> Result<(), AppError> {
        self.send(DirectoryCommand::Notify { id, message }).await
    }

    /// Current members, sorted by name
    pub async fn snapshot(&self) -> Result<Vec<Member>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(DirectoryCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }
}
