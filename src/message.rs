//! Message protocol definitions
//!
//! Plain-text protocol: one command per inbound line, one notice per
//! outbound line. Commands are pipe-delimited and case-sensitive:
//!
//! - `who` lists online users
//! - `rename|<name>` changes the sender's name
//! - `to|<name>|<body>` sends a direct message
//! - anything else, including an empty line, is broadcast

use std::fmt;

use crate::error::AppError;

/// Broadcast body announcing a session coming online
pub const ARRIVAL: &str = "has come online";

/// Broadcast body announcing a session going offline
pub const DEPARTURE: &str = "has gone offline";

const WHO: &str = "who";
const RENAME_PREFIX: &str = "rename|";
const DIRECT_PREFIX: &str = "to|";

/// Client → Server command, decoded from one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List online users
    Who,
    /// Change own display name
    Rename { name: String },
    /// Send a message to one named user
    Direct { target: String, body: String },
    /// Send a message to everyone, sender included
    Broadcast { body: String },
}

impl Command {
    /// Interpret one inbound line
    ///
    /// Malformed `rename|` and `to|` commands yield the protocol error to
    /// report back; they are never downgraded to a broadcast.
    pub fn parse(line: &str) -> Result<Self, AppError> {
        if line == WHO {
            return Ok(Command::Who);
        }

        if let Some(name) = line.strip_prefix(RENAME_PREFIX) {
            if name.is_empty() {
                return Err(AppError::InvalidName("name must not be empty".to_string()));
            }
            if name.contains('|') {
                return Err(AppError::InvalidName("name must not contain '|'".to_string()));
            }
            return Ok(Command::Rename {
                name: name.to_string(),
            });
        }

        if let Some(rest) = line.strip_prefix(DIRECT_PREFIX) {
            let Some((target, body)) = rest.split_once('|') else {
                return Err(AppError::MissingTarget);
            };
            if target.is_empty() {
                return Err(AppError::MissingTarget);
            }
            if body.is_empty() {
                return Err(AppError::EmptyBody);
            }
            return Ok(Command::Direct {
                target: target.to_string(),
                body: body.to_string(),
            });
        }

        Ok(Command::Broadcast {
            body: line.to_string(),
        })
    }
}

/// Server → Client notice
///
/// Rendered to a single line through `Display`; the codec adds the
/// terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Public message, arrival or departure notice
    Broadcast {
        addr: String,
        name: String,
        body: String,
    },
    /// One row of a `who` listing
    Online { addr: String, name: String },
    /// Direct message received
    Direct { from: String, body: String },
    /// Rename accepted
    Renamed { name: String },
    /// Forced disconnect after inactivity
    IdleTimeout,
    /// Rejected command
    Error { message: String },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Broadcast { addr, name, body } => write!(f, "[{addr}]{name}: {body}"),
            ServerMessage::Online { addr, name } => write!(f, "[{addr}]{name}: online"),
            ServerMessage::Direct { from, body } => write!(f, "{from} says to you: {body}"),
            ServerMessage::Renamed { name } => write!(f, "You are now known as {name}"),
            ServerMessage::IdleTimeout => write!(f, "Idle timeout, connection closed"),
            ServerMessage::Error { message } => write!(f, "{message}"),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let message = match err {
            AppError::NameConflict(name) => format!("Name '{}' is already in use", name),
            AppError::RecipientNotFound(name) => format!("User '{}' not found", name),
            AppError::MissingTarget => "Invalid format, use \"to|name|message\"".to_string(),
            AppError::EmptyBody => "Message body is empty, please resend".to_string(),
            AppError::InvalidName(reason) => format!("Invalid name: {}", reason),
            AppError::IdleTimeout => return ServerMessage::IdleTimeout,
            // Fatal errors are not typically converted (connection closes)
            _ => "Internal error".to_string(),
        };
        ServerMessage::Error { message }
    }
}
