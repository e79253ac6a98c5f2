//! Error types for the chat server
//!
//! Defines application-level errors and inbox send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Transport errors end the connection they occurred on. The remaining
/// variants are reported back to the offending session as a single line
/// and leave the connection open.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal to the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound line exceeded the configured limit (fatal to the connection)
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    /// Directory actor is gone (fatal to the connection)
    #[error("Channel send error")]
    ChannelSend,

    /// Requested name is already held by an online session
    #[error("Name already in use: {0}")]
    NameConflict(String),

    /// Direct message addressed to a name nobody holds
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    /// `to|` command without a target name or body separator
    #[error("Missing target")]
    MissingTarget,

    /// `to|name|` with nothing after the second pipe
    #[error("Empty message body")]
    EmptyBody,

    /// Rename target that can never be a valid name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// No input for the configured idle duration
    #[error("Idle timeout")]
    IdleTimeout,
}

/// Inbox send errors
///
/// Occurs when the session's drain task has already stopped.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the inbox has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
