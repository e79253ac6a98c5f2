//! Connection handler
//!
//! Drives one connection through its lifecycle:
//! Connecting → Online → Active (reading lines, idle clock reset on each)
//! → Offline → Closed. Every exit path after registration goes through
//! Offline, so the directory drops the session and the others see one
//! departure notice. On idle timeout the client is told why before the
//! connection closes.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::directory::DirectoryHandle;
use crate::error::AppError;
use crate::session::{self, SessionHandle};
use crate::transport::line_reader;

/// Upper bound on flushing queued output after the session goes offline
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Why a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// Peer closed its side of the connection
    PeerClosed,
    /// Read failed or the peer sent an oversized line
    ReadError,
    /// No input within the idle timeout
    IdleTimeout,
    /// Registration refused (name already in use)
    Rejected,
    /// Directory stopped while the connection was active
    ServerClosed,
}

/// Handle a new connection
///
/// `peer_addr` is the session's address and initial name. Returns why the
/// connection ended; an `Err` means the directory was unreachable before
/// the session could register.
pub async fn handle_connection<S>(
    stream: S,
    peer_addr: String,
    directory: DirectoryHandle,
    config: &ServerConfig,
) -> Result<Disconnect, AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);

    // Server -> client path: inbox drained by its own task
    let (inbox_tx, inbox_rx) = session::inbox();
    let mut drain = session::spawn_drain(inbox_rx, writer);

    let mut session = SessionHandle::new(peer_addr, directory);
    match session.online(inbox_tx).await {
        Ok(name) => info!("Session {} online as {}", session.id(), name),
        Err(AppError::NameConflict(name)) => {
            warn!("Refusing {}: name {} in use", session.addr(), name);
            let _ = timeout(DRAIN_GRACE, &mut drain).await;
            return Ok(Disconnect::Rejected);
        }
        Err(e) => {
            drain.abort();
            return Err(e);
        }
    }

    let mut lines = line_reader(reader, config.max_line_length);
    let reason = loop {
        match timeout(config.idle_timeout, lines.next()).await {
            Err(_) => break Disconnect::IdleTimeout,
            Ok(None) => break Disconnect::PeerClosed,
            Ok(Some(Err(e))) => {
                warn!("Read error from {}: {}", session.addr(), e);
                break Disconnect::ReadError;
            }
            Ok(Some(Ok(line))) => {
                if session.interpret(&line).await.is_err() {
                    break Disconnect::ServerClosed;
                }
            }
        }
    };

    if reason == Disconnect::IdleTimeout {
        info!("Session {} idle for {:?}", session.addr(), config.idle_timeout);
        let _ = session.notify(AppError::IdleTimeout.into()).await;
    }

    if let Err(e) = session.offline().await {
        debug!("Offline for {} not delivered: {}", session.addr(), e);
    }

    // Inbox is closed once the directory drops the session; wait for the
    // remaining output and the write shutdown
    match timeout(DRAIN_GRACE, &mut drain).await {
        Ok(Ok(written)) => debug!("Drained {} lines to {}", written, session.addr()),
        Ok(Err(e)) => warn!("Drain task for {} failed: {}", session.addr(), e),
        Err(_) => {
            warn!("Drain for {} timed out", session.addr());
            drain.abort();
        }
    }

    info!("Session {} closed: {:?}", session.addr(), reason);
    Ok(reason)
}
