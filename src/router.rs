//! Message fan-out
//!
//! Only the directory actor calls into the router, so every session sees
//! deliveries in the order the actor issued them. A failed delivery means
//! that session's drain task is gone; it is logged and skipped.

use tracing::{debug, warn};

use crate::message::ServerMessage;
use crate::session::Session;

/// Queue `msg` on every session in `targets`
///
/// Returns how many sessions accepted it.
pub fn broadcast<'a, I>(targets: I, msg: &ServerMessage) -> usize
where
    I: IntoIterator<Item = &'a Session>,
{
    let mut delivered = 0;
    for session in targets {
        if deliver(session, msg.clone()) {
            delivered += 1;
        }
    }
    debug!("Broadcast delivered to {} sessions", delivered);
    delivered
}

/// Queue `msg` on a single session
pub fn deliver(session: &Session, msg: ServerMessage) -> bool {
    match session.enqueue(msg) {
        Ok(()) => true,
        Err(e) => {
            warn!("Dropped message for {} ({}): {}", session.name, session.addr, e);
            false
        }
    }
}
