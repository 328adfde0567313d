//! Broadcast routing
//!
//! Fans a payload out to every live session in a room except one.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::SendError;
use crate::session::Session;
use crate::types::{RoomId, SessionId};

/// Deliver `payload` to every session in `room_id` other than `exclude`
///
/// Delivery is best-effort: a full or closed queue is logged and skipped.
/// Returns the number of sessions the payload was queued for.
pub fn broadcast<'a>(
    sessions: impl IntoIterator<Item = &'a Session>,
    room_id: &RoomId,
    exclude: SessionId,
    payload: &Bytes,
) -> usize {
    let mut delivered = 0;

    for session in sessions {
        if session.id == exclude || !session.is_in(room_id) {
            continue;
        }

        match session.send(payload.clone()) {
            Ok(()) => delivered += 1,
            Err(SendError::QueueFull) => {
                warn!("Dropping message for {} ({}): queue full", session.id, session.username);
            }
            Err(SendError::ChannelClosed) => {
                debug!("Session {} already closed, skipping", session.id);
            }
        }
    }

    delivered
}
