//! Session definitions
//!
//! `Session` is the coordinator's record of a live, handshaken connection.
//! `SessionState` is the per-connection state machine driven by the
//! connection handler; it holds no I/O so its transitions can be tested
//! on their own.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{HandshakeError, SendError};
use crate::message::Handshake;
use crate::types::{RoomId, SessionId};

/// Live session entry
///
/// Holds the sending side of the connection's outbound queue. The
/// connection's writer task owns the socket and drains the queue.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Name given at handshake, not validated
    pub username: String,
    /// Room bound at handshake, never changes
    pub room_id: RoomId,
    /// Server → client byte queue
    sender: mpsc::Sender<Bytes>,
}

impl Session {
    pub fn new(id: SessionId, username: String, room_id: RoomId, sender: mpsc::Sender<Bytes>) -> Self {
        Self {
            id,
            username,
            room_id,
            sender,
        }
    }

    /// Queue bytes for this client without waiting
    ///
    /// A slow client gets messages dropped rather than stalling the sender.
    pub fn send(&self, payload: Bytes) -> Result<(), SendError> {
        self.sender.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    pub fn is_in(&self, room_id: &RoomId) -> bool {
        &self.room_id == room_id
    }
}

/// Something that happened on the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One inbound read
    Data(String),
    /// Peer closed its side cleanly
    EndOfStream,
    /// Socket-level fault
    TransportError(String),
    /// Nothing arrived before the handshake deadline
    HandshakeTimeout,
}

/// What the handler must do in response to an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Submit a parsed handshake to the coordinator
    Handshake(Handshake),
    /// Reply with an error and close
    Reject(HandshakeError),
    /// Broadcast a chat line
    Chat(String),
    /// Deregister from the coordinator
    Leave,
    /// Nothing to do
    Ignore,
}

/// Connection state machine
///
/// `AwaitingHandshake -> Active -> Closed`; no transition goes backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    Active { username: String, room_id: RoomId },
    Closed,
}

impl SessionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    /// Decide what an inbound event means in the current state
    ///
    /// A parse failure closes immediately. A parsed handshake leaves the
    /// state untouched until [`SessionState::complete_handshake`] reports
    /// the coordinator's verdict.
    pub fn on_event(&mut self, event: SessionEvent) -> SessionAction {
        match *self {
            SessionState::Closed => SessionAction::Ignore,

            SessionState::AwaitingHandshake => match event {
                SessionEvent::Data(data) => match Handshake::parse(&data) {
                    Ok(handshake) => SessionAction::Handshake(handshake),
                    Err(e) => {
                        *self = SessionState::Closed;
                        SessionAction::Reject(e)
                    }
                },
                _ => {
                    *self = SessionState::Closed;
                    SessionAction::Ignore
                }
            },

            SessionState::Active { .. } => match event {
                SessionEvent::Data(data) => {
                    let text = data.trim();
                    if text.is_empty() {
                        SessionAction::Ignore
                    } else {
                        SessionAction::Chat(text.to_string())
                    }
                }
                _ => {
                    *self = SessionState::Closed;
                    SessionAction::Leave
                }
            },
        }
    }

    /// Apply the coordinator's handshake verdict
    pub fn complete_handshake(&mut self, handshake: Handshake, accepted: bool) {
        if !matches!(self, SessionState::AwaitingHandshake) {
            return;
        }
        *self = if accepted {
            SessionState::Active {
                username: handshake.username,
                room_id: handshake.room_id,
            }
        } else {
            SessionState::Closed
        };
    }
}
