//! Error types for the relay
//!
//! Defines connection-level errors, handshake rejections and registry errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::RoomId;

/// Connection-level errors
///
/// Fatal for the one connection they occur on, never for the process.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error on the client socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - coordinator is gone)
    #[error("Channel send error")]
    ChannelSend,

    /// Handshake was rejected
    #[error("Handshake rejected: {0}")]
    Handshake(#[from] HandshakeError),
}

/// Handshake rejections
///
/// The `Display` text is sent verbatim to the client as the `ERROR|` reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// Not exactly three `|`-separated fields
    #[error("Invalid connection data format")]
    Malformed,

    /// The action field is not an integer
    #[error("Invalid room action '{0}'")]
    InvalidAction(String),

    #[error("Room with ID {0} already exists")]
    RoomAlreadyExists(RoomId),

    #[error("Room with ID {0} doesn't exist")]
    RoomNotFound(RoomId),

    #[error("Maximum number of rooms reached")]
    CapacityExceeded,
}

/// Room registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room {0} already exists")]
    AlreadyExists(RoomId),

    #[error("maximum rooms reached")]
    CapacityExceeded,

    #[error("room {0} not found")]
    NotFound(RoomId),
}

impl From<RoomError> for HandshakeError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::AlreadyExists(id) => HandshakeError::RoomAlreadyExists(id),
            RoomError::CapacityExceeded => HandshakeError::CapacityExceeded,
            RoomError::NotFound(id) => HandshakeError::RoomNotFound(id),
        }
    }
}

/// Outbound delivery errors
///
/// Occurs when a session's outbound queue cannot accept a message.
#[derive(Debug, Error)]
pub enum SendError {
    /// The writer task has gone away
    #[error("Channel closed")]
    ChannelClosed,

    /// The client is not draining its queue fast enough
    #[error("Outbound queue full")]
    QueueFull,
}
