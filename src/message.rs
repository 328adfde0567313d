//! Wire protocol
//!
//! Text-based, `|`-delimited handshake and reply format plus the decorated
//! chat and system notices that are broadcast to room members.

use std::num::IntErrorKind;

use chrono::Local;

use crate::error::HandshakeError;
use crate::types::RoomId;

/// Field separator for handshake and reply lines
pub const DELIMITER: char = '|';

/// What the client wants to do with the room in its handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAction {
    /// `0`
    Create,
    /// Any other integer
    Join,
}

impl RoomAction {
    fn from_code(code: i64) -> Self {
        if code == 0 {
            RoomAction::Create
        } else {
            RoomAction::Join
        }
    }
}

/// First message on a connection: `username|roomId|action`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub username: String,
    pub room_id: RoomId,
    pub action: RoomAction,
}

impl Handshake {
    /// Parse a handshake line
    ///
    /// Surrounding whitespace (a trailing newline from line-based clients)
    /// is ignored; fields themselves are taken verbatim.
    pub fn parse(input: &str) -> Result<Self, HandshakeError> {
        let fields: Vec<&str> = input.trim().split(DELIMITER).collect();
        let [username, room_id, action] = fields.as_slice() else {
            return Err(HandshakeError::Malformed);
        };

        // Any integer counts, including ones too large for i64 (never 0)
        let action = match action.trim().parse::<i64>() {
            Ok(code) => RoomAction::from_code(code),
            Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                RoomAction::Join
            }
            Err(_) => return Err(HandshakeError::InvalidAction(action.to_string())),
        };

        Ok(Self {
            username: username.to_string(),
            room_id: RoomId::new(*room_id),
            action,
        })
    }
}

/// Server reply to a handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeReply {
    /// Session accepted, carries the room display name
    Success { room_name: String },
    /// Session rejected, connection will close
    Error { reason: String },
}

impl HandshakeReply {
    /// Encode as `SUCCESS|<name>` or `ERROR|<reason>`
    pub fn encode(&self) -> String {
        match self {
            HandshakeReply::Success { room_name } => format!("SUCCESS{DELIMITER}{room_name}"),
            HandshakeReply::Error { reason } => format!("ERROR{DELIMITER}{reason}"),
        }
    }
}

impl From<HandshakeError> for HandshakeReply {
    fn from(err: HandshakeError) -> Self {
        HandshakeReply::Error {
            reason: err.to_string(),
        }
    }
}

/// Something broadcast to a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Chat line from a member
    Chat { username: String, text: String },
    /// A member arrived
    Joined { username: String },
    /// A member left
    Left { username: String },
}

impl Notice {
    /// Render with the current local time
    pub fn render(&self, color: bool) -> String {
        self.render_at(&timestamp(), color)
    }

    /// Render with an explicit timestamp
    pub fn render_at(&self, time: &str, color: bool) -> String {
        let paint = |code: &str, text: &str| {
            if color {
                format!("\x1b[{code}m{text}\x1b[0m")
            } else {
                text.to_string()
            }
        };
        let stamp = paint("1", &format!("[{time}]"));

        match self {
            Notice::Chat { username, text } => {
                format!("{stamp} {}: {text}", paint("1;36", username))
            }
            Notice::Joined { username } => {
                format!("{stamp} {} joined the chat!", paint("1;32", username))
            }
            Notice::Left { username } => {
                format!("{stamp} 👋 {} left the chat!", paint("1;31", username))
            }
        }
    }
}

/// Local wall-clock time as `hh:mm AM`
pub fn timestamp() -> String {
    Local::now().format("%I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create() {
        let hs = Handshake::parse("alice|room1|0").unwrap();
        assert_eq!(hs.username, "alice");
        assert_eq!(hs.room_id, RoomId::new("room1"));
        assert_eq!(hs.action, RoomAction::Create);
    }

    #[test]
    fn test_parse_join_any_nonzero() {
        assert_eq!(Handshake::parse("bob|room1|1").unwrap().action, RoomAction::Join);
        assert_eq!(Handshake::parse("bob|room1|-7").unwrap().action, RoomAction::Join);
    }

    #[test]
    fn test_parse_oversized_integer_is_join() {
        assert_eq!(
            Handshake::parse("bob|room1|99999999999999999999").unwrap().action,
            RoomAction::Join
        );
        assert_eq!(
            Handshake::parse("bob|room1|-99999999999999999999").unwrap().action,
            RoomAction::Join
        );
    }

    #[test]
    fn test_parse_trims_line_ending() {
        let hs = Handshake::parse("alice|room1|0\r\n").unwrap();
        assert_eq!(hs.action, RoomAction::Create);
    }

    #[test]
    fn test_parse_wrong_field_count() {
        assert_eq!(Handshake::parse("alice|room1"), Err(HandshakeError::Malformed));
        assert_eq!(Handshake::parse("a|b|0|extra"), Err(HandshakeError::Malformed));
        assert_eq!(Handshake::parse(""), Err(HandshakeError::Malformed));
    }

    #[test]
    fn test_parse_non_integer_action() {
        assert_eq!(
            Handshake::parse("alice|room1|create"),
            Err(HandshakeError::InvalidAction("create".to_string()))
        );
    }

    #[test]
    fn test_reply_encoding() {
        let ok = HandshakeReply::Success {
            room_name: "Room room1".to_string(),
        };
        assert_eq!(ok.encode(), "SUCCESS|Room room1");

        let err: HandshakeReply = HandshakeError::CapacityExceeded.into();
        assert_eq!(err.encode(), "ERROR|Maximum number of rooms reached");
    }

    #[test]
    fn test_notice_plain() {
        let chat = Notice::Chat {
            username: "alice".to_string(),
            text: "hi".to_string(),
        };
        assert_eq!(chat.render_at("09:05 AM", false), "[09:05 AM] alice: hi");

        let joined = Notice::Joined {
            username: "bob".to_string(),
        };
        assert_eq!(joined.render_at("09:05 AM", false), "[09:05 AM] bob joined the chat!");
    }

    #[test]
    fn test_notice_colored() {
        let left = Notice::Left {
            username: "bob".to_string(),
        };
        let out = left.render_at("09:05 AM", true);
        assert!(out.starts_with("\x1b[1m[09:05 AM]\x1b[0m"));
        assert!(out.contains("\x1b[1;31mbob\x1b[0m left the chat!"));
    }
}
