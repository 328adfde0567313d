//! Multi-room TCP Chat Relay Library
//!
//! Clients open a raw TCP connection, send a one-line handshake to create
//! or join a named room, and from then on every chunk they send is
//! broadcast to the other members of that room.
//!
//! # Protocol
//! - Handshake: `username|roomId|action`, `action` is `0` to create a room
//!   and any other integer to join one
//! - Reply: `SUCCESS|<room name>` or `ERROR|<reason>` (connection closes)
//! - Afterwards: raw text in, decorated `[time] user: text` out
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` owns the room registry and live-session index
//! - Each connection has a `handler` task driving a `SessionState` machine
//! - No locks are needed. All state access goes through message passing
//!
//! # Example
//! ```ignore
//! use room_relay::{run, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     run(Config::default()).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod listener;
pub mod message;
pub mod room;
pub mod router;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use error::{AppError, HandshakeError, RoomError, SendError};
pub use handler::{handle_connection, run_session, SessionOptions};
pub use listener::{run, serve, spawn_server};
pub use message::{Handshake, HandshakeReply, Notice, RoomAction};
pub use room::{Room, RoomRegistry, MAX_ROOMS};
pub use server::{ChatServer, ServerCommand, ServerStats};
pub use session::{Session, SessionAction, SessionEvent, SessionState};
pub use types::{RoomId, SessionId};
