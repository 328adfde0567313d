//! ChatServer Actor implementation
//!
//! The coordinator that owns all shared state: the room registry and the
//! live-session index. Connection handlers talk to it over an mpsc channel,
//! so every registry mutation is processed one at a time.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{HandshakeError, RoomError};
use crate::message::{Handshake, HandshakeReply, Notice, RoomAction};
use crate::room::{Room, RoomRegistry};
use crate::router;
use crate::session::Session;
use crate::types::{RoomId, SessionId};

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Admit a connection into a room
    ///
    /// The reply line is queued on `sender` by the server; `respond_to`
    /// carries the verdict (room display name on success).
    Handshake {
        session_id: SessionId,
        handshake: Handshake,
        sender: mpsc::Sender<Bytes>,
        respond_to: oneshot::Sender<Result<String, HandshakeError>>,
    },
    /// Broadcast a chat line from an active session
    Chat {
        session_id: SessionId,
        text: String,
    },
    /// Active session disconnected
    Leave {
        session_id: SessionId,
    },
    /// Look up a room
    GetRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Result<Room, RoomError>>,
    },
    /// Snapshot of registry sizes
    Stats {
        respond_to: oneshot::Sender<ServerStats>,
    },
}

/// Registry and index sizes at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStats {
    pub rooms: usize,
    pub sessions: usize,
}

/// The main ChatServer actor
pub struct ChatServer {
    /// All rooms: RoomId -> Room
    rooms: RoomRegistry,
    /// Handshaken sessions: SessionId -> Session
    sessions: HashMap<SessionId, Session>,
    /// Decorate broadcasts with ANSI colors
    color: bool,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            rooms: RoomRegistry::new(),
            sessions: HashMap::new(),
            color: true,
            receiver,
        }
    }

    /// Replace the room registry (e.g. to change the room cap)
    pub fn with_registry(mut self, rooms: RoomRegistry) -> Self {
        self.rooms = rooms;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Handshake {
                session_id,
                handshake,
                sender,
                respond_to,
            } => {
                let result = self.handle_handshake(session_id, handshake, sender);
                let _ = respond_to.send(result);
            }
            ServerCommand::Chat { session_id, text } => {
                self.handle_chat(session_id, text);
            }
            ServerCommand::Leave { session_id } => {
                self.handle_leave(session_id);
            }
            ServerCommand::GetRoom {
                room_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.rooms.get_room(&room_id).cloned());
            }
            ServerCommand::Stats { respond_to } => {
                let _ = respond_to.send(ServerStats {
                    rooms: self.rooms.room_count(),
                    sessions: self.sessions.len(),
                });
            }
        }
    }

    /// Handle a handshake: create or join, register, announce
    fn handle_handshake(
        &mut self,
        session_id: SessionId,
        handshake: Handshake,
        sender: mpsc::Sender<Bytes>,
    ) -> Result<String, HandshakeError> {
        let room_name = match self.admit(&handshake) {
            Ok(name) => name,
            Err(e) => {
                info!(
                    "Rejected {} ({}) for room {}: {}",
                    session_id, handshake.username, handshake.room_id, e
                );
                let reply = HandshakeReply::from(e.clone());
                let _ = sender.try_send(Bytes::from(reply.encode()));
                return Err(e);
            }
        };

        // Reply is queued before the session becomes visible to broadcasts
        let reply = HandshakeReply::Success {
            room_name: room_name.clone(),
        };
        let _ = sender.try_send(Bytes::from(reply.encode()));

        let Handshake {
            username, room_id, ..
        } = handshake;
        info!("{} ({}) joined room {}", username, session_id, room_id);

        let notice = Notice::Joined {
            username: username.clone(),
        };
        self.sessions.insert(
            session_id,
            Session::new(session_id, username, room_id.clone(), sender),
        );
        self.announce(&room_id, session_id, &notice);

        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.room_count()
        );
        Ok(room_name)
    }

    /// Registry side of a handshake
    fn admit(&mut self, handshake: &Handshake) -> Result<String, HandshakeError> {
        if handshake.action == RoomAction::Create {
            self.rooms.create_room(handshake.room_id.clone())?;
            info!("Room {} created", handshake.room_id);
        }
        self.rooms.increment_membership(&handshake.room_id)?;
        Ok(self.rooms.get_room(&handshake.room_id)?.name.clone())
    }

    /// Handle chat message
    fn handle_chat(&mut self, session_id: SessionId, text: String) {
        let Some(session) = self.sessions.get(&session_id) else {
            debug!("Chat from unknown session {}", session_id);
            return;
        };

        debug!("{} (Room: {}): {}", session.username, session.room_id, text);

        let room_id = session.room_id.clone();
        let notice = Notice::Chat {
            username: session.username.clone(),
            text,
        };
        self.announce(&room_id, session_id, &notice);
    }

    /// Handle departure: decrement, deregister, announce
    fn handle_leave(&mut self, session_id: SessionId) {
        let Some(session) = self.sessions.remove(&session_id) else {
            return;
        };

        info!("{} ({}) left room {}", session.username, session_id, session.room_id);

        match self.rooms.decrement_membership(&session.room_id) {
            Ok(Some(remaining)) => debug!("Room {} has {} members", session.room_id, remaining),
            Ok(None) => info!("Room {} is now empty and was removed", session.room_id),
            Err(e) => warn!("Membership out of sync: {}", e),
        }

        let notice = Notice::Left {
            username: session.username,
        };
        self.announce(&session.room_id, session_id, &notice);

        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.room_count()
        );
    }

    /// Render and broadcast a notice to a room
    fn announce(&self, room_id: &RoomId, exclude: SessionId, notice: &Notice) {
        let payload = Bytes::from(notice.render(self.color));
        let delivered = router::broadcast(self.sessions.values(), room_id, exclude, &payload);
        debug!("Delivered to {} sessions in room {}", delivered, room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive the actor directly, without sockets
    struct Harness {
        cmd_tx: mpsc::Sender<ServerCommand>,
    }

    struct Member {
        id: SessionId,
        rx: mpsc::Receiver<Bytes>,
    }

    impl Member {
        fn next_text(&mut self) -> String {
            let bytes = self.rx.try_recv().expect("expected a queued message");
            String::from_utf8(bytes.to_vec()).unwrap()
        }
    }

    impl Harness {
        fn start(max_rooms: usize) -> Self {
            let (cmd_tx, cmd_rx) = mpsc::channel(64);
            let server = ChatServer::new(cmd_rx)
                .with_registry(RoomRegistry::with_capacity(max_rooms))
                .with_color(false);
            tokio::spawn(server.run());
            Self { cmd_tx }
        }

        async fn handshake(&self, line: &str) -> (Result<String, HandshakeError>, Member) {
            let (tx, rx) = mpsc::channel(16);
            let (respond_to, verdict) = oneshot::channel();
            let id = SessionId::new();
            self.cmd_tx
                .send(ServerCommand::Handshake {
                    session_id: id,
                    handshake: Handshake::parse(line).unwrap(),
                    sender: tx,
                    respond_to,
                })
                .await
                .unwrap();
            (verdict.await.unwrap(), Member { id, rx })
        }

        async fn leave(&self, member: &Member) {
            self.cmd_tx
                .send(ServerCommand::Leave {
                    session_id: member.id,
                })
                .await
                .unwrap();
        }

        async fn chat(&self, member: &Member, text: &str) {
            self.cmd_tx
                .send(ServerCommand::Chat {
                    session_id: member.id,
                    text: text.to_string(),
                })
                .await
                .unwrap();
        }

        async fn get_room(&self, id: &str) -> Result<Room, RoomError> {
            let (respond_to, rx) = oneshot::channel();
            self.cmd_tx
                .send(ServerCommand::GetRoom {
                    room_id: RoomId::new(id),
                    respond_to,
                })
                .await
                .unwrap();
            rx.await.unwrap()
        }

        async fn stats(&self) -> ServerStats {
            let (respond_to, rx) = oneshot::channel();
            self.cmd_tx
                .send(ServerCommand::Stats { respond_to })
                .await
                .unwrap();
            rx.await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_then_join() {
        let server = Harness::start(20);

        let (result, mut alice) = server.handshake("alice|room1|0").await;
        assert_eq!(result, Ok("Room room1".to_string()));
        assert_eq!(alice.next_text(), "SUCCESS|Room room1");

        let (result, mut bob) = server.handshake("bob|room1|1").await;
        assert!(result.is_ok());
        assert_eq!(bob.next_text(), "SUCCESS|Room room1");

        // Only the existing member hears about the arrival
        assert!(alice.next_text().ends_with("bob joined the chat!"));
        assert!(bob.rx.try_recv().is_err());

        assert_eq!(server.get_room("room1").await.unwrap().member_count, 2);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let server = Harness::start(20);
        let _ = server.handshake("alice|room1|0").await;

        let (result, mut again) = server.handshake("alice|room1|0").await;
        assert_eq!(result, Err(HandshakeError::RoomAlreadyExists(RoomId::new("room1"))));
        assert_eq!(again.next_text(), "ERROR|Room with ID room1 already exists");
        assert_eq!(server.stats().await, ServerStats { rooms: 1, sessions: 1 });
    }

    #[tokio::test]
    async fn test_join_missing_room_rejected() {
        let server = Harness::start(20);
        let (result, mut member) = server.handshake("bob|nowhere|1").await;

        assert_eq!(result, Err(HandshakeError::RoomNotFound(RoomId::new("nowhere"))));
        assert_eq!(member.next_text(), "ERROR|Room with ID nowhere doesn't exist");
        assert_eq!(server.stats().await, ServerStats { rooms: 0, sessions: 0 });
    }

    #[tokio::test]
    async fn test_capacity_and_recovery() {
        let server = Harness::start(20);
        let mut members = Vec::new();
        for i in 0..20 {
            let (result, member) = server.handshake(&format!("u{i}|r{i}|0")).await;
            assert!(result.is_ok());
            members.push(member);
        }

        let (result, _) = server.handshake("late|r20|0").await;
        assert_eq!(result, Err(HandshakeError::CapacityExceeded));

        server.leave(&members[0]).await;
        assert!(server.get_room("r0").await.is_err());

        let (result, _) = server.handshake("late|r20|0").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_room_deleted_after_all_leave() {
        let server = Harness::start(20);
        let (_, alice) = server.handshake("alice|room1|0").await;
        let (_, bob) = server.handshake("bob|room1|1").await;
        let (_, carol) = server.handshake("carol|room1|1").await;

        server.leave(&alice).await;
        server.leave(&bob).await;
        assert_eq!(server.get_room("room1").await.unwrap().member_count, 1);

        server.leave(&carol).await;
        assert_eq!(
            server.get_room("room1").await.unwrap_err(),
            RoomError::NotFound(RoomId::new("room1"))
        );

        // A deleted room cannot be joined
        let (result, _) = server.handshake("dave|room1|1").await;
        assert_eq!(result, Err(HandshakeError::RoomNotFound(RoomId::new("room1"))));
    }

    #[tokio::test]
    async fn test_chat_not_echoed_and_room_scoped() {
        let server = Harness::start(20);
        let (_, mut alice) = server.handshake("alice|room1|0").await;
        let (_, mut bob) = server.handshake("bob|room1|1").await;
        let (_, mut eve) = server.handshake("eve|room2|0").await;
        alice.next_text();
        alice.next_text();
        bob.next_text();
        eve.next_text();

        server.chat(&alice, "hello").await;
        // Round-trip through the actor so the chat has been processed
        server.stats().await;

        assert!(bob.next_text().ends_with("alice: hello"));
        assert!(alice.rx.try_recv().is_err());
        assert!(eve.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_leave_notifies_remaining() {
        let server = Harness::start(20);
        let (_, mut alice) = server.handshake("alice|room1|0").await;
        let (_, bob) = server.handshake("bob|room1|1").await;
        alice.next_text();
        alice.next_text();

        server.leave(&bob).await;
        server.stats().await;

        assert!(alice.next_text().ends_with("bob left the chat!"));
    }
}
