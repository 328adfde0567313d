//! TCP connection handler
//!
//! Drives one connection: reads raw chunks off the socket, feeds them
//! through the session state machine, talks to the ChatServer, and runs a
//! writer task that drains the connection's outbound queue.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::message::HandshakeReply;
use crate::server::ServerCommand;
use crate::session::{SessionAction, SessionEvent, SessionState};
use crate::types::SessionId;

/// Per-connection settings taken from [`Config`]
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub outbound_buffer: usize,
    pub handshake_timeout: Option<Duration>,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            outbound_buffer: config.outbound_buffer,
            handshake_timeout: config.handshake_timeout,
        }
    }
}

/// Handle a new TCP connection
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    options: SessionOptions,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let session_id = SessionId::new();
    info!("Session {} connected from {}", session_id, peer_addr);

    let (reader, writer) = stream.into_split();
    let result = run_session(reader, writer, session_id, cmd_tx, options).await;

    info!("Session {} disconnected", session_id);
    result
}

/// Run the session protocol over any byte stream pair
pub async fn run_session<R, W>(
    reader: R,
    writer: W,
    session_id: SessionId,
    cmd_tx: mpsc::Sender<ServerCommand>,
    options: SessionOptions,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, mut out_rx) = mpsc::channel::<Bytes>(options.outbound_buffer.max(1));

    // Spawn write task (outbound queue -> socket)
    let write_task = tokio::spawn(async move {
        let mut sink = FramedWrite::new(writer, BytesCodec::new());
        while let Some(payload) = out_rx.recv().await {
            if let Err(e) = sink.send(payload).await {
                debug!("Write failed for {}: {}", session_id, e);
                return;
            }
        }
        // Flush and shut down our side once nobody can queue more
        let _ = SinkExt::<Bytes>::close(&mut sink).await;
        debug!("Write task ended for {}", session_id);
    });

    let mut frames = FramedRead::new(reader, BytesCodec::new());
    let mut state = SessionState::AwaitingHandshake;
    let mut result = Ok(());

    while !state.is_closed() {
        let event = next_event(&mut frames, &state, options.handshake_timeout).await;
        if let SessionEvent::TransportError(e) = &event {
            warn!("Transport error for {}: {}", session_id, e);
        }

        match state.on_event(event) {
            SessionAction::Handshake(handshake) => {
                let (respond_to, verdict) = oneshot::channel();
                let cmd = ServerCommand::Handshake {
                    session_id,
                    handshake: handshake.clone(),
                    sender: out_tx.clone(),
                    respond_to,
                };
                if cmd_tx.send(cmd).await.is_err() {
                    result = Err(AppError::ChannelSend);
                    break;
                }
                match verdict.await {
                    Ok(Ok(room_name)) => {
                        debug!("Session {} active in {}", session_id, room_name);
                        state.complete_handshake(handshake, true);
                    }
                    Ok(Err(e)) => {
                        state.complete_handshake(handshake, false);
                        result = Err(e.into());
                    }
                    Err(_) => {
                        result = Err(AppError::ChannelSend);
                        break;
                    }
                }
            }
            SessionAction::Reject(e) => {
                warn!("Bad handshake from {}: {}", session_id, e);
                let reply = HandshakeReply::from(e.clone());
                let _ = out_tx.send(Bytes::from(reply.encode())).await;
                result = Err(e.into());
            }
            SessionAction::Chat(text) => {
                if cmd_tx.send(ServerCommand::Chat { session_id, text }).await.is_err() {
                    result = Err(AppError::ChannelSend);
                    break;
                }
            }
            SessionAction::Leave => {
                let _ = cmd_tx.send(ServerCommand::Leave { session_id }).await;
            }
            SessionAction::Ignore => {}
        }
    }

    // The server drops its clone on leave; ours goes here
    drop(out_tx);
    drop(frames);
    let _ = write_task.await;

    result
}

/// Wait for the next inbound event, applying the handshake deadline
async fn next_event<R>(
    frames: &mut FramedRead<R, BytesCodec>,
    state: &SessionState,
    handshake_timeout: Option<Duration>,
) -> SessionEvent
where
    R: AsyncRead + Unpin,
{
    let next = match (state, handshake_timeout) {
        (SessionState::AwaitingHandshake, Some(limit)) => {
            match tokio::time::timeout(limit, frames.next()).await {
                Ok(next) => next,
                Err(_) => return SessionEvent::HandshakeTimeout,
            }
        }
        _ => frames.next().await,
    };

    match next {
        Some(Ok(chunk)) => SessionEvent::Data(String::from_utf8_lossy(&chunk).into_owned()),
        Some(Err(e)) => SessionEvent::TransportError(e.to_string()),
        None => SessionEvent::EndOfStream,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::server::ChatServer;

    fn options() -> SessionOptions {
        SessionOptions {
            outbound_buffer: 16,
            handshake_timeout: None,
        }
    }

    fn start_server() -> mpsc::Sender<ServerCommand> {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        tokio::spawn(ChatServer::new(cmd_rx).with_color(false).run());
        cmd_tx
    }

    #[tokio::test]
    async fn test_malformed_handshake_over_duplex() {
        let cmd_tx = start_server();
        let (client, server) = tokio::io::duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);
        let task = tokio::spawn(run_session(
            server_read,
            server_write,
            SessionId::new(),
            cmd_tx,
            options(),
        ));

        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"alice|room1").await.unwrap();

        let mut reply = String::new();
        client_read.read_to_string(&mut reply).await.unwrap();
        assert_eq!(reply, "ERROR|Invalid connection data format");

        let result = task.await.unwrap();
        assert!(matches!(result, Err(AppError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_handshake_timeout_closes() {
        let cmd_tx = start_server();
        let (client, server) = tokio::io::duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);
        let opts = SessionOptions {
            outbound_buffer: 16,
            handshake_timeout: Some(Duration::from_millis(50)),
        };

        let result = run_session(server_read, server_write, SessionId::new(), cmd_tx, opts).await;
        assert!(result.is_ok());
        drop(client);
    }

    #[tokio::test]
    async fn test_success_reply_over_duplex() {
        let cmd_tx = start_server();
        let (client, server) = tokio::io::duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);
        tokio::spawn(run_session(
            server_read,
            server_write,
            SessionId::new(),
            cmd_tx,
            options(),
        ));

        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"alice|room1|0\n").await.unwrap();

        let mut buf = vec![0u8; 64];
        let n = client_read.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"SUCCESS|Room room1");
    }
}
