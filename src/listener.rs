//! Connection listener
//!
//! Accepts TCP connections and spawns a handler task per connection.

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::handler::{handle_connection, SessionOptions};
use crate::server::{ChatServer, ServerCommand};

/// Bind, start the ChatServer actor and accept connections forever
pub async fn run(config: Config) -> Result<(), AppError> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Room relay listening on {}", listener.local_addr()?);

    let cmd_tx = spawn_server(&config);
    serve(listener, cmd_tx, SessionOptions::from(&config)).await;
    Ok(())
}

/// Start the ChatServer actor and return its command channel
pub fn spawn_server(config: &Config) -> mpsc::Sender<ServerCommand> {
    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_buffer);
    let server = ChatServer::new(cmd_rx).with_color(config.color);
    tokio::spawn(server.run());
    info!("ChatServer actor started");
    cmd_tx
}

/// Connection accept loop
pub async fn serve(
    listener: TcpListener,
    cmd_tx: mpsc::Sender<ServerCommand>,
    options: SessionOptions,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    match handle_connection(stream, cmd_tx, options).await {
                        Ok(()) => {}
                        Err(AppError::Handshake(e)) => debug!("Handshake from {} rejected: {}", addr, e),
                        Err(e) => error!("Connection handler error: {}", e),
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
