//! Room relay - Entry Point
//!
//! Parses the command line, sets up logging and runs the listener.

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use room_relay::config::{CHANNEL_BUFFER_SIZE, DEFAULT_PORT, OUTBOUND_BUFFER_SIZE};
use room_relay::Config;

/// Multi-room TCP chat relay
#[derive(Parser, Debug)]
#[command(name = "room_relay")]
#[command(about = "Multi-room TCP chat relay")]
#[command(version)]
struct Args {
    /// Interface to bind to
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Messages queued per client before new ones are dropped
    #[arg(long, default_value_t = OUTBOUND_BUFFER_SIZE)]
    outbound_buffer: usize,

    /// Close connections that send no handshake within this many seconds
    #[arg(long)]
    handshake_timeout_secs: Option<u64>,

    /// Send broadcasts without ANSI colors
    #[arg(long)]
    no_color: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "room_relay=info")]
    log_level: String,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            bind_address: format!("{}:{}", args.bind, args.port),
            channel_buffer: CHANNEL_BUFFER_SIZE,
            outbound_buffer: args.outbound_buffer,
            handshake_timeout: args.handshake_timeout_secs.map(Duration::from_secs),
            color: !args.no_color,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // RUST_LOG takes precedence over --log-level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    room_relay::run(Config::from(args)).await?;
    Ok(())
}
