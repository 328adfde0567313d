//! Runtime configuration

use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u16 = 2864;

/// Channel buffer size for coordinator commands
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// Per-session outbound queue length
pub const OUTBOUND_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address to listen on, `host:port`
    pub bind_address: String,
    /// Coordinator command channel capacity
    pub channel_buffer: usize,
    /// Messages queued per client before new ones are dropped
    pub outbound_buffer: usize,
    /// Close connections that send no handshake within this window
    pub handshake_timeout: Option<Duration>,
    /// Decorate broadcasts with ANSI colors
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{DEFAULT_PORT}"),
            channel_buffer: CHANNEL_BUFFER_SIZE,
            outbound_buffer: OUTBOUND_BUFFER_SIZE,
            handshake_timeout: None,
            color: true,
        }
    }
}
