//! Server and client configuration
//!
//! Both binaries read their settings from command line flags, with
//! environment variable fallbacks for the server.

use std::time::Duration;

use clap::Parser;

use crate::transport::DEFAULT_MAX_LINE_LENGTH;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8888";

/// Default idle timeout in seconds
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Server settings
#[derive(Debug, Clone, Parser)]
#[command(name = "line_chat", about = "Line-oriented TCP chat server", long_about = None)]
pub struct ServerConfig {
    /// Address to listen on (host:port)
    #[arg(long, env = "CHAT_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Seconds without input before a connection is dropped
    #[arg(
        long = "idle-timeout",
        env = "CHAT_IDLE_TIMEOUT_SECS",
        default_value = "300",
        value_parser = parse_seconds
    )]
    pub idle_timeout: Duration,

    /// Longest accepted input line in bytes
    #[arg(long, env = "CHAT_MAX_LINE_LENGTH", default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    pub max_line_length: usize,
}

impl ServerConfig {
    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Client settings
#[derive(Debug, Clone, Parser)]
#[command(name = "chat_client", about = "Line-oriented TCP chat client", long_about = None)]
pub struct ClientConfig {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(long, default_value_t = 8888)]
    pub port: u16,
}

impl ClientConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a (possibly fractional) number of seconds
fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|e| format!("invalid number of seconds '{}': {}", value, e))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("timeout must be positive, got '{}'", value));
    }
    Ok(Duration::from_secs_f64(secs))
}
