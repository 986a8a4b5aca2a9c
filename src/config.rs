//! Static configuration for the transports.
//!
//! Both structs deserialize with `serde`, falling back to defaults for any
//! missing field, and offer builder-style setters for use in code.

use serde::Deserialize;

use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Default listen address for the RPC server.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Default maximum RPC request body size (64 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Configuration for the RPC [`Server`](crate::transport::Server).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. `"127.0.0.1:8080"`.
    pub addr: String,
    /// Largest accepted request body in bytes.
    pub max_message_size: usize,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Configuration for the [`PipeHandler`](crate::transport::PipeHandler).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Largest accepted frame payload in bytes.
    pub max_frame_size: u32,
}

impl PipeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_frame_size(mut self, limit: u32) -> Self {
        self.max_frame_size = limit;
        self
    }
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
