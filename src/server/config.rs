//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u16 = 8080;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// The request head must arrive within this time
    pub request_timeout: Duration,

    /// Largest accepted request head in bytes (at least 8 KiB)
    pub max_request_head_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true, // Events are small and latency-sensitive
            request_timeout: Duration::from_secs(10),
            max_request_head_size: 8 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set request head timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the request head size limit
    pub fn max_request_head_size(mut self, size: usize) -> Self {
        self.max_request_head_size = size;
        self
    }

    /// Disable TCP_NODELAY
    pub fn disable_nodelay(mut self) -> Self {
        self.tcp_nodelay = false;
        self
    }
}
