//! Network module - Loopback TCP links between agents
//!
//! Provides:
//! - A listener per agent that accepts one frame per connection
//! - A dialer that opens a fresh connection for every token
//! - Framed connections on top of `TcpStream`

mod client;
mod connection;
mod server;

pub use client::*;
pub use server::*;

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::topology::Position;

/// Configuration for network operations
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address every agent listens on
    pub bind_address: IpAddr,
    /// Agent `p` listens on `base_port + p`
    pub base_port: u16,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// How long a listener waits for the frame after accepting
    pub read_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::from([127, 0, 0, 1]),
            base_port: crate::protocol::DEFAULT_BASE_PORT,
            connect_timeout_ms: 1000,
            read_timeout_ms: 1000,
        }
    }
}

impl NetworkConfig {
    pub fn new(base_port: u16) -> Self {
        Self {
            base_port,
            ..Default::default()
        }
    }

    /// Socket address of the agent at `position`
    pub fn agent_addr(&self, position: Position) -> Option<SocketAddr> {
        let port = u16::try_from(usize::from(self.base_port) + position.index()).ok()?;
        Some(SocketAddr::new(self.bind_address, port))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl From<&crate::config::NetworkConfig> for NetworkConfig {
    fn from(config: &crate::config::NetworkConfig) -> Self {
        Self {
            bind_address: config.bind_address,
            base_port: config.base_port,
            connect_timeout_ms: config.connect_timeout_ms,
            read_timeout_ms: config.connect_timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_addresses() {
        let config = NetworkConfig::new(28000);
        assert_eq!(
            config.agent_addr(Position::new(3)),
            Some("127.0.0.1:28003".parse().unwrap())
        );

        let config = NetworkConfig::new(u16::MAX);
        assert!(config.agent_addr(Position::new(0)).is_some());
        assert!(config.agent_addr(Position::new(1)).is_none());
    }
}
