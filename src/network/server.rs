//! Agent listener
//!
//! Every agent binds its own listener before the run starts, so tokens
//! sent before the receiving task is scheduled wait in the backlog.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;

use super::connection::{Connection, ConnectionError};
use super::NetworkConfig;
use crate::protocol::Frame;
use crate::topology::Position;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Bind failed: {0}")]
    BindFailed(String),

    #[error("No port available for node {0}")]
    NoAddress(Position),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// A frame read off an accepted connection
#[derive(Debug)]
pub struct Inbound {
    pub peer: SocketAddr,
    pub frame: Frame,
}

/// Listening socket of one agent
pub struct NodeListener {
    position: Position,
    listener: TcpListener,
    local_addr: SocketAddr,
    read_timeout: Duration,
}

impl NodeListener {
    /// Bind the listener for `position` at its configured address
    pub async fn bind(config: &NetworkConfig, position: Position) -> ServerResult<Self> {
        let addr = config
            .agent_addr(position)
            .ok_or(ServerError::NoAddress(position))?;
        Self::bind_addr(addr, position, config.read_timeout()).await
    }

    /// Bind at an explicit address; port 0 picks a free port
    pub async fn bind_addr(
        addr: SocketAddr,
        position: Position,
        read_timeout: Duration,
    ) -> ServerResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            ServerError::BindFailed(format!("Failed to bind to {}: {}", addr, e))
        })?;
        let local_addr = listener.local_addr()?;
        tracing::debug!("Node {} listening on {}", position, local_addr);

        Ok(Self {
            position,
            listener,
            local_addr,
            read_timeout,
        })
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept the next connection and read its single frame
    pub async fn accept_frame(&self) -> ServerResult<Inbound> {
        let (stream, peer) = self.listener.accept().await?;
        tracing::trace!("Node {} accepted connection from {}", self.position, peer);

        let mut conn = Connection::new(stream, peer);
        let frame = conn
            .recv_timeout(self.read_timeout)
            .await?
            .ok_or(ConnectionError::Closed)?;

        Ok(Inbound { peer, frame })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Token;

    #[tokio::test]
    async fn test_accepts_frame() {
        let listener = NodeListener::bind_addr(
            "127.0.0.1:0".parse().unwrap(),
            Position::new(2),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let addr = listener.local_addr();

        tokio::spawn(async move {
            let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            let mut conn = Connection::new(stream, addr);
            conn.send(&Frame::token(Position::new(1), Token::new(7))).await.unwrap();
            conn.close().await.unwrap();
        });

        let inbound = listener.accept_frame().await.unwrap();
        assert_eq!(inbound.frame.sender, Position::new(1));
        assert_eq!(inbound.frame.to_token().unwrap(), Token::new(7));
    }

    #[tokio::test]
    async fn test_empty_connection_is_closed() {
        let listener = NodeListener::bind_addr(
            "127.0.0.1:0".parse().unwrap(),
            Position::new(0),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let addr = listener.local_addr();

        tokio::spawn(async move {
            let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            drop(stream);
        });

        assert!(matches!(
            listener.accept_frame().await,
            Err(ServerError::Connection(ConnectionError::Closed))
        ));
    }
}
