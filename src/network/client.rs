//! Dialer
//!
//! Opens a fresh connection for every token, writes one frame and shuts
//! the connection down again.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

use super::connection::{Connection, ConnectionError};
use super::NetworkConfig;
use crate::agent::TransportError;
use crate::protocol::Frame;
use crate::topology::Position;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Connection to node {0} timed out")]
    Timeout(Position),

    #[error("No address for node {0}")]
    NoAddress(Position),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<ClientError> for TransportError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Io(e) | ClientError::Connection(ConnectionError::Io(e)) => {
                TransportError::Io(e)
            }
            ClientError::Timeout(to) => TransportError::Timeout(to),
            ClientError::NoAddress(to) => TransportError::UnknownDestination(to),
            ClientError::Connection(ConnectionError::Timeout) => TransportError::Closed,
            ClientError::Connection(ConnectionError::Closed) => TransportError::Closed,
            ClientError::Connection(ConnectionError::Protocol(e)) => {
                TransportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            }
        }
    }
}

/// Delivers a single frame to another agent
#[async_trait]
pub trait LinkDialer: Send + Sync {
    async fn deliver(&self, to: Position, frame: &Frame) -> ClientResult<()>;
}

/// Dialer over TCP; one address per position
#[derive(Debug, Clone)]
pub struct TcpDialer {
    addresses: Vec<SocketAddr>,
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new(addresses: Vec<SocketAddr>, connect_timeout: Duration) -> Self {
        Self {
            addresses,
            connect_timeout,
        }
    }

    /// Addresses derived from the configured base port
    pub fn from_config(config: &NetworkConfig, line_length: usize) -> ClientResult<Self> {
        let addresses = (0..line_length)
            .map(|index| {
                let position = Position::new(index);
                config.agent_addr(position).ok_or(ClientError::NoAddress(position))
            })
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(Self::new(addresses, config.connect_timeout()))
    }
}

#[async_trait]
impl LinkDialer for TcpDialer {
    async fn deliver(&self, to: Position, frame: &Frame) -> ClientResult<()> {
        let addr = self
            .addresses
            .get(to.index())
            .copied()
            .ok_or(ClientError::NoAddress(to))?;

        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ClientError::Io(e)),
            Err(_) => return Err(ClientError::Timeout(to)),
        };

        let mut conn = Connection::new(stream, addr);
        conn.send(frame).await?;
        conn.close().await?;
        tracing::trace!("Delivered frame from {} to node {} at {}", frame.sender, to, addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeListener;
    use crate::protocol::Token;

    async fn ephemeral_listener(position: Position) -> NodeListener {
        NodeListener::bind_addr(
            "127.0.0.1:0".parse().unwrap(),
            position,
            Duration::from_secs(5),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_deliver_to_listener() {
        let listener = ephemeral_listener(Position::new(0)).await;
        let dialer = TcpDialer::new(vec![listener.local_addr()], Duration::from_secs(5));

        let frame = Frame::token(Position::new(1), Token::new(23));
        let (delivered, inbound) = tokio::join!(
            dialer.deliver(Position::new(0), &frame),
            listener.accept_frame()
        );
        delivered.unwrap();
        assert_eq!(inbound.unwrap().frame, frame);
    }

    #[tokio::test]
    async fn test_deliver_to_unknown_position() {
        let dialer = TcpDialer::new(Vec::new(), Duration::from_secs(1));
        let result = dialer
            .deliver(Position::new(3), &Frame::token(Position::new(2), Token::new(1)))
            .await;
        assert!(matches!(result, Err(ClientError::NoAddress(_))));
    }

    #[tokio::test]
    async fn test_deliver_to_closed_port_fails() {
        let listener = ephemeral_listener(Position::new(0)).await;
        let addr = listener.local_addr();
        drop(listener);

        let dialer = TcpDialer::new(vec![addr], Duration::from_secs(1));
        let result = dialer
            .deliver(Position::new(0), &Frame::token(Position::new(1), Token::new(1)))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_errors_map_to_transport_errors() {
        let to = Position::new(4);
        assert!(matches!(
            TransportError::from(ClientError::Timeout(to)),
            TransportError::Timeout(p) if p == to
        ));
        assert!(matches!(
            TransportError::from(ClientError::NoAddress(to)),
            TransportError::UnknownDestination(_)
        ));
        assert!(matches!(
            TransportError::from(ClientError::Connection(ConnectionError::Closed)),
            TransportError::Closed
        ));
        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert!(matches!(TransportError::from(ClientError::Io(refused)), TransportError::Io(_)));
    }

    #[test]
    fn test_from_config() {
        let dialer = TcpDialer::from_config(&NetworkConfig::new(28000), 5).unwrap();
        assert_eq!(dialer.addresses.len(), 5);
        assert_eq!(dialer.addresses[4].port(), 28004);
        assert!(TcpDialer::from_config(&NetworkConfig::new(u16::MAX), 2).is_err());
    }
}
