//! Connection handling for LineRelay
//!
//! A connection carries exactly one frame: the dialer writes it and shuts
//! the stream down, the listener reads it and drops the stream.

use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::{CodecError, Decoder, Encoder, Frame};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Connection closed")]
    Closed,

    #[error("Connection timeout")]
    Timeout,
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// State of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Stream open, frame not yet exchanged
    Open,
    /// Connection has been shut down
    Closed,
}

/// Connection statistics
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// A framed TCP stream to another agent
pub struct Connection {
    remote_addr: SocketAddr,
    stream: TcpStream,
    encoder: Encoder,
    decoder: Decoder,
    read_buf: BytesMut,
    write_buf: BytesMut,
    state: ConnectionState,
    stats: ConnectionStats,
}

impl Connection {
    /// Wrap an established TCP stream
    pub fn new(stream: TcpStream, remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            stream,
            encoder: Encoder::new(),
            decoder: Decoder::new(),
            read_buf: BytesMut::with_capacity(256),
            write_buf: BytesMut::with_capacity(256),
            state: ConnectionState::Open,
            stats: ConnectionStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Send a frame
    pub async fn send(&mut self, frame: &Frame) -> ConnectionResult<()> {
        self.write_buf.clear();
        self.encoder.encode(frame, &mut self.write_buf)?;

        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        self.stats.frames_sent += 1;
        self.stats.bytes_sent += self.write_buf.len() as u64;
        Ok(())
    }

    /// Receive a frame (returns None on a clean close before any data)
    pub async fn recv(&mut self) -> ConnectionResult<Option<Frame>> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.read_buf)? {
                self.stats.frames_received += 1;
                return Ok(Some(frame));
            }

            let mut buf = [0u8; 256];
            let n = self.stream.read(&mut buf).await?;

            if n == 0 {
                if self.read_buf.is_empty() && !self.decoder.is_mid_frame() {
                    return Ok(None);
                } else {
                    return Err(ConnectionError::Protocol(CodecError::Incomplete));
                }
            }

            self.read_buf.extend_from_slice(&buf[..n]);
            self.stats.bytes_received += n as u64;
        }
    }

    /// Receive a frame with a timeout
    pub async fn recv_timeout(&mut self, timeout: Duration) -> ConnectionResult<Option<Frame>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    /// Shut the write half down; the peer sees end of stream
    pub async fn close(&mut self) -> ConnectionResult<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.stream.shutdown().await?;
        self.state = ConnectionState::Closed;
        tracing::trace!(
            "Closed connection to {} after {} frames sent",
            self.remote_addr,
            self.stats.frames_sent
        );
        Ok(())
    }
}
