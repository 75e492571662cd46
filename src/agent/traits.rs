//! Capability traits shared by agents and the substrates that drive them
//!
//! An agent never touches another agent's state. Everything between agents
//! goes through a `Transport`.

use std::io;
use thiserror::Error;

use super::{AgentResult, Outcome, Relay};
use crate::protocol::Token;
use crate::topology::Position;

/// Errors raised by a transport while delivering a token
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("No agent at position {0}")]
    UnknownDestination(Position),

    #[error("Link to {0} is already in use")]
    Busy(Position),

    #[error("Connection to {0} timed out")]
    Timeout(Position),

    #[error("Transport closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Point-to-point delivery of single tokens between agents
pub trait Transport {
    /// Hand one token from `from` to `to`
    fn send(&mut self, from: Position, to: Position, token: Token) -> TransportResult<()>;
}

/// Callbacks a scheduling substrate invokes on an agent
pub trait Agent: Send {
    /// Position of this agent in the line
    fn position(&self) -> Position;

    /// Start signal; returns the outcome of the send if the agent emitted one
    fn start(&mut self, transport: &mut dyn Transport) -> AgentResult<Option<Outcome>>;

    /// An encoded token arrived from `from`
    fn receive(
        &mut self,
        payload: &[u8],
        from: Position,
        transport: &mut dyn Transport,
    ) -> AgentResult<Relay>;

    /// Stop signal; idempotent
    fn stop(&mut self);
}
