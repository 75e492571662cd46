//! Relay module - Wires the line together and drives a run
//!
//! Provides:
//! - `RelayCoordinator`: directory, role assignment, simulated runs
//! - The live loopback runtime
//! - Run reports with every receipt and dispatch

mod coordinator;
mod live;
mod report;

pub use coordinator::*;
pub use report::*;

use thiserror::Error;

use crate::agent::AgentError;
use crate::config::ConfigError;
use crate::network::{ClientError, ServerError};
use crate::topology::DirectoryError;

/// Relay errors
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Network error: {0}")]
    Network(#[from] ServerError),

    #[error("Dialer error: {0}")]
    Client(#[from] ClientError),

    #[error("Agent task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;
