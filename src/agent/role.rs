//! Agent roles and lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// What an agent does with a token it receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Emits the first token and never acts again
    Origin,
    /// Passes the token unchanged to the opposite neighbor
    Forwarder,
    /// Replaces the token with a fresh draw and sends it to its live neighbor
    EndpointGenerator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Origin => write!(f, "origin"),
            Role::Forwarder => write!(f, "forwarder"),
            Role::EndpointGenerator => write!(f, "endpoint-generator"),
        }
    }
}

/// Lifecycle state of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    /// Configured, not yet started
    Idle,
    /// Forwarder that may still flip on its first token from the origin
    AwaitingRoleDecision,
    /// Forwarding tokens unchanged
    Forwarding,
    /// Generating fresh tokens
    Generating,
    /// Stopped by the coordinator; terminal
    Stopped,
}

impl AgentState {
    /// Whether the agent accepts tokens in this state
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            AgentState::AwaitingRoleDecision | AgentState::Forwarding | AgentState::Generating
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_states() {
        assert!(!AgentState::Idle.is_running());
        assert!(AgentState::AwaitingRoleDecision.is_running());
        assert!(AgentState::Forwarding.is_running());
        assert!(AgentState::Generating.is_running());
        assert!(!AgentState::Stopped.is_running());
    }
}
