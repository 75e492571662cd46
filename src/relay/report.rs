//! Run reports
//!
//! Everything observable about a run: who received what, who sent what,
//! and how each agent ended up.

use serde::Serialize;
use std::fmt;
use std::path::Path;

use super::RelayResult;
use crate::agent::{AgentState, AgentStats, NodeAgent, Outcome, Relay, Role};
use crate::protocol::Token;
use crate::topology::Position;

/// A token accepted by an agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub time: f64,
    pub position: Position,
    pub from: Position,
    pub value: Token,
}

/// A token handed to the transport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRecord {
    pub time: f64,
    pub from: Position,
    pub to: Position,
    pub value: Token,
    pub generated: bool,
}

/// A token the transport refused; it is dropped without retry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Abandonment {
    pub time: f64,
    pub from: Position,
    pub to: Position,
    pub value: Token,
    pub reason: String,
}

/// The moment an agent turned into an endpoint generator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlipRecord {
    pub time: f64,
    pub position: Position,
}

/// Final state of one agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub position: Position,
    pub role: Role,
    pub state: AgentState,
    pub flipped: bool,
    pub stats: AgentStats,
}

impl From<&NodeAgent> for AgentSummary {
    fn from(agent: &NodeAgent) -> Self {
        Self {
            position: agent.position(),
            role: agent.role(),
            state: agent.state(),
            flipped: agent.has_flipped(),
            stats: agent.stats().clone(),
        }
    }
}

/// Record of a complete run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub line_length: usize,
    pub start_offset: f64,
    pub stop_deadline: f64,
    pub receipts: Vec<Receipt>,
    pub dispatches: Vec<DispatchRecord>,
    pub flips: Vec<FlipRecord>,
    /// Messages dropped as protocol violations
    pub rejected: u64,
    /// Sends the transport refused
    pub abandoned: Vec<Abandonment>,
    /// Tokens still travelling when the deadline hit
    pub in_flight_at_stop: usize,
    pub agents: Vec<AgentSummary>,
}

impl RunReport {
    pub fn new(line_length: usize, start_offset: f64, stop_deadline: f64) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            line_length,
            start_offset,
            stop_deadline,
            receipts: Vec::new(),
            dispatches: Vec::new(),
            flips: Vec::new(),
            rejected: 0,
            abandoned: Vec::new(),
            in_flight_at_stop: 0,
            agents: Vec::new(),
        }
    }

    /// Record what the agent at `position` did with an accepted token
    pub fn record_relay(&mut self, time: f64, position: Position, relay: &Relay) {
        self.receipts.push(Receipt {
            time,
            position,
            from: relay.from,
            value: relay.received,
        });
        if relay.flipped {
            self.flips.push(FlipRecord { time, position });
        }
        self.record_outcome(time, position, &relay.outcome);
    }

    /// Record the result of a send attempt by `from`
    pub fn record_outcome(&mut self, time: f64, from: Position, outcome: &Outcome) {
        match outcome {
            Outcome::Sent(dispatch) => self.dispatches.push(DispatchRecord {
                time,
                from,
                to: dispatch.to,
                value: dispatch.token,
                generated: dispatch.generated,
            }),
            Outcome::Abandoned { dispatch, error } => self.abandoned.push(Abandonment {
                time,
                from,
                to: dispatch.to,
                value: dispatch.token,
                reason: error.to_string(),
            }),
            Outcome::Absorbed => {}
        }
    }

    pub fn record_rejection(&mut self) {
        self.rejected += 1;
    }

    pub fn receipts_at(&self, position: Position) -> impl Iterator<Item = &Receipt> + '_ {
        self.receipts.iter().filter(move |r| r.position == position)
    }

    pub fn dispatches_from(&self, position: Position) -> impl Iterator<Item = &DispatchRecord> + '_ {
        self.dispatches.iter().filter(move |d| d.from == position)
    }

    /// Time of the latest receipt or dispatch
    pub fn last_activity(&self) -> Option<f64> {
        self.receipts
            .iter()
            .map(|r| r.time)
            .chain(self.dispatches.iter().map(|d| d.time))
            .reduce(f64::max)
    }

    pub fn to_json(&self) -> RelayResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> RelayResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {}", self.run_id)?;
        writeln!(
            f,
            "  Line: {} nodes, start {} stop {}",
            self.line_length, self.start_offset, self.stop_deadline
        )?;
        writeln!(
            f,
            "  Receipts: {}  Dispatches: {}  Rejected: {}  Abandoned: {}  In flight at stop: {}",
            self.receipts.len(),
            self.dispatches.len(),
            self.rejected,
            self.abandoned.len(),
            self.in_flight_at_stop
        )?;
        for flip in &self.flips {
            writeln!(f, "  Node {} became a generator at t={}", flip.position, flip.time)?;
        }
        for agent in &self.agents {
            writeln!(
                f,
                "  Node {}: {} ({:?}) received {} sent {} generated {}",
                agent.position,
                agent.role,
                agent.state,
                agent.stats.received,
                agent.stats.sent,
                agent.stats.generated
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Dispatch, TransportError};

    #[test]
    fn test_record_relay() {
        let mut report = RunReport::new(5, 1.0, 30.0);
        let relay = Relay {
            received: Token::new(10),
            from: Position::new(0),
            flipped: true,
            outcome: Outcome::Sent(Dispatch {
                to: Position::new(2),
                token: Token::new(10),
                generated: false,
            }),
        };
        report.record_relay(2.0, Position::new(1), &relay);

        assert_eq!(report.receipts_at(Position::new(1)).count(), 1);
        assert_eq!(report.dispatches_from(Position::new(1)).count(), 1);
        assert_eq!(report.flips, vec![FlipRecord { time: 2.0, position: Position::new(1) }]);
        assert_eq!(report.last_activity(), Some(2.0));
    }

    #[test]
    fn test_json_has_records() {
        let mut report = RunReport::new(5, 1.0, 30.0);
        report.record_outcome(
            1.0,
            Position::new(0),
            &Outcome::Sent(Dispatch {
                to: Position::new(1),
                token: Token::new(55),
                generated: true,
            }),
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["dispatches"][0]["value"], 55);
        assert_eq!(json["dispatches"][0]["to"], 1);
        assert_eq!(json["line_length"], 5);
    }

    #[test]
    fn test_record_abandonment() {
        let mut report = RunReport::new(5, 1.0, 30.0);
        report.record_outcome(
            4.0,
            Position::new(3),
            &Outcome::Abandoned {
                dispatch: Dispatch {
                    to: Position::new(4),
                    token: Token::new(8),
                    generated: false,
                },
                error: TransportError::Timeout(Position::new(4)),
            },
        );

        assert!(report.dispatches.is_empty());
        assert_eq!(report.abandoned.len(), 1);
        let abandoned = &report.abandoned[0];
        assert_eq!((abandoned.from, abandoned.to, abandoned.value), (Position::new(3), Position::new(4), Token::new(8)));
        assert!(abandoned.reason.contains("timed out"));
    }
}
