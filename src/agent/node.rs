//! Node agent
//!
//! Applies the relay rule at one position of the line:
//! - the origin draws the first token on start and then stays quiet
//! - forwarders pass tokens through to the opposite neighbor
//! - endpoint generators answer every token with a fresh draw
//! - the forwarder next to the origin becomes an endpoint generator after
//!   it hands the origin's token on

use serde::Serialize;
use thiserror::Error;

use super::{Agent, AgentState, Role, TokenSource, Transport, TransportError};
use crate::protocol::{CodecError, Token};
use crate::topology::{DirectoryError, Links, Position, Side};

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Node {at} received a token from {from}, which is not one of its neighbors")]
    UnknownSender { at: Position, from: Position },

    #[error("Malformed message: {0}")]
    Malformed(#[from] CodecError),

    #[error("Node {0} is not running")]
    NotRunning(Position),

    #[error("Node {0} has no live neighbor to send to")]
    NoLiveNeighbor(Position),

    #[error("Node {at} already holds a pending link to {pending}")]
    LinkBusy { at: Position, pending: Position },

    #[error("Role {role} is not allowed at position {position}")]
    RoleNotAllowed { position: Position, role: Role },

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
}

impl AgentError {
    /// Errors caused by what arrived, as opposed to how the agent was set up
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            AgentError::UnknownSender { .. } | AgentError::Malformed(_) | AgentError::NotRunning(_)
        )
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

/// A token handed to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dispatch {
    pub to: Position,
    pub token: Token,
    /// True when the token was freshly drawn rather than passed through
    pub generated: bool,
}

/// What became of a send attempt
#[derive(Debug)]
pub enum Outcome {
    Sent(Dispatch),
    /// The transport refused the token; it is dropped without retry
    Abandoned { dispatch: Dispatch, error: TransportError },
    /// The origin got a token back and ignores it
    Absorbed,
}

impl Outcome {
    pub fn dispatch(&self) -> Option<Dispatch> {
        match self {
            Outcome::Sent(dispatch) => Some(*dispatch),
            Outcome::Abandoned { .. } | Outcome::Absorbed => None,
        }
    }
}

/// Result of handling one accepted receipt
#[derive(Debug)]
pub struct Relay {
    pub received: Token,
    pub from: Position,
    /// Set on the single receipt that flipped this agent's role
    pub flipped: bool,
    pub outcome: Outcome,
}

/// Outbound link held between deciding on a send and completing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingLink {
    pub to: Position,
}

/// Per-agent counters
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStats {
    pub received: u64,
    pub sent: u64,
    pub generated: u64,
    pub rejected: u64,
    pub abandoned: u64,
}

/// State machine for one position in the line
pub struct NodeAgent {
    position: Position,
    links: Links,
    role: Role,
    state: AgentState,
    /// Forwarder whose left neighbor is the origin
    flip_capable: bool,
    flipped: bool,
    /// Side an origin or endpoint generator always sends to
    live_side: Option<Side>,
    pending: Option<PendingLink>,
    source: Box<dyn TokenSource>,
    stats: AgentStats,
}

impl std::fmt::Debug for NodeAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeAgent")
            .field("position", &self.position)
            .field("links", &self.links)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("flipped", &self.flipped)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl NodeAgent {
    /// Set identity, neighbors and initial role
    pub fn configure(
        position: Position,
        left: Option<Position>,
        right: Option<Position>,
        role: Role,
        source: Box<dyn TokenSource>,
    ) -> AgentResult<Self> {
        let links = Links::new(left, right);
        check_adjacent(position, Side::Left, left, position.index().checked_sub(1))?;
        check_adjacent(position, Side::Right, right, Some(position.index() + 1))?;

        // Only the origin has nothing on its left
        if position.is_origin() != left.is_none() {
            return Err(DirectoryError::InconsistentNeighbor {
                position,
                side: Side::Left,
                expected: position.index().checked_sub(1).map(Position::new),
                found: left,
            }
            .into());
        }

        let live_side = match role {
            Role::Origin if position.is_origin() => links.sole_side(),
            Role::Origin => None,
            Role::EndpointGenerator => links.sole_side(),
            Role::Forwarder if left.is_some() && right.is_some() => None,
            Role::Forwarder => return Err(AgentError::RoleNotAllowed { position, role }),
        };
        if role != Role::Forwarder && live_side.is_none() {
            return Err(AgentError::RoleNotAllowed { position, role });
        }

        Ok(Self {
            position,
            links,
            role,
            state: AgentState::Idle,
            flip_capable: role == Role::Forwarder && left.is_some_and(|p| p.is_origin()),
            flipped: false,
            live_side,
            pending: None,
            source,
            stats: AgentStats::default(),
        })
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn links(&self) -> Links {
        self.links
    }

    pub fn has_flipped(&self) -> bool {
        self.flipped
    }

    pub fn has_pending_link(&self) -> bool {
        self.pending.is_some()
    }

    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    /// Neighbor an origin or endpoint generator sends to
    pub fn live_neighbor(&self) -> Option<Position> {
        self.live_side.and_then(|side| self.links.get(side))
    }

    /// Start signal. The origin emits exactly one token; everyone else waits.
    pub fn on_start(&mut self, transport: &mut dyn Transport) -> AgentResult<Option<Outcome>> {
        if self.state != AgentState::Idle {
            tracing::warn!("Node {} ignored start in state {:?}", self.position, self.state);
            return Ok(None);
        }

        self.state = match self.role {
            Role::Origin | Role::EndpointGenerator => AgentState::Generating,
            Role::Forwarder if self.flip_capable => AgentState::AwaitingRoleDecision,
            Role::Forwarder => AgentState::Forwarding,
        };
        tracing::debug!("Node {} started as {}", self.position, self.role);

        if self.role != Role::Origin {
            return Ok(None);
        }

        let to = self.require_live_neighbor()?;
        let token = self.source.draw();
        self.stats.generated += 1;
        tracing::info!("Node {} generated {} for node {}", self.position, token, to);
        self.transmit(to, token, true, transport).map(Some)
    }

    /// Decode an encoded token, then apply the relay rule
    pub fn on_payload(
        &mut self,
        payload: &[u8],
        from: Position,
        transport: &mut dyn Transport,
    ) -> AgentResult<Relay> {
        let token = match Token::decode(payload) {
            Ok(token) => token,
            Err(e) => {
                self.stats.rejected += 1;
                return Err(e.into());
            }
        };
        self.on_receive(token, from, transport)
    }

    /// Apply the relay rule to a token received from `from`
    pub fn on_receive(
        &mut self,
        token: Token,
        from: Position,
        transport: &mut dyn Transport,
    ) -> AgentResult<Relay> {
        if !self.state.is_running() {
            self.stats.rejected += 1;
            return Err(AgentError::NotRunning(self.position));
        }
        let Some(arrival) = self.links.side_of(from) else {
            self.stats.rejected += 1;
            return Err(AgentError::UnknownSender {
                at: self.position,
                from,
            });
        };

        self.stats.received += 1;
        tracing::info!("Node {} received {} from {}", self.position, token, from);

        if self.flip_capable && !self.flipped && from.is_origin() {
            self.flip(arrival.opposite());
            let to = self.require_live_neighbor()?;
            let outcome = self.transmit(to, token, false, transport)?;
            return Ok(Relay {
                received: token,
                from,
                flipped: true,
                outcome,
            });
        }

        let outcome = match self.role {
            Role::EndpointGenerator => {
                let to = self.require_live_neighbor()?;
                let fresh = self.source.draw();
                self.stats.generated += 1;
                tracing::debug!(
                    "Node {} replaced {} with {} drawn from {}",
                    self.position,
                    token,
                    fresh,
                    self.source.range()
                );
                self.transmit(to, fresh, true, transport)?
            }
            Role::Forwarder => {
                if self.state == AgentState::AwaitingRoleDecision {
                    self.state = AgentState::Forwarding;
                }
                let to = self
                    .links
                    .get(arrival.opposite())
                    .ok_or(AgentError::NoLiveNeighbor(self.position))?;
                self.transmit(to, token, false, transport)?
            }
            Role::Origin => {
                tracing::debug!("Node {} is the origin and absorbs {}", self.position, token);
                Outcome::Absorbed
            }
        };

        Ok(Relay {
            received: token,
            from,
            flipped: false,
            outcome,
        })
    }

    /// Stop signal. Releases any pending link.
    pub fn on_stop(&mut self) {
        if self.state != AgentState::Stopped {
            tracing::debug!("Node {} stopped", self.position);
        }
        self.state = AgentState::Stopped;

        if let Some(link) = self.pending.take() {
            tracing::debug!("Node {} released pending link to {}", self.position, link.to);
        }
    }

    fn flip(&mut self, toward: Side) {
        self.role = Role::EndpointGenerator;
        self.state = AgentState::Generating;
        self.live_side = Some(toward);
        self.flipped = true;
        tracing::info!(
            "Node {} now generates tokens for its {} neighbor",
            self.position,
            toward
        );
    }

    fn require_live_neighbor(&self) -> AgentResult<Position> {
        self.live_neighbor()
            .ok_or(AgentError::NoLiveNeighbor(self.position))
    }

    fn open_link(&mut self, to: Position) -> AgentResult<()> {
        if let Some(link) = self.pending {
            return Err(AgentError::LinkBusy {
                at: self.position,
                pending: link.to,
            });
        }
        self.pending = Some(PendingLink { to });
        Ok(())
    }

    /// One fresh link per token: open, send, close
    fn transmit(
        &mut self,
        to: Position,
        token: Token,
        generated: bool,
        transport: &mut dyn Transport,
    ) -> AgentResult<Outcome> {
        self.open_link(to)?;
        let result = transport.send(self.position, to, token);
        self.pending = None;

        let dispatch = Dispatch {
            to,
            token,
            generated,
        };
        match result {
            Ok(()) => {
                self.stats.sent += 1;
                tracing::debug!("Node {} sent {} to {}", self.position, token, to);
                Ok(Outcome::Sent(dispatch))
            }
            Err(error) => Ok(self.record_abandoned(dispatch, error)),
        }
    }

    /// A send the transport accepted failed afterwards, as when a queued
    /// token cannot be dialed; the earlier `Sent` no longer holds
    pub fn abandon(&mut self, dispatch: Dispatch, error: TransportError) -> Outcome {
        self.stats.sent = self.stats.sent.saturating_sub(1);
        self.record_abandoned(dispatch, error)
    }

    fn record_abandoned(&mut self, dispatch: Dispatch, error: TransportError) -> Outcome {
        self.stats.abandoned += 1;
        tracing::error!(
            "Node {} could not send {} to {}: {}",
            self.position,
            dispatch.token,
            dispatch.to,
            error
        );
        Outcome::Abandoned { dispatch, error }
    }
}

fn check_adjacent(
    position: Position,
    side: Side,
    found: Option<Position>,
    expected: Option<usize>,
) -> AgentResult<()> {
    match found {
        Some(neighbor) if Some(neighbor.index()) != expected => {
            Err(DirectoryError::InconsistentNeighbor {
                position,
                side,
                expected: expected.map(Position::new),
                found,
            }
            .into())
        }
        _ => Ok(()),
    }
}

impl Agent for NodeAgent {
    fn position(&self) -> Position {
        self.position
    }

    fn start(&mut self, transport: &mut dyn Transport) -> AgentResult<Option<Outcome>> {
        self.on_start(transport)
    }

    fn receive(
        &mut self,
        payload: &[u8],
        from: Position,
        transport: &mut dyn Transport,
    ) -> AgentResult<Relay> {
        self.on_payload(payload, from, transport)
    }

    fn stop(&mut self) {
        self.on_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{RandomTokens, ScriptedTokens, TransportResult};
    use crate::protocol::TokenRange;

    /// Records every send; optionally fails them all
    #[derive(Default)]
    struct RecordingTransport {
        sent: Vec<(Position, Position, Token)>,
        fail: bool,
    }

    impl Transport for RecordingTransport {
        fn send(&mut self, from: Position, to: Position, token: Token) -> TransportResult<()> {
            if self.fail {
                return Err(TransportError::UnknownDestination(to));
            }
            self.sent.push((from, to, token));
            Ok(())
        }
    }

    fn p(index: usize) -> Position {
        Position::new(index)
    }

    /// Agent at `index` in a line of five
    fn agent(index: usize, role: Role, source: Box<dyn TokenSource>) -> NodeAgent {
        let left = index.checked_sub(1).map(p);
        let right = (index < 4).then(|| p(index + 1));
        NodeAgent::configure(p(index), left, right, role, source).unwrap()
    }

    fn scripted(values: impl IntoIterator<Item = i32>) -> Box<dyn TokenSource> {
        Box::new(ScriptedTokens::new(values))
    }

    fn started(index: usize, role: Role, source: Box<dyn TokenSource>) -> NodeAgent {
        let mut node = agent(index, role, source);
        node.on_start(&mut RecordingTransport::default()).unwrap();
        node
    }

    #[test]
    fn test_origin_sends_exactly_once_on_start() {
        let mut transport = RecordingTransport::default();
        let mut origin = agent(0, Role::Origin, scripted([17]));

        let outcome = origin.on_start(&mut transport).unwrap().unwrap();
        assert_eq!(
            outcome.dispatch(),
            Some(Dispatch { to: p(1), token: Token::new(17), generated: true })
        );
        assert_eq!(transport.sent, vec![(p(0), p(1), Token::new(17))]);
        assert_eq!(origin.state(), AgentState::Generating);

        // A second start does nothing
        assert!(origin.on_start(&mut transport).unwrap().is_none());
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn test_non_origin_start_sends_nothing() {
        let mut transport = RecordingTransport::default();
        for (index, role, state) in [
            (1, Role::Forwarder, AgentState::AwaitingRoleDecision),
            (2, Role::Forwarder, AgentState::Forwarding),
            (3, Role::Forwarder, AgentState::Forwarding),
            (4, Role::EndpointGenerator, AgentState::Generating),
        ] {
            let mut node = agent(index, role, scripted([1]));
            assert!(node.on_start(&mut transport).unwrap().is_none());
            assert_eq!(node.state(), state);
        }
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_origin_hop_flips_node_one() {
        let mut transport = RecordingTransport::default();
        let mut node = started(1, Role::Forwarder, scripted([99]));
        assert_eq!(node.role(), Role::Forwarder);

        let relay = node.on_receive(Token::new(40), p(0), &mut transport).unwrap();
        assert!(relay.flipped);
        assert_eq!(relay.received, Token::new(40));
        // The origin's token goes on unchanged
        assert_eq!(transport.sent, vec![(p(1), p(2), Token::new(40))]);
        assert_eq!(node.role(), Role::EndpointGenerator);
        assert_eq!(node.state(), AgentState::Generating);
        assert_eq!(node.live_neighbor(), Some(p(2)));
        assert!(node.has_flipped());
    }

    #[test]
    fn test_role_flip_bounce() {
        let mut transport = RecordingTransport::default();
        let mut node = started(1, Role::Forwarder, scripted([61, 62]));
        node.on_receive(Token::new(40), p(0), &mut transport).unwrap();

        let relay = node.on_receive(Token::new(55), p(2), &mut transport).unwrap();
        assert!(!relay.flipped);
        assert_eq!(
            relay.outcome.dispatch(),
            Some(Dispatch { to: p(2), token: Token::new(61), generated: true })
        );

        node.on_receive(Token::new(12), p(2), &mut transport).unwrap();
        assert_eq!(transport.sent.last(), Some(&(p(1), p(2), Token::new(62))));

        // Never addresses the origin again
        assert!(transport.sent.iter().all(|(_, to, _)| *to != p(0)));
        assert_eq!(node.role(), Role::EndpointGenerator);
    }

    #[test]
    fn test_flip_happens_once() {
        let mut transport = RecordingTransport::default();
        let mut node = started(1, Role::Forwarder, scripted([5, 6, 7]));

        let first = node.on_receive(Token::new(1), p(0), &mut transport).unwrap();
        let second = node.on_receive(Token::new(2), p(0), &mut transport).unwrap();
        assert!(first.flipped);
        assert!(!second.flipped);
        // After the flip even an origin token is regenerated
        assert_eq!(transport.sent[1], (p(1), p(2), Token::new(5)));
    }

    #[test]
    fn test_node_one_forwards_before_hearing_from_origin() {
        let mut transport = RecordingTransport::default();
        let mut node = started(1, Role::Forwarder, scripted([5]));

        node.on_receive(Token::new(8), p(2), &mut transport).unwrap();
        assert_eq!(transport.sent, vec![(p(1), p(0), Token::new(8))]);
        assert_eq!(node.state(), AgentState::Forwarding);
        assert_eq!(node.role(), Role::Forwarder);

        // Still flips on its first token from the origin
        let relay = node.on_receive(Token::new(9), p(0), &mut transport).unwrap();
        assert!(relay.flipped);
    }

    #[test]
    fn test_mid_chain_forward_goes_opposite() {
        for index in [2, 3] {
            let mut transport = RecordingTransport::default();
            let mut node = started(index, Role::Forwarder, scripted([0]));

            node.on_receive(Token::new(33), p(index - 1), &mut transport).unwrap();
            node.on_receive(Token::new(44), p(index + 1), &mut transport).unwrap();
            assert_eq!(
                transport.sent,
                vec![
                    (p(index), p(index + 1), Token::new(33)),
                    (p(index), p(index - 1), Token::new(44)),
                ]
            );
            assert_eq!(node.role(), Role::Forwarder);
            assert_eq!(node.stats().generated, 0);
        }
    }

    #[test]
    fn test_endpoint_bounce_regenerates() {
        let mut transport = RecordingTransport::default();
        let mut node = started(4, Role::EndpointGenerator, scripted([71]));

        let relay = node.on_receive(Token::new(30), p(3), &mut transport).unwrap();
        assert_eq!(relay.received, Token::new(30));
        assert_eq!(transport.sent, vec![(p(4), p(3), Token::new(71))]);
    }

    #[test]
    fn test_endpoint_regeneration_stays_in_range() {
        let range = TokenRange::default();
        let mut transport = RecordingTransport::default();
        let mut node = started(4, Role::EndpointGenerator, Box::new(RandomTokens::seeded(3, range)));

        for value in 0..50 {
            node.on_receive(Token::new(value), p(3), &mut transport).unwrap();
        }
        assert_eq!(transport.sent.len(), 50);
        assert!(transport.sent.iter().all(|(_, to, token)| *to == p(3) && range.contains(*token)));
    }

    #[test]
    fn test_unknown_sender_is_rejected() {
        let mut transport = RecordingTransport::default();
        let mut node = started(2, Role::Forwarder, scripted([0]));

        let err = node.on_receive(Token::new(1), p(4), &mut transport).unwrap_err();
        assert!(matches!(err, AgentError::UnknownSender { at, from } if at == p(2) && from == p(4)));
        assert!(err.is_protocol_violation());
        assert!(transport.sent.is_empty());

        // Still live afterwards
        node.on_receive(Token::new(2), p(1), &mut transport).unwrap();
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(node.stats().rejected, 1);
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        let mut transport = RecordingTransport::default();
        let mut node = started(3, Role::Forwarder, scripted([0]));

        let err = node.on_payload(&[0, 1, 2], p(2), &mut transport).unwrap_err();
        assert!(matches!(err, AgentError::Malformed(CodecError::PayloadSize(3))));
        assert!(err.is_protocol_violation());

        node.on_payload(&Token::new(9).to_bytes(), p(2), &mut transport).unwrap();
        assert_eq!(transport.sent, vec![(p(3), p(4), Token::new(9))]);
    }

    #[test]
    fn test_receive_before_start_or_after_stop() {
        let mut transport = RecordingTransport::default();
        let mut node = agent(2, Role::Forwarder, scripted([0]));
        assert!(matches!(
            node.on_receive(Token::new(1), p(1), &mut transport),
            Err(AgentError::NotRunning(_))
        ));

        node.on_start(&mut transport).unwrap();
        node.on_stop();
        node.on_stop();
        assert_eq!(node.state(), AgentState::Stopped);
        assert!(matches!(
            node.on_receive(Token::new(1), p(1), &mut transport),
            Err(AgentError::NotRunning(_))
        ));
        assert!(node.on_start(&mut transport).unwrap().is_none());
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_transport_failure_abandons_and_stays_live() {
        let mut transport = RecordingTransport { fail: true, ..Default::default() };
        let mut node = started(2, Role::Forwarder, scripted([0]));

        let relay = node.on_receive(Token::new(5), p(1), &mut transport).unwrap();
        assert!(matches!(relay.outcome, Outcome::Abandoned { .. }));
        assert!(!node.has_pending_link());
        assert_eq!(node.stats().abandoned, 1);

        transport.fail = false;
        node.on_receive(Token::new(6), p(3), &mut transport).unwrap();
        assert_eq!(transport.sent, vec![(p(2), p(1), Token::new(6))]);
    }

    #[test]
    fn test_late_failure_moves_send_to_abandoned() {
        let mut transport = RecordingTransport::default();
        let mut node = started(2, Role::Forwarder, scripted([0]));

        let relay = node.on_receive(Token::new(5), p(1), &mut transport).unwrap();
        let dispatch = relay.outcome.dispatch().unwrap();
        assert_eq!(node.stats().sent, 1);

        let outcome = node.abandon(dispatch, TransportError::Timeout(p(3)));
        assert!(matches!(outcome, Outcome::Abandoned { dispatch: d, .. } if d.to == p(3)));
        assert_eq!(node.stats().sent, 0);
        assert_eq!(node.stats().abandoned, 1);
        assert!(node.state().is_running());
    }

    #[test]
    fn test_single_send_per_receipt() {
        let mut transport = RecordingTransport::default();
        let mut nodes: Vec<NodeAgent> = [
            (1, Role::Forwarder),
            (2, Role::Forwarder),
            (3, Role::Forwarder),
            (4, Role::EndpointGenerator),
        ]
        .into_iter()
        .map(|(index, role)| started(index, role, scripted([1, 2, 3])))
        .collect();

        for node in nodes.iter_mut() {
            let from = node.links().left.unwrap();
            let before = transport.sent.len();
            node.on_receive(Token::new(10), from, &mut transport).unwrap();
            assert_eq!(transport.sent.len(), before + 1);
            assert!(!node.has_pending_link());
        }
    }

    #[test]
    fn test_configure_rejects_bad_setups() {
        let cases: Vec<(usize, Option<usize>, Option<usize>, Role)> = vec![
            // Interior position missing a neighbor
            (2, Some(1), None, Role::Forwarder),
            // Non-adjacent neighbor
            (2, Some(0), Some(3), Role::Forwarder),
            // Origin role away from position 0
            (2, Some(1), Some(3), Role::Origin),
            // Generator with two live sides
            (2, Some(1), Some(3), Role::EndpointGenerator),
            // Position 0 claiming a left neighbor
            (0, Some(1), Some(1), Role::Origin),
            // No neighbors at all
            (0, None, None, Role::Origin),
        ];

        for (index, left, right, role) in cases {
            let result = NodeAgent::configure(
                p(index),
                left.map(p),
                right.map(p),
                role,
                scripted([0]),
            );
            assert!(result.is_err(), "expected {index} {left:?} {right:?} {role} to fail");
        }
    }

    #[test]
    fn test_line_of_two_origin_absorbs() {
        let mut transport = RecordingTransport::default();
        let mut origin = NodeAgent::configure(p(0), None, Some(p(1)), Role::Origin, scripted([4])).unwrap();
        let mut last = NodeAgent::configure(p(1), Some(p(0)), None, Role::EndpointGenerator, scripted([8])).unwrap();
        origin.on_start(&mut transport).unwrap();
        last.on_start(&mut transport).unwrap();

        let relay = last.on_receive(Token::new(4), p(0), &mut transport).unwrap();
        assert!(!relay.flipped);
        assert_eq!(transport.sent.last(), Some(&(p(1), p(0), Token::new(8))));

        let relay = origin.on_receive(Token::new(8), p(1), &mut transport).unwrap();
        assert!(matches!(relay.outcome, Outcome::Absorbed));
        assert_eq!(transport.sent.len(), 2);
    }
}
