//! Relay coordinator
//!
//! Builds the line, hands every position its initial role and drives a
//! simulated run from the start offset to the stop deadline.

use super::{AgentSummary, RelayResult, RunReport};
use crate::agent::{Agent, NodeAgent, RandomTokens, Role, TokenSource};
use crate::config::{validate_schedule, ConfigError, RelayConfig};
use crate::sim::{sim_time, Event, Scheduler, SimChannel};
use crate::topology::{LinkDirectory, Position};

/// Owns the static topology and the scenario settings
#[derive(Debug, Clone)]
pub struct RelayCoordinator {
    settings: RelayConfig,
    directory: LinkDirectory,
}

impl RelayCoordinator {
    /// Line of `line_length` agents with default settings
    pub fn build(line_length: usize) -> RelayResult<Self> {
        Self::from_config(RelayConfig {
            line_length,
            ..Default::default()
        })
    }

    /// Line described by a validated relay configuration
    pub fn from_config(settings: RelayConfig) -> RelayResult<Self> {
        settings.validate()?;
        let directory = LinkDirectory::line(settings.line_length)?;
        Ok(Self {
            settings,
            directory,
        })
    }

    pub fn settings(&self) -> &RelayConfig {
        &self.settings
    }

    pub fn directory(&self) -> &LinkDirectory {
        &self.directory
    }

    /// Initial role of `position`; the later flip is the agent's own business
    pub fn role_for(&self, position: Position) -> Role {
        if position.is_origin() {
            Role::Origin
        } else if position == self.directory.last() {
            Role::EndpointGenerator
        } else {
            Role::Forwarder
        }
    }

    /// One configured agent per position, each with its own token source
    pub fn assign_roles(&self) -> RelayResult<Vec<NodeAgent>> {
        self.assign_roles_with(|position| self.token_source(position))
    }

    /// Like `assign_roles`, with caller-supplied token sources
    pub fn assign_roles_with<F>(&self, mut source_for: F) -> RelayResult<Vec<NodeAgent>>
    where
        F: FnMut(Position) -> Box<dyn TokenSource>,
    {
        self.directory
            .positions()
            .map(|position| -> RelayResult<NodeAgent> {
                let links = self.directory.links(position)?;
                let agent = NodeAgent::configure(
                    position,
                    links.left,
                    links.right,
                    self.role_for(position),
                    source_for(position),
                )?;
                Ok(agent)
            })
            .collect()
    }

    fn token_source(&self, position: Position) -> Box<dyn TokenSource> {
        let range = self.settings.random_range();
        match self.settings.seed {
            Some(seed) => Box::new(RandomTokens::seeded(
                seed.wrapping_add(position.index() as u64),
                range,
            )),
            None => Box::new(RandomTokens::from_entropy(range)),
        }
    }

    /// Run with the configured start offset and stop deadline
    pub fn run_configured(&self) -> RelayResult<RunReport> {
        self.run(self.settings.start_offset, self.settings.stop_deadline)
    }

    /// Simulate a run of freshly assigned agents
    pub fn run(&self, start_offset: f64, stop_deadline: f64) -> RelayResult<RunReport> {
        let mut agents = self.assign_roles()?;
        self.run_agents(&mut agents, start_offset, stop_deadline)
    }

    /// Simulate a run of the given agents
    pub fn run_agents(
        &self,
        agents: &mut [NodeAgent],
        start_offset: f64,
        stop_deadline: f64,
    ) -> RelayResult<RunReport> {
        let mut report = self.drive(agents, start_offset, stop_deadline)?;
        report.agents = agents.iter().map(AgentSummary::from).collect();
        tracing::info!(
            "Run {} finished: {} receipts, {} dispatches",
            report.run_id,
            report.receipts.len(),
            report.dispatches.len()
        );
        Ok(report)
    }

    /// Schedule start and stop for every agent and process events until
    /// the deadline
    pub fn drive<A: Agent>(
        &self,
        agents: &mut [A],
        start_offset: f64,
        stop_deadline: f64,
    ) -> RelayResult<RunReport> {
        validate_schedule(start_offset, stop_deadline)?;
        let invalid_schedule = || ConfigError::InvalidSchedule {
            start: start_offset,
            stop: stop_deadline,
        };
        let start = sim_time(start_offset).ok_or_else(invalid_schedule)?;
        let stop = sim_time(stop_deadline).ok_or_else(invalid_schedule)?;
        let latency = sim_time(self.settings.hop_latency)
            .filter(|latency| !latency.is_zero())
            .ok_or(ConfigError::InvalidLatency(self.settings.hop_latency))?;

        let mut scheduler = Scheduler::new();
        scheduler.stop_at(stop);
        for agent in agents.iter() {
            scheduler.schedule(start, Event::Start(agent.position()));
            scheduler.schedule(stop, Event::Stop(agent.position()));
        }

        let mut report = RunReport::new(self.directory.len(), start_offset, stop_deadline);
        tracing::info!(
            "Run {} started: {} nodes, start {} stop {}",
            report.run_id,
            self.directory.len(),
            start_offset,
            stop_deadline
        );

        let line_length = self.directory.len();
        while let Some((now, event)) = scheduler.next_event() {
            let time = now.as_secs_f64();

            match event {
                Event::Start(position) => {
                    let Some(agent) = agents.iter_mut().find(|a| a.position() == position) else {
                        continue;
                    };
                    let mut channel = SimChannel::new(&mut scheduler, latency, line_length);
                    if let Some(outcome) = agent.start(&mut channel)? {
                        report.record_outcome(time, position, &outcome);
                    }
                }
                Event::Deliver { from, to, payload } => {
                    let Some(agent) = agents.iter_mut().find(|a| a.position() == to) else {
                        tracing::warn!("Dropped token from {} for missing node {}", from, to);
                        report.record_rejection();
                        continue;
                    };
                    let mut channel = SimChannel::new(&mut scheduler, latency, line_length);
                    match agent.receive(&payload, from, &mut channel) {
                        Ok(relay) => report.record_relay(time, to, &relay),
                        Err(e) if e.is_protocol_violation() => {
                            tracing::warn!("Node {} dropped a message from {}: {}", to, from, e);
                            report.record_rejection();
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Event::Stop(position) => {
                    if let Some(agent) = agents.iter_mut().find(|a| a.position() == position) {
                        agent.stop();
                    }
                }
            }
        }

        report.in_flight_at_stop = scheduler.abandoned();
        if report.in_flight_at_stop > 0 {
            tracing::debug!(
                "{} tokens in flight abandoned at t={}",
                report.in_flight_at_stop,
                stop_deadline
            );
        }
        Ok(report)
    }
}
