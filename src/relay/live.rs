//! Live loopback runtime
//!
//! Runs the same agents over real TCP connections. Each agent is owned by
//! one task that serves one connection at a time, so its callbacks never
//! overlap. Wall time is mapped onto time units by `time_unit`.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{
    Abandonment, AgentSummary, DispatchRecord, FlipRecord, Receipt, RelayCoordinator, RelayResult,
    RunReport,
};
use crate::agent::{
    AgentResult, Dispatch, NodeAgent, Outcome, Transport, TransportError, TransportResult,
};
use crate::config::validate_schedule;
use crate::network::{Inbound, LinkDialer, NetworkConfig, NodeListener, TcpDialer};
use crate::protocol::{Frame, Token};
use crate::topology::Position;

/// Holds the single token an agent decided to send until it is dialed
#[derive(Debug, Default)]
struct Outbox {
    queued: Option<(Position, Token)>,
}

impl Outbox {
    fn take(&mut self) -> Option<(Position, Token)> {
        self.queued.take()
    }
}

impl Transport for Outbox {
    fn send(&mut self, _from: Position, to: Position, token: Token) -> TransportResult<()> {
        if self.queued.is_some() {
            return Err(TransportError::Busy(to));
        }
        self.queued = Some((to, token));
        Ok(())
    }
}

/// Maps wall time onto time units since the run began
#[derive(Debug, Clone, Copy)]
struct LiveClock {
    epoch: Instant,
    unit: Duration,
}

impl LiveClock {
    fn at(&self, units: f64) -> Instant {
        self.epoch + self.unit.mul_f64(units)
    }

    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() / self.unit.as_secs_f64()
    }
}

/// What agent tasks report back to the coordinator
#[derive(Debug)]
enum LiveEvent {
    Received(Receipt),
    Flipped(FlipRecord),
    Dispatched(DispatchRecord),
    Abandoned(Abandonment),
    Rejected { time: f64 },
}

impl LiveEvent {
    fn time(&self) -> f64 {
        match self {
            LiveEvent::Received(r) => r.time,
            LiveEvent::Flipped(f) => f.time,
            LiveEvent::Dispatched(d) => d.time,
            LiveEvent::Abandoned(a) => a.time,
            LiveEvent::Rejected { time } => *time,
        }
    }

    fn apply(self, report: &mut RunReport) {
        match self {
            LiveEvent::Received(receipt) => report.receipts.push(receipt),
            LiveEvent::Flipped(flip) => report.flips.push(flip),
            LiveEvent::Dispatched(dispatch) => report.dispatches.push(dispatch),
            LiveEvent::Abandoned(abandonment) => report.abandoned.push(abandonment),
            LiveEvent::Rejected { .. } => report.record_rejection(),
        }
    }
}

/// Per-task plumbing shared by every step of an agent's loop
struct AgentContext {
    dialer: Arc<dyn LinkDialer>,
    events: mpsc::Sender<LiveEvent>,
    stop_rx: watch::Receiver<bool>,
    clock: LiveClock,
}

impl RelayCoordinator {
    /// Run over loopback TCP on the configured ports
    pub async fn run_live(
        &self,
        network: &NetworkConfig,
        time_unit: Duration,
    ) -> RelayResult<RunReport> {
        let mut listeners = Vec::with_capacity(self.directory().len());
        for position in self.directory().positions() {
            listeners.push(NodeListener::bind(network, position).await?);
        }
        let dialer = TcpDialer::from_config(network, self.directory().len())?;
        let agents = self.assign_roles()?;

        self.run_live_with(agents, listeners, Arc::new(dialer), time_unit)
            .await
    }

    /// Run the given agents on already bound listeners
    pub async fn run_live_with(
        &self,
        agents: Vec<NodeAgent>,
        listeners: Vec<NodeListener>,
        dialer: Arc<dyn LinkDialer>,
        time_unit: Duration,
    ) -> RelayResult<RunReport> {
        let start_offset = self.settings().start_offset;
        let stop_deadline = self.settings().stop_deadline;
        validate_schedule(start_offset, stop_deadline)?;

        let clock = LiveClock {
            epoch: Instant::now(),
            unit: time_unit,
        };
        let (stop_tx, stop_rx) = watch::channel(false);
        let (event_tx, mut event_rx) = mpsc::channel::<LiveEvent>(256);
        let mut report = RunReport::new(self.directory().len(), start_offset, stop_deadline);

        tracing::info!(
            "Live run {} started: {} nodes, start {} stop {}, 1 unit = {:?}",
            report.run_id,
            agents.len(),
            start_offset,
            stop_deadline,
            time_unit
        );

        tokio::time::sleep_until(clock.at(start_offset)).await;

        let handles: Vec<JoinHandle<NodeAgent>> = agents
            .into_iter()
            .zip(listeners)
            .map(|(agent, listener)| {
                let ctx = AgentContext {
                    dialer: dialer.clone(),
                    events: event_tx.clone(),
                    stop_rx: stop_rx.clone(),
                    clock,
                };
                tokio::spawn(serve_agent(agent, listener, ctx))
            })
            .collect();
        drop(event_tx);

        let deadline = tokio::time::sleep_until(clock.at(stop_deadline));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                Some(event) = event_rx.recv() => event.apply(&mut report),
            }
        }

        let _ = stop_tx.send(true);
        let (agents, late) = join_draining(handles, &mut event_rx).await?;

        // Only what happened before the deadline counts
        for event in late {
            if event.time() <= stop_deadline {
                event.apply(&mut report);
            }
        }

        report.agents = agents.iter().map(AgentSummary::from).collect();
        tracing::info!(
            "Live run {} finished: {} receipts, {} dispatches",
            report.run_id,
            report.receipts.len(),
            report.dispatches.len()
        );
        Ok(report)
    }
}

/// Join every task while still draining events; a task may be parked on
/// a full channel and only finishes once it can send
async fn join_draining<T>(
    handles: Vec<JoinHandle<T>>,
    events: &mut mpsc::Receiver<LiveEvent>,
) -> RelayResult<(Vec<T>, Vec<LiveEvent>)> {
    let mut late = Vec::new();
    let mut joined = Vec::with_capacity(handles.len());
    for mut handle in handles {
        let value = loop {
            tokio::select! {
                result = &mut handle => break result?,
                Some(event) = events.recv() => late.push(event),
            }
        };
        joined.push(value);
    }
    while let Ok(event) = events.try_recv() {
        late.push(event);
    }
    Ok((joined, late))
}

/// Own one agent until the stop signal
async fn serve_agent(mut agent: NodeAgent, listener: NodeListener, mut ctx: AgentContext) -> NodeAgent {
    let position = agent.position();
    let mut outbox = Outbox::default();

    match agent.on_start(&mut outbox) {
        Ok(Some(outcome)) => {
            if !flush(&mut agent, &outcome, &mut outbox, &mut ctx).await {
                agent.on_stop();
                return agent;
            }
        }
        Ok(None) => {}
        Err(e) => tracing::error!("Node {} failed to start: {}", position, e),
    }

    loop {
        tokio::select! {
            biased;
            _ = ctx.stop_rx.changed() => break,
            accepted = listener.accept_frame() => {
                let inbound = match accepted {
                    Ok(inbound) => inbound,
                    Err(e) => {
                        tracing::warn!("Node {} dropped a connection: {}", position, e);
                        let _ = ctx.events.send(LiveEvent::Rejected { time: ctx.clock.now() }).await;
                        continue;
                    }
                };
                if !handle_inbound(&mut agent, inbound, &mut outbox, &mut ctx).await {
                    break;
                }
            }
        }
    }

    agent.on_stop();
    agent
}

/// Apply the relay rule to one inbound frame; false once the stop signal won
async fn handle_inbound(
    agent: &mut NodeAgent,
    inbound: Inbound,
    outbox: &mut Outbox,
    ctx: &mut AgentContext,
) -> bool {
    let position = agent.position();
    let time = ctx.clock.now();
    let sender = inbound.frame.sender;
    let result: AgentResult<_> = agent.on_payload(&inbound.frame.payload, sender, outbox);

    match result {
        Ok(relay) => {
            let _ = ctx
                .events
                .send(LiveEvent::Received(Receipt {
                    time,
                    position,
                    from: relay.from,
                    value: relay.received,
                }))
                .await;
            if relay.flipped {
                let _ = ctx.events.send(LiveEvent::Flipped(FlipRecord { time, position })).await;
            }
            flush(agent, &relay.outcome, outbox, ctx).await
        }
        Err(e) => {
            if e.is_protocol_violation() {
                tracing::warn!("Node {} dropped a message from {} ({}): {}", position, sender, inbound.peer, e);
            } else {
                tracing::error!("Node {} failed on a message from {}: {}", position, sender, e);
            }
            outbox.take();
            let _ = ctx.events.send(LiveEvent::Rejected { time }).await;
            true
        }
    }
}

/// Dial the token the agent queued; false once the stop signal won.
/// A failed dial turns the agent's `Sent` into `Abandoned`.
async fn flush(agent: &mut NodeAgent, outcome: &Outcome, outbox: &mut Outbox, ctx: &mut AgentContext) -> bool {
    let Some((to, token)) = outbox.take() else {
        return true;
    };
    let position = agent.position();
    let dispatch = Dispatch {
        to,
        token,
        generated: outcome.dispatch().is_some_and(|d| d.generated),
    };
    let frame = Frame::token(position, token);

    tokio::select! {
        biased;
        _ = ctx.stop_rx.changed() => {
            tracing::debug!("Node {} abandoned {} for {} at the deadline", position, token, to);
            false
        }
        delivered = ctx.dialer.deliver(to, &frame) => {
            let time = ctx.clock.now();
            let event = match delivered {
                Ok(()) => LiveEvent::Dispatched(DispatchRecord {
                    time,
                    from: position,
                    to,
                    value: token,
                    generated: dispatch.generated,
                }),
                Err(e) => {
                    let error = TransportError::from(e);
                    let abandonment = Abandonment {
                        time,
                        from: position,
                        to,
                        value: token,
                        reason: error.to_string(),
                    };
                    agent.abandon(dispatch, error);
                    LiveEvent::Abandoned(abandonment)
                }
            };
            let _ = ctx.events.send(event).await;
            true
        }
    }
}
