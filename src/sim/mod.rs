//! Simulation module - Discrete-event substrate for running agents
//!
//! Provides:
//! - A virtual clock and ordered event queue
//! - An in-memory channel that delivers tokens after a fixed latency

mod channel;
mod scheduler;

pub use channel::*;
pub use scheduler::*;

use std::time::Duration;

/// Point on the virtual timeline; one second equals one time unit
pub type SimTime = Duration;

/// Convert a time value in time units to a `SimTime`
pub fn sim_time(units: f64) -> Option<SimTime> {
    Duration::try_from_secs_f64(units).ok()
}
