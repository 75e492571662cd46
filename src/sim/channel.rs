//! In-memory channel
//!
//! Reliable and ordered: every token sent is delivered to the destination
//! exactly `latency` later, encoded in its wire form.

use bytes::BytesMut;

use super::{Event, Scheduler, SimTime};
use crate::agent::{Transport, TransportError, TransportResult};
use crate::protocol::{Token, TOKEN_WIRE_SIZE};
use crate::topology::Position;

/// Transport backed by the scheduler
pub struct SimChannel<'a> {
    scheduler: &'a mut Scheduler,
    latency: SimTime,
    line_length: usize,
}

impl<'a> SimChannel<'a> {
    pub fn new(scheduler: &'a mut Scheduler, latency: SimTime, line_length: usize) -> Self {
        Self {
            scheduler,
            latency,
            line_length,
        }
    }
}

impl Transport for SimChannel<'_> {
    fn send(&mut self, from: Position, to: Position, token: Token) -> TransportResult<()> {
        if to.index() >= self.line_length {
            return Err(TransportError::UnknownDestination(to));
        }

        let mut payload = BytesMut::with_capacity(TOKEN_WIRE_SIZE);
        token.encode(&mut payload);
        self.scheduler.schedule_in(
            self.latency,
            Event::Deliver {
                from,
                to,
                payload: payload.freeze(),
            },
        );
        Ok(())
    }
}
