//! Event scheduler
//!
//! Events run one at a time in time order. At equal times, stops run
//! before starts and starts before deliveries; ties beyond that keep
//! insertion order.

use bytes::Bytes;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use super::SimTime;
use crate::topology::Position;

/// Something that happens to an agent at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(Position),
    Deliver {
        from: Position,
        to: Position,
        payload: Bytes,
    },
    Stop(Position),
}

impl Event {
    fn rank(&self) -> u8 {
        match self {
            Event::Stop(_) => 0,
            Event::Start(_) => 1,
            Event::Deliver { .. } => 2,
        }
    }
}

#[derive(Debug)]
struct Scheduled {
    at: SimTime,
    rank: u8,
    seq: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.rank, self.seq).cmp(&(other.at, other.rank, other.seq))
    }
}

/// Virtual clock plus pending events
#[derive(Debug, Default)]
pub struct Scheduler {
    now: SimTime,
    queue: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
    stop_at: Option<SimTime>,
    executed: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of events handed out so far
    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Schedule an event at an absolute time; times in the past run now
    pub fn schedule(&mut self, at: SimTime, event: Event) {
        let at = at.max(self.now);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled {
            at,
            rank: event.rank(),
            seq,
            event,
        }));
    }

    /// Schedule an event `delay` after the current time
    pub fn schedule_in(&mut self, delay: SimTime, event: Event) {
        self.schedule(self.now.saturating_add(delay), event);
    }

    /// Halt at `deadline`: only stop events run at that instant, nothing after
    pub fn stop_at(&mut self, deadline: SimTime) {
        self.stop_at = Some(deadline);
    }

    /// Advance the clock to the next runnable event
    pub fn next_event(&mut self) -> Option<(SimTime, Event)> {
        let Reverse(head) = self.queue.peek()?;
        if let Some(deadline) = self.stop_at {
            let past_deadline = head.at > deadline
                || (head.at == deadline && !matches!(head.event, Event::Stop(_)));
            if past_deadline {
                return None;
            }
        }

        let Reverse(scheduled) = self.queue.pop()?;
        self.now = scheduled.at;
        self.executed += 1;
        Some((scheduled.at, scheduled.event))
    }

    /// Events still queued that will never run because of the deadline
    pub fn abandoned(&self) -> usize {
        match self.stop_at {
            Some(deadline) => self
                .queue
                .iter()
                .filter(|Reverse(s)| s.at >= deadline && !matches!(s.event, Event::Stop(_)))
                .count(),
            None => 0,
        }
    }
}
