//! Point-to-point links between an NI and its local router (spec §6).
//!
//! Each link holds at most one item in flight at a time and delivers it
//! exactly one cycle after it was sent, mirroring the original's
//! single-flit-per-cycle net link and its companion credit link.

use std::collections::VecDeque;

use noc_core::{Credit, Flit};

/// A single-slot-per-cycle FIFO with a fixed transit delay.
#[derive(Debug, Clone)]
struct DelayLine<T> {
    transit_delay: u64,
    pending: VecDeque<(u64, T)>,
}

impl<T> DelayLine<T> {
    fn new(transit_delay: u64) -> Self {
        Self {
            transit_delay: transit_delay.max(1),
            pending: VecDeque::new(),
        }
    }

    fn send(&mut self, item: T, cycle: u64) {
        self.pending.push_back((cycle + self.transit_delay, item));
    }

    fn poll(&mut self, cycle: u64) -> Option<T> {
        if self.pending.front().is_some_and(|(ready_at, _)| *ready_at <= cycle) {
            self.pending.pop_front().map(|(_, item)| item)
        } else {
            None
        }
    }
}

/// Carries flits from an NI's egress to its local router, one hop.
#[derive(Debug, Clone)]
pub struct NetworkLink {
    line: DelayLine<Flit>,
}

impl NetworkLink {
    pub fn new(transit_delay: u64) -> Self {
        Self {
            line: DelayLine::new(transit_delay),
        }
    }

    pub fn send(&mut self, flit: Flit, cycle: u64) {
        self.line.send(flit, cycle);
    }

    pub fn poll(&mut self, cycle: u64) -> Option<Flit> {
        self.line.poll(cycle)
    }
}

/// Carries credits back from a router's input unit to the upstream NI.
#[derive(Debug, Clone)]
pub struct CreditLink {
    line: DelayLine<Credit>,
}

impl CreditLink {
    pub fn new(transit_delay: u64) -> Self {
        Self {
            line: DelayLine::new(transit_delay),
        }
    }

    pub fn send(&mut self, credit: Credit, cycle: u64) {
        self.line.send(credit, cycle);
    }

    pub fn poll(&mut self, cycle: u64) -> Option<Credit> {
        self.line.poll(cycle)
    }
}
