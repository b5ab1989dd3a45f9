use parking_lot::RwLock;

use crate::counters::{Counters, Delta};

/// A consistent view of both running sums.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    /// everything since start
    pub cumulative: Counters,
    /// everything since the last successful persist
    pub periodic: Counters,
}

/// Running sums shared by the pipeline tasks.
///
/// Both sums sit behind one lock: a delta is applied to both in the same
/// critical section, and every reader sees a pair produced by whole deltas.
#[derive(Debug, Default)]
pub struct Accumulator {
    totals: RwLock<Totals>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_delta(&self, delta: &Delta) {
        let mut totals = self.totals.write();
        totals.cumulative += delta;
        totals.periodic += delta;
    }

    /// Cumulative total bytes.
    pub fn peek_total(&self) -> u64 {
        self.totals.read().cumulative.total()
    }

    pub fn cumulative(&self) -> Counters {
        self.totals.read().cumulative
    }

    pub fn periodic(&self) -> Counters {
        self.totals.read().periodic
    }

    pub fn totals(&self) -> Totals {
        *self.totals.read()
    }

    /// Removes a persisted amount from the periodic sum.
    ///
    /// `persisted` must be a value previously returned by [`Accumulator::periodic`].
    /// Deltas added after that read stay in the periodic sum; without any, it
    /// drops to zero.
    pub fn settle_periodic(&self, persisted: &Counters) {
        let mut totals = self.totals.write();
        totals.periodic = totals.periodic.saturating_sub(persisted);
    }
}
