use std::ops::AddAssign;

/// Byte counters of one sampling instant, or the difference between two.
///
/// `total` is always `sent + recv`; the fields are only reachable through
/// constructors and arithmetic that keep it that way.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    sent: u64,
    recv: u64,
    total: u64,
}

/// Traffic seen during one monitor interval.
pub type Delta = Counters;

impl Counters {
    pub const ZERO: Counters = Counters {
        sent: 0,
        recv: 0,
        total: 0,
    };

    pub fn new(sent: u64, recv: u64) -> Self {
        Self {
            sent,
            recv,
            total: sent.saturating_add(recv),
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn recv(&self) -> u64 {
        self.recv
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Traffic between `previous` and `self`, or `None` when any counter went
    /// backwards (interface reset or wrap).
    pub fn delta_since(&self, previous: &Counters) -> Option<Delta> {
        Some(Counters::new(
            self.sent.checked_sub(previous.sent)?,
            self.recv.checked_sub(previous.recv)?,
        ))
    }

    pub fn saturating_sub(&self, other: &Counters) -> Counters {
        Counters::new(
            self.sent.saturating_sub(other.sent),
            self.recv.saturating_sub(other.recv),
        )
    }
}

impl AddAssign<&Counters> for Counters {
    fn add_assign(&mut self, rhs: &Counters) {
        *self = Counters::new(
            self.sent.saturating_add(rhs.sent),
            self.recv.saturating_add(rhs.recv),
        );
    }
}

impl From<Counters> for store::Stat {
    fn from(c: Counters) -> Self {
        store::Stat {
            sent: c.sent,
            received: c.recv,
            total: c.total,
        }
    }
}

impl From<store::Stat> for Counters {
    fn from(s: store::Stat) -> Self {
        Counters::new(s.sent, s.received)
    }
}

impl From<netstat::IoCounters> for Counters {
    fn from(c: netstat::IoCounters) -> Self {
        Counters::new(c.bytes_sent, c.bytes_recv)
    }
}
