pub mod accumulator;
pub mod collector;
pub mod counters;
pub mod format;
pub mod persister;
pub mod presenter;
pub mod report;
pub mod service;
pub mod shutdown;
pub mod signal;
pub mod source;

pub use accumulator::{Accumulator, Totals};
pub use counters::{Counters, Delta};
pub use persister::SnapshotStore;
pub use service::{Service, Settings};
pub use shutdown::Shutdown;
pub use source::{StatSource, SystemStats};
