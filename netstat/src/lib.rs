mod net;

pub use net::sys::io_counters;
pub use net::IoCounters;
