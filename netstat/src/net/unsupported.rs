use super::IoCounters;
use std::io::{Error, ErrorKind, Result};

pub fn io_counters(_interfaces: &[String]) -> Result<IoCounters> {
    Err(Error::new(
        ErrorKind::Unsupported,
        "reading network counters is only supported on linux",
    ))
}
