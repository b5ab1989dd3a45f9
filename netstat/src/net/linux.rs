use super::{sum_devices, IoCounters};
use procfs::ProcError;
use std::io::Result;
use tracing::trace;

fn to_io_error(e: ProcError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e)
}

/// Reads `/proc/net/dev` and sums the byte counters of the selected interfaces.
pub fn io_counters(interfaces: &[String]) -> Result<IoCounters> {
    let devices = procfs::net::dev_status().map_err(to_io_error)?;
    let counters = sum_devices(
        devices
            .values()
            .map(|d| (d.name.as_str(), d.recv_bytes, d.sent_bytes)),
        interfaces,
    )?;
    trace!(?counters, "read /proc/net/dev");
    Ok(counters)
}
