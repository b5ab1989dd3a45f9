use anyhow::{Context, Result};

use crate::counters::Counters;

/// Produces absolute byte counters for the monitored interfaces.
pub trait StatSource: Send {
    fn read(&mut self) -> Result<Counters>;
}

impl<F> StatSource for F
where
    F: FnMut() -> Result<Counters> + Send,
{
    fn read(&mut self) -> Result<Counters> {
        self()
    }
}

/// Counters of this host's network interfaces.
#[derive(Debug, Clone, Default)]
pub struct SystemStats {
    interfaces: Vec<String>,
}

impl SystemStats {
    /// An empty list sums every interface.
    pub fn new(interfaces: Vec<String>) -> Self {
        Self { interfaces }
    }
}

impl StatSource for SystemStats {
    fn read(&mut self) -> Result<Counters> {
        let counters = netstat::io_counters(&self.interfaces)
            .context("failed to capture network stat")?;
        Ok(counters.into())
    }
}
