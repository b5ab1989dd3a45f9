use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, select};
use tracing::{debug, info};

use crate::accumulator::Accumulator;
use crate::counters::Delta;
use crate::format::byte_count_si;
use crate::shutdown::Shutdown;

/// Writes one line per delta, followed by the cumulative total at that moment.
pub struct Presenter<W> {
    out: W,
    totals: Arc<Accumulator>,
}

impl<W: Write> Presenter<W> {
    pub fn new(out: W, totals: Arc<Accumulator>) -> Self {
        Self { out, totals }
    }

    pub fn render(&mut self, delta: &Delta) -> io::Result<()> {
        let cumulative = byte_count_si(self.totals.peek_total());
        let sent = byte_count_si(delta.sent());
        let received = byte_count_si(delta.recv());
        let total = byte_count_si(delta.total());
        debug!(%sent, %received, %total, %cumulative, "monitored");
        writeln!(
            self.out,
            "sent: {}  received: {}  total: {}  cumulative: {}",
            sent, received, total, cumulative
        )?;
        self.out.flush()
    }

    /// Runs until the delta channel is closed or `shutdown` is cancelled.
    pub fn run(mut self, input: Receiver<Delta>, shutdown: Shutdown) -> Result<()> {
        info!("display started");
        loop {
            let delta = select! {
                recv(input) -> msg => msg.ok(),
                recv(shutdown.signal()) -> _ => None,
            };
            let Some(delta) = delta else {
                break;
            };
            if let Err(e) = self.render(&delta) {
                // cancel while `input` is still open so the monitor stops
                // instead of seeing a closed channel
                shutdown.cancel();
                return Err(e).context("failed to write monitored stat");
            }
        }
        info!("display stopped");
        Ok(())
    }
}
