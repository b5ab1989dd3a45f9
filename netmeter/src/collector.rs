use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use crossbeam_channel::{Sender, select, tick};
use tracing::{debug, info, trace, warn};

use crate::accumulator::Accumulator;
use crate::counters::{Counters, Delta};
use crate::shutdown::Shutdown;
use crate::source::StatSource;

/// Samples a [`StatSource`] every monitor interval and turns consecutive
/// readings into deltas.
pub struct Collector<S> {
    source: S,
    previous: Option<Counters>,
    totals: Arc<Accumulator>,
    interval: Duration,
}

impl<S: StatSource> Collector<S> {
    pub fn new(source: S, totals: Arc<Accumulator>, interval: Duration) -> Self {
        Self {
            source,
            previous: None,
            totals,
            interval,
        }
    }

    /// Starts from an already taken reading instead of spending the first tick on it.
    pub fn with_baseline(mut self, baseline: Counters) -> Self {
        self.previous = Some(baseline);
        self
    }

    pub fn previous(&self) -> Option<Counters> {
        self.previous
    }

    /// Takes one reading. Returns the delta against the previous reading after
    /// adding it to the shared totals.
    ///
    /// A failed read changes nothing. The first reading, and a reading where a
    /// counter went backwards, only become the new baseline.
    pub fn sample(&mut self) -> Option<Delta> {
        let current = match self.source.read() {
            Ok(current) => current,
            Err(e) => {
                warn!("failed to get new netstat: {:#}", e);
                return None;
            }
        };
        let Some(previous) = self.previous.replace(current) else {
            debug!(?current, "baseline established");
            return None;
        };
        match current.delta_since(&previous) {
            Some(delta) => {
                self.totals.add_delta(&delta);
                trace!(?delta, "update cumulative and periodic stat");
                Some(delta)
            }
            None => {
                warn!(
                    ?previous,
                    ?current,
                    "network counters went backwards, using the new reading as baseline"
                );
                None
            }
        }
    }

    /// Runs until `shutdown` is cancelled. `output` is owned here and dropped
    /// on return, which closes the delta channel exactly once.
    ///
    /// A send interrupted by cancellation leaves its delta in the totals.
    pub fn run(mut self, output: Sender<Delta>, shutdown: Shutdown) -> Result<()> {
        info!(interval = ?self.interval, "monitor started");
        let ticker = tick(self.interval);
        loop {
            let ticked = select! {
                recv(ticker) -> _ => true,
                recv(shutdown.signal()) -> _ => false,
            };
            if !ticked {
                break;
            }
            let Some(delta) = self.sample() else {
                continue;
            };
            let sent = select! {
                send(output, delta) -> res => Some(res.is_ok()),
                recv(shutdown.signal()) -> _ => None,
            };
            match sent {
                Some(true) => {}
                Some(false) if !shutdown.is_cancelled() => {
                    bail!("delta channel closed by the receiver while monitoring")
                }
                _ => break,
            }
        }
        info!("monitor stopping");
        drop(ticker);
        drop(output);
        info!("monitor stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use crossbeam_channel::bounded;
    use std::collections::VecDeque;
    use std::thread;
    use std::time::Instant;

    /// Replays readings; `None` entries fail.
    fn scripted(readings: Vec<Option<Counters>>) -> impl StatSource {
        let mut readings: VecDeque<_> = readings.into();
        move || match readings.pop_front() {
            Some(Some(c)) => Ok(c),
            Some(None) => Err(anyhow!("counters unavailable")),
            None => Err(anyhow!("exhausted")),
        }
    }

    fn collector(readings: Vec<Option<Counters>>) -> Collector<impl StatSource> {
        Collector::new(
            scripted(readings),
            Arc::new(Accumulator::new()),
            Duration::from_millis(5),
        )
    }

    #[test]
    fn test_first_sample_is_baseline() {
        let mut c = collector(vec![Some(Counters::new(1000, 200))]);
        assert_eq!(c.sample(), None);
        assert_eq!(c.previous(), Some(Counters::new(1000, 200)));
        assert_eq!(c.totals.cumulative(), Counters::ZERO);
    }

    #[test]
    fn test_delta_between_samples() {
        let mut c = collector(vec![
            Some(Counters::new(1000, 200)),
            Some(Counters::new(1500, 250)),
        ]);
        assert_eq!(c.sample(), None);
        assert_eq!(c.sample(), Some(Counters::new(500, 50)));
        assert_eq!(c.totals.cumulative(), Counters::new(500, 50));
        assert_eq!(c.totals.periodic(), Counters::new(500, 50));
        assert_eq!(c.previous(), Some(Counters::new(1500, 250)));
    }

    #[test]
    fn test_failed_sample_changes_nothing() {
        let mut c = collector(vec![
            Some(Counters::new(1000, 200)),
            Some(Counters::new(1100, 210)),
            None,
            Some(Counters::new(1300, 230)),
        ]);
        c.sample();
        assert_eq!(c.sample(), Some(Counters::new(100, 10)));
        let before = c.totals.totals();

        assert_eq!(c.sample(), None);
        assert_eq!(c.previous(), Some(Counters::new(1100, 210)));
        assert_eq!(c.totals.totals(), before);

        // the next delta spans the failed tick
        assert_eq!(c.sample(), Some(Counters::new(200, 20)));
        assert_eq!(c.totals.cumulative(), Counters::new(300, 30));
    }

    #[test]
    fn test_counter_reset_becomes_baseline() {
        let mut c = collector(vec![
            Some(Counters::new(1000, 200)),
            Some(Counters::new(10, 5)),
            Some(Counters::new(40, 15)),
        ]);
        c.sample();
        assert_eq!(c.sample(), None);
        assert_eq!(c.previous(), Some(Counters::new(10, 5)));
        assert_eq!(c.totals.cumulative(), Counters::ZERO);
        assert_eq!(c.sample(), Some(Counters::new(30, 10)));
    }

    #[test]
    fn test_emitted_deltas_match_successful_samples() {
        let readings = vec![
            Some(Counters::new(0, 0)),
            None,
            Some(Counters::new(10, 1)),
            Some(Counters::new(20, 2)),
            None,
            None,
            Some(Counters::new(30, 3)),
        ];
        let successful = readings.iter().filter(|r| r.is_some()).count();
        let mut c = collector(readings.clone());
        let emitted = (0..readings.len()).filter_map(|_| c.sample()).count();
        // the first successful reading is the baseline
        assert_eq!(emitted, successful - 1);
        assert_eq!(c.totals.cumulative(), Counters::new(30, 3));
    }

    #[test]
    fn test_run_closes_channel_on_shutdown() {
        let c = collector(vec![]);
        let (tx, rx) = bounded(0);
        let shutdown = Shutdown::new();
        let handle = {
            let shutdown = shutdown.clone();
            thread::spawn(move || c.run(tx, shutdown))
        };
        shutdown.cancel();
        handle.join().unwrap().unwrap();
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_cancel_while_blocked_on_send() {
        let mut n = 0;
        let source = move || -> Result<Counters> {
            n += 10;
            Ok(Counters::new(n, n))
        };
        let totals = Arc::new(Accumulator::new());
        let c = Collector::new(source, totals.clone(), Duration::from_millis(5));
        let (tx, rx) = bounded(0);
        let shutdown = Shutdown::new();
        let (done_tx, done_rx) = bounded(1);
        {
            let shutdown = shutdown.clone();
            thread::spawn(move || done_tx.send(c.run(tx, shutdown)));
        }

        // nobody receives: the monitor parks in the send after the first delta
        let deadline = Instant::now() + Duration::from_secs(5);
        while totals.cumulative() == Counters::ZERO {
            assert!(Instant::now() < deadline, "no delta produced");
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(50));
        shutdown.cancel();

        done_rx
            .recv_timeout(Duration::from_secs(1))
            .unwrap()
            .unwrap();
        assert!(rx.recv().is_err());
        assert_eq!(totals.cumulative(), Counters::new(10, 10));
        assert_eq!(totals.periodic(), Counters::new(10, 10));
    }

    #[test]
    fn test_run_fails_when_receiver_is_gone() {
        let c = collector(vec![Some(Counters::new(1, 1)), Some(Counters::new(2, 2))]);
        let (tx, rx) = bounded(0);
        drop(rx);
        let err = c.run(tx, Shutdown::new()).unwrap_err();
        assert!(err.to_string().contains("delta channel closed"));
    }
}
