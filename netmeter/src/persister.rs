use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{select, tick};
use store::{Snapshot, Store, StoreError};
use tracing::{debug, error, info, warn};

use crate::accumulator::Accumulator;
use crate::format::byte_count_si;
use crate::shutdown::Shutdown;

/// Durable destination of periodic snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Persists one snapshot, giving up with [`StoreError::Timeout`] after `timeout`.
    fn insert(&self, snapshot: &Snapshot, timeout: Duration) -> Result<(), StoreError>;
}

impl SnapshotStore for Store {
    fn insert(&self, snapshot: &Snapshot, timeout: Duration) -> Result<(), StoreError> {
        self.insert_snapshot(snapshot, timeout)
    }
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    fn insert(&self, snapshot: &Snapshot, timeout: Duration) -> Result<(), StoreError> {
        (**self).insert(snapshot, timeout)
    }
}

/// Writes the periodic totals to a [`SnapshotStore`] every capture interval.
pub struct Persister<P> {
    store: P,
    totals: Arc<Accumulator>,
    interval: Duration,
    timeout: Duration,
}

impl<P: SnapshotStore> Persister<P> {
    pub fn new(store: P, totals: Arc<Accumulator>, interval: Duration, timeout: Duration) -> Self {
        Self {
            store,
            totals,
            interval,
            timeout,
        }
    }

    /// Persists the periodic totals and, only once the store accepted them,
    /// takes them out of the periodic sum. On error the sum is left as is and
    /// keeps growing until the next attempt.
    pub fn capture(&self) -> Result<Snapshot, StoreError> {
        let periodic = self.totals.periodic();
        let snapshot = Snapshot::new(periodic.into());
        debug!(
            sent = snapshot.stat.sent,
            recv = snapshot.stat.received,
            total = snapshot.stat.total,
            timestamp = snapshot.timestamp,
            "inserting stat into database"
        );
        self.store.insert(&snapshot, self.timeout)?;
        self.totals.settle_periodic(&periodic);
        debug!("reset periodic stat");
        Ok(snapshot)
    }

    /// Runs until `shutdown` is cancelled. Store failures are logged and retried
    /// on the next tick; they never stop the task.
    pub fn run(self, shutdown: Shutdown) -> Result<()> {
        info!(interval = ?self.interval, "capture started");
        let ticker = tick(self.interval);
        loop {
            let ticked = select! {
                recv(ticker) -> _ => true,
                recv(shutdown.signal()) -> _ => false,
            };
            if !ticked {
                break;
            }
            match self.capture() {
                Ok(snapshot) => info!(
                    total = %byte_count_si(snapshot.stat.total),
                    "snapshot persisted"
                ),
                Err(StoreError::Timeout(timeout)) => warn!(
                    ?timeout,
                    "inserting snapshot timed out, retrying next period"
                ),
                Err(e) => error!("failed to insert snapshot: {}, retrying next period", e),
            }
        }
        let unsaved = self.totals.periodic();
        if unsaved.total() > 0 {
            warn!(
                unsaved = %byte_count_si(unsaved.total()),
                "capture stopped before the current period was persisted"
            );
        }
        info!("capture stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::Counters;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Records inserted snapshots; scripted failures are returned first.
    #[derive(Default)]
    struct MockStore {
        failures: Mutex<VecDeque<StoreError>>,
        inserted: Mutex<Vec<Snapshot>>,
    }

    impl MockStore {
        fn failing(failures: Vec<StoreError>) -> Self {
            Self {
                failures: Mutex::new(failures.into()),
                ..Default::default()
            }
        }
    }

    impl SnapshotStore for MockStore {
        fn insert(&self, snapshot: &Snapshot, _timeout: Duration) -> Result<(), StoreError> {
            if let Some(e) = self.failures.lock().pop_front() {
                return Err(e);
            }
            self.inserted.lock().push(*snapshot);
            Ok(())
        }
    }

    fn persister(store: MockStore) -> Persister<Arc<MockStore>> {
        Persister::new(
            Arc::new(store),
            Arc::new(Accumulator::new()),
            Duration::from_millis(5),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_capture_persists_and_resets() {
        let p = persister(MockStore::default());
        p.totals.add_delta(&Counters::new(100, 10));
        p.totals.add_delta(&Counters::new(200, 20));

        let snapshot = p.capture().unwrap();
        assert_eq!(snapshot.stat, store::Stat::new(300, 30));
        assert_eq!(p.store.inserted.lock().as_slice(), &[snapshot]);
        assert_eq!(p.totals.periodic(), Counters::ZERO);
        assert_eq!(p.totals.cumulative(), Counters::new(300, 30));
    }

    #[test]
    fn test_failed_capture_keeps_periodic() {
        let p = persister(MockStore::failing(vec![StoreError::Timeout(
            Duration::from_secs(1),
        )]));
        p.totals.add_delta(&Counters::new(100, 10));

        let err = p.capture().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(p.totals.periodic(), Counters::new(100, 10));
        assert!(p.store.inserted.lock().is_empty());

        // the next period's traffic rolls into the retried snapshot
        p.totals.add_delta(&Counters::new(200, 20));
        let snapshot = p.capture().unwrap();
        assert_eq!(snapshot.stat, store::Stat::new(300, 30));
        assert_eq!(p.totals.periodic(), Counters::ZERO);
    }

    #[test]
    fn test_other_store_errors_keep_periodic() {
        let p = persister(MockStore::failing(vec![StoreError::NoRows]));
        p.totals.add_delta(&Counters::new(1, 1));
        assert!(p.capture().is_err());
        assert_eq!(p.totals.periodic(), Counters::new(1, 1));
    }

    #[test]
    fn test_capture_into_sqlite() {
        let db = Arc::new(Store::new_in_memory().unwrap());
        let totals = Arc::new(Accumulator::new());
        let p = Persister::new(
            db.clone(),
            totals.clone(),
            Duration::from_secs(60),
            Duration::from_secs(3),
        );
        totals.add_delta(&Counters::new(500, 50));
        p.capture().unwrap();
        let snapshots = db.list_snapshots(Duration::from_secs(3)).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].stat, store::Stat::new(500, 50));
    }

    #[test]
    fn test_run_retries_until_success() {
        let p = persister(MockStore::failing(vec![StoreError::Timeout(
            Duration::from_secs(1),
        )]));
        p.totals.add_delta(&Counters::new(100, 10));
        let mock = p.store.clone();
        let totals = p.totals.clone();
        let shutdown = Shutdown::new();
        let handle = {
            let shutdown = shutdown.clone();
            std::thread::spawn(move || p.run(shutdown))
        };
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while mock.inserted.lock().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        shutdown.cancel();
        handle.join().unwrap().unwrap();

        let inserted = mock.inserted.lock();
        assert_eq!(inserted[0].stat, store::Stat::new(100, 10));
        assert_eq!(totals.cumulative(), Counters::new(100, 10));
    }
}
