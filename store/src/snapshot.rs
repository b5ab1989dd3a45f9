use std::time::Duration;

use crate::{now, Store, StoreError};
use rusqlite::params;

/// Traffic totals of one persistence period.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub sent: u64,
    pub received: u64,
    pub total: u64,
}

impl Stat {
    pub fn new(sent: u64, received: u64) -> Self {
        Self {
            sent,
            received,
            total: sent.saturating_add(received),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// unix seconds
    pub timestamp: i64,
    pub stat: Stat,
}

impl Snapshot {
    pub fn new(stat: Stat) -> Self {
        Self::at(now(), stat)
    }

    pub fn at(timestamp: i64, stat: Stat) -> Self {
        Self { timestamp, stat }
    }
}

// region: snapshots
impl Store {
    pub fn insert_snapshot(
        &self,
        snapshot: &Snapshot,
        timeout: Duration,
    ) -> Result<(), StoreError> {
        self.with_deadline(timeout, |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                r#"INSERT INTO {} (timestamp, sent, received, total) VALUES (?, ?, ?, ?)"#,
                Self::TABLE_SNAPSHOTS
            ))?;
            let affected = stmt.execute(params![
                snapshot.timestamp,
                snapshot.stat.sent,
                snapshot.stat.received,
                snapshot.stat.total,
            ])?;
            debug_assert_eq!(affected, 1);
            Ok(())
        })
    }

    pub fn list_snapshots(&self, timeout: Duration) -> Result<Vec<Snapshot>, StoreError> {
        self.with_deadline(timeout, |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                r#"SELECT timestamp, sent, received, total FROM {} ORDER BY timestamp, id"#,
                Self::TABLE_SNAPSHOTS
            ))?;
            let rows = stmt.query_map(params![], |row| {
                Ok(Snapshot {
                    timestamp: row.get(0)?,
                    stat: Stat {
                        sent: row.get(1)?,
                        received: row.get(2)?,
                        total: row.get(3)?,
                    },
                })
            })?;
            rows.collect()
        })
    }
}
// endregion: snapshots
