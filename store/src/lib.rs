mod error;
mod report;
mod snapshot;

pub use error::StoreError;
pub use report::{DailyStat, MonthStat};
pub use snapshot::{Snapshot, Stat};

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::debug;

// sqlite virtual machine instructions between two deadline checks
const PROGRESS_OPS: i32 = 1000;

#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Store {
    const TABLE_SNAPSHOTS: &str = "snapshots";

    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db directory `{}`", parent.display()))?;
        }
        let conn =
            Connection::open(&path).with_context(|| format!("open db `{}`", path.display()))?;
        let store = Store {
            db_path: path,
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        debug!(path = %store.db_path.display(), "snapshot store opened");
        Ok(store)
    }

    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store {
            db_path: PathBuf::new(),
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init_tables(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                sent INTEGER NOT NULL,
                received INTEGER NOT NULL,
                total INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {table}_timestamp ON {table} (timestamp);
            "#,
            table = Self::TABLE_SNAPSHOTS,
        ))?;
        Ok(())
    }

    /// Runs `f` with the connection, failing with `StoreError::Timeout` once
    /// `timeout` elapses while waiting for the connection, a database lock or
    /// the statement itself.
    fn with_deadline<T>(
        &self,
        timeout: Duration,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let deadline = Instant::now() + timeout;
        let conn = self
            .conn
            .try_lock_for(timeout)
            .ok_or(StoreError::Timeout(timeout))?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        conn.busy_timeout(remaining)
            .map_err(|e| StoreError::from_sqlite(e, timeout))?;
        conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
        let ret = f(&conn);
        conn.progress_handler(0, None::<fn() -> bool>);
        ret.map_err(|e| StoreError::from_sqlite(e, timeout))
    }

    #[cfg(test)]
    pub(crate) fn store_for_test() -> Store {
        Store::new_in_memory().expect("init store")
    }
}

pub(crate) fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
