use std::time::Duration;

use crate::{Stat, Store, StoreError};
use rusqlite::{params, Row};

/// Totals of every snapshot taken on one UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyStat {
    /// unix seconds at UTC midnight
    pub day: i64,
    /// number of snapshots, i.e. capture periods monitored that day
    pub snapshots: u32,
    pub stat: Stat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthStat {
    /// `YYYY-MM`
    pub month: String,
    pub stat: Stat,
}

fn daily_stat(row: &Row<'_>) -> rusqlite::Result<DailyStat> {
    Ok(DailyStat {
        day: row.get("day")?,
        snapshots: row.get("snapshots")?,
        stat: Stat {
            sent: row.get("sent")?,
            received: row.get("received")?,
            total: row.get("total")?,
        },
    })
}

// region: report
impl Store {
    /// Per-day totals, newest first. `month` (`YYYY-MM`) limits the rows to one month.
    pub fn daily_stats(
        &self,
        month: Option<&str>,
        timeout: Duration,
    ) -> Result<Vec<DailyStat>, StoreError> {
        self.with_deadline(timeout, |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                r#"
                SELECT
                    CAST(strftime('%s', date(timestamp, 'unixepoch')) AS INTEGER) AS day,
                    COUNT(*) AS snapshots,
                    SUM(sent) AS sent,
                    SUM(received) AS received,
                    SUM(total) AS total
                FROM {}
                WHERE ?1 IS NULL OR strftime('%Y-%m', timestamp, 'unixepoch') = ?1
                GROUP BY day
                ORDER BY day DESC
                "#,
                Self::TABLE_SNAPSHOTS
            ))?;
            let rows = stmt.query_map(params![month], daily_stat)?;
            rows.collect()
        })
    }

    /// Totals of one UTC day (`YYYY-MM-DD`).
    pub fn day_stat(&self, date: &str, timeout: Duration) -> Result<DailyStat, StoreError> {
        self.with_deadline(timeout, |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                r#"
                SELECT
                    CAST(strftime('%s', date(timestamp, 'unixepoch')) AS INTEGER) AS day,
                    COUNT(*) AS snapshots,
                    SUM(sent) AS sent,
                    SUM(received) AS received,
                    SUM(total) AS total
                FROM {}
                WHERE date(timestamp, 'unixepoch') = ?1
                GROUP BY day
                "#,
                Self::TABLE_SNAPSHOTS
            ))?;
            stmt.query_row(params![date], daily_stat)
        })
    }

    pub fn month_stat(&self, month: &str, timeout: Duration) -> Result<MonthStat, StoreError> {
        self.with_deadline(timeout, |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                r#"
                SELECT
                    strftime('%Y-%m', timestamp, 'unixepoch') AS month,
                    SUM(sent) AS sent,
                    SUM(received) AS received,
                    SUM(total) AS total
                FROM {}
                WHERE strftime('%Y-%m', timestamp, 'unixepoch') = ?1
                GROUP BY month
                "#,
                Self::TABLE_SNAPSHOTS
            ))?;
            stmt.query_row(params![month], |row| {
                Ok(MonthStat {
                    month: row.get("month")?,
                    stat: Stat {
                        sent: row.get("sent")?,
                        received: row.get("received")?,
                        total: row.get("total")?,
                    },
                })
            })
        })
    }

    /// Months (`YYYY-MM`) of `year` that have at least one snapshot, oldest first.
    pub fn months_in_year(&self, year: &str, timeout: Duration) -> Result<Vec<String>, StoreError> {
        self.with_deadline(timeout, |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                r#"
                SELECT DISTINCT strftime('%Y-%m', timestamp, 'unixepoch') AS month
                FROM {}
                WHERE strftime('%Y', timestamp, 'unixepoch') = ?1
                ORDER BY month
                "#,
                Self::TABLE_SNAPSHOTS
            ))?;
            let rows = stmt.query_map(params![year], |row| row.get::<_, String>("month"))?;
            rows.collect()
        })
    }
}
// endregion: report
