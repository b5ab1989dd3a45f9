use rusqlite::ErrorCode;
use std::time::Duration;
use thiserror::Error;

/// Failures of a bounded store operation.
///
/// `Timeout` covers lock waits, busy databases and statements interrupted by
/// the deadline. Callers retry those; `NoRows` means the query matched nothing.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("found no rows")]
    NoRows,
    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

impl StoreError {
    pub(crate) fn from_sqlite(e: rusqlite::Error, timeout: Duration) -> Self {
        let timed_out = matches!(
            e.sqlite_error_code(),
            Some(
                ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::OperationInterrupted
            )
        );
        if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            StoreError::NoRows
        } else if timed_out {
            StoreError::Timeout(timeout)
        } else {
            StoreError::Sqlite(e)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout(_))
    }
}
