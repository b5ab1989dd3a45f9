use anyhow::{Context, Result};
use tracing::info;

use crate::shutdown::Shutdown;

/// Cancels `shutdown` on SIGINT, SIGTERM or SIGHUP. Can be installed once per process.
pub fn cancel_on_signals(shutdown: Shutdown) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("termination signal received, shutting down");
        shutdown.cancel();
    })
    .context("install signal handler")
}
