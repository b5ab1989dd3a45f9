use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Cancellation token shared by every pipeline task.
///
/// Cancelling drops the only sender of an empty channel. Every clone of the
/// receiver then becomes ready at once, so the token can sit in a
/// `crossbeam_channel::select!` next to tickers and data channels.
#[derive(Clone, Debug)]
pub struct Shutdown {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.trigger.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Ready (with a disconnect error) once cancelled. Use as
    /// `recv(shutdown.signal()) -> _` inside `select!`.
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Blocks until cancelled or `timeout` elapses; true when cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.signal.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}
