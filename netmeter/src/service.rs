use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::accumulator::Accumulator;
use crate::collector::Collector;
use crate::counters::Delta;
use crate::persister::{Persister, SnapshotStore};
use crate::presenter::Presenter;
use crate::shutdown::Shutdown;
use crate::source::StatSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub monitor_interval: Duration,
    pub capture_interval: Duration,
    pub store_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&config::Config::default())
    }
}

impl From<&config::Config> for Settings {
    fn from(config: &config::Config) -> Self {
        Self {
            monitor_interval: config.monitor_interval,
            capture_interval: config.capture_interval,
            store_timeout: config.store_timeout,
        }
    }
}

/// Wires collector, presenter and the optional persister together.
pub struct Service {
    settings: Settings,
    totals: Arc<Accumulator>,
}

impl Service {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            totals: Arc::new(Accumulator::new()),
        }
    }

    pub fn totals(&self) -> Arc<Accumulator> {
        self.totals.clone()
    }

    /// Runs the pipeline until `shutdown` is cancelled or a task fails.
    ///
    /// The baseline reading is taken before any task starts; failing to get it
    /// is a startup error. Without a store nothing is persisted.
    pub fn run<S, W>(
        &self,
        mut source: S,
        store: Option<Arc<dyn SnapshotStore>>,
        out: W,
        shutdown: Shutdown,
    ) -> Result<()>
    where
        S: StatSource + 'static,
        W: Write + Send + 'static,
    {
        let baseline = source
            .read()
            .context("failed to read initial network counters")?;
        debug!(?baseline, "initial network counters");

        // rendezvous: the collector blocks until the presenter takes the delta
        let (tx, rx) = bounded::<Delta>(0);
        let collector = Collector::new(source, self.totals.clone(), self.settings.monitor_interval)
            .with_baseline(baseline);
        let presenter = Presenter::new(out, self.totals.clone());

        let mut group = TaskGroup::new(shutdown);
        group.spawn("monitor", move |shutdown| collector.run(tx, shutdown));
        group.spawn("display", move |shutdown| presenter.run(rx, shutdown));
        match store {
            Some(store) => {
                info!("persistence enabled");
                let persister = Persister::new(
                    store,
                    self.totals.clone(),
                    self.settings.capture_interval,
                    self.settings.store_timeout,
                );
                group.spawn("capture", move |shutdown| persister.run(shutdown));
            }
            None => info!("persistence disabled"),
        }

        group.wait().context("service failed while running")
    }
}

/// Threads sharing one [`Shutdown`]. The first task to fail records its error
/// and cancels the others.
struct TaskGroup {
    shutdown: Shutdown,
    first_error: Arc<Mutex<Option<anyhow::Error>>>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskGroup {
    fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            first_error: Arc::new(Mutex::new(None)),
            handles: vec![],
        }
    }

    fn fail(first_error: &Mutex<Option<anyhow::Error>>, shutdown: &Shutdown, e: anyhow::Error) {
        let mut first = first_error.lock();
        if first.is_none() {
            *first = Some(e);
        }
        drop(first);
        shutdown.cancel();
    }

    fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(Shutdown) -> Result<()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let first_error = self.first_error.clone();
        let spawned = thread::Builder::new()
            .name(format!("netmeter-{}", name))
            .spawn(move || {
                debug!(task = name, "running");
                let task_shutdown = shutdown.clone();
                let ret = panic::catch_unwind(AssertUnwindSafe(move || task(task_shutdown)))
                    .unwrap_or_else(|_| Err(anyhow!("task panicked")));
                match ret {
                    Ok(()) => debug!(task = name, "stopped"),
                    Err(e) => {
                        error!(task = name, "{:#}", e);
                        Self::fail(&first_error, &shutdown, e.context(format!("{} failed", name)));
                    }
                }
            });
        match spawned {
            Ok(handle) => self.handles.push((name, handle)),
            Err(e) => Self::fail(
                &self.first_error,
                &self.shutdown,
                anyhow::Error::new(e).context(format!("failed to spawn {}", name)),
            ),
        }
    }

    /// Joins every task and returns the first recorded error.
    fn wait(self) -> Result<()> {
        for (name, handle) in self.handles {
            if handle.join().is_err() {
                Self::fail(&self.first_error, &self.shutdown, anyhow!("{} panicked", name));
            }
        }
        match self.first_error.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
