use anyhow::{Context, Result};
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use parking_lot::Mutex;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Clone)]
struct TracingWriter {
    file_rotate: Arc<Mutex<FileRotate<AppendCount>>>,
}

impl TracingWriter {
    fn new(file_rotate: Arc<Mutex<FileRotate<AppendCount>>>) -> Self {
        TracingWriter { file_rotate }
    }
}

impl io::Write for TracingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_rotate.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_rotate.lock().flush()
    }
}

/// Logs go to `log_path` (rotated) when given, to stderr otherwise; stdout
/// belongs to the live display.
pub fn setup_logger(log_path: Option<&Path>, level: &str) -> Result<()> {
    let env_filter = EnvFilter::new(format!("netmeter={}", level))
        .add_directive(format!("store={}", level).parse()?)
        .add_directive(format!("netstat={}", level).parse()?)
        .add_directive(format!("config={}", level).parse()?);

    if let Some(log_path) = log_path {
        if let Some(path) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(path)
                .with_context(|| format!("create log directory `{}`", path.display()))?;
        }
        let logger = Arc::new(Mutex::new(FileRotate::new(
            log_path,
            AppendCount::new(20),
            ContentLimit::Lines(100_000),
            Compression::None,
            #[cfg(unix)]
            None,
        )));
        let my_subscriber = FmtSubscriber::builder()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_writer(move || TracingWriter::new(logger.clone()))
            .finish();
        tracing::subscriber::set_global_default(my_subscriber)
            .context("setting tracing default failed")?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .compact()
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .context("setting tracing default failed")?;
    };

    #[cfg(debug_assertions)]
    {
        // only for #[cfg]
        use parking_lot::deadlock;
        use std::thread;
        use std::time::Duration;

        // Create a background thread which checks for deadlocks every 10s
        thread::spawn(move || {
            loop {
                thread::sleep(Duration::from_secs(10));
                let deadlocks = deadlock::check_deadlock();
                if deadlocks.is_empty() {
                    continue;
                }

                eprintln!("{} deadlocks detected", deadlocks.len());
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("Deadlock #{}", i);
                    for t in threads {
                        eprintln!("Thread Id {:#?}", t.thread_id());
                        eprintln!("{:#?}", t.backtrace());
                    }
                }
            }
        });
    } // only for #[cfg]
    Ok(())
}
