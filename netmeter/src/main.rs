mod logger;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use config::Config;
use netmeter::format::byte_count_si;
use netmeter::report::{self, Query};
use netmeter::{Service, Settings, Shutdown, SnapshotStore, SystemStats, signal};
use store::Store;
use tracing::info;

use crate::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(
    name = "netmeter",
    version,
    author = "gfreezy <gfreezy@gmail.com>",
    about = "Measures network throughput of this host and records it to SQLite."
)]
struct Cli {
    /// Sets config file.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Log file. Logs go to stderr when unset.
    #[arg(short, long, value_name = "PATH", env = "NETMETER_LOG", global = true)]
    log: Option<PathBuf>,
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
    /// Database file.
    #[arg(long, value_name = "PATH", env = "NETMETER_DB", global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shows live throughput (default).
    Monitor(MonitorArgs),
    /// Prints recorded traffic.
    Stats {
        #[command(subcommand)]
        query: StatsQuery,
    },
}

#[derive(Args, Debug, Default)]
struct MonitorArgs {
    #[arg(long, value_name = "DURATION", value_parser = config::parse_duration)]
    monitor_interval: Option<Duration>,
    #[arg(long, value_name = "DURATION", value_parser = config::parse_duration)]
    capture_interval: Option<Duration>,
    /// Records traffic to the database every capture interval.
    #[arg(long)]
    persist: bool,
    /// Only counts this interface. Repeat for more.
    #[arg(short, long = "interface", value_name = "NAME")]
    interfaces: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum StatsQuery {
    /// Traffic of the current day.
    Today,
    /// Daily traffic of a month.
    Month {
        #[arg(value_name = "YYYY-MM", value_parser = parse_month)]
        month: Option<String>,
    },
    /// Daily traffic of every recorded day.
    All,
    /// Months of a year with recorded traffic.
    Months {
        #[arg(value_name = "YYYY", value_parser = parse_year)]
        year: Option<String>,
    },
}

impl From<StatsQuery> for Query {
    fn from(query: StatsQuery) -> Self {
        match query {
            StatsQuery::Today => Query::Today,
            StatsQuery::Month { month } => Query::Month(month),
            StatsQuery::All => Query::All,
            StatsQuery::Months { year } => Query::Months(year),
        }
    }
}

fn parse_month(s: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
        .map(|date| date.format("%Y-%m").to_string())
        .map_err(|_| format!("`{}` is not a month, expected YYYY-MM", s))
}

fn parse_year(s: &str) -> Result<String, String> {
    match s.parse::<u16>() {
        Ok(_) if s.len() == 4 => Ok(s.to_string()),
        _ => Err(format!("`{}` is not a year, expected YYYY", s)),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_config_file(path)
            .with_context(|| format!("failed to load config `{}`", path.display()))?,
        None => Config::default(),
    };
    if let Some(log) = &cli.log {
        config.log_path = Some(log.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(Command::Monitor(args)) = &cli.command {
        if let Some(interval) = args.monitor_interval {
            config.monitor_interval = interval;
        }
        if let Some(interval) = args.capture_interval {
            config.capture_interval = interval;
        }
        if args.persist {
            config.persist = true;
        }
        if !args.interfaces.is_empty() {
            config.interfaces = args.interfaces.clone();
        }
    }
    config.validate().context("invalid config")?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    setup_logger(config.log_path.as_deref(), &config.log_level)?;

    match cli.command {
        None | Some(Command::Monitor(_)) => monitor(&config),
        Some(Command::Stats { query }) => stats(&config, query.into()),
    }
}

fn monitor(config: &Config) -> Result<()> {
    let store: Option<Arc<dyn SnapshotStore>> = if config.persist {
        let store = Store::new(&config.db_path)
            .with_context(|| format!("failed to open database `{}`", config.db_path.display()))?;
        info!(path = %store.db_path().display(), "database opened");
        Some(Arc::new(store))
    } else {
        None
    };

    let shutdown = Shutdown::new();
    signal::cancel_on_signals(shutdown.clone())?;

    let service = Service::new(Settings::from(config));
    let source = SystemStats::new(config.interfaces.clone());
    let result = service.run(source, store, io::stdout(), shutdown);

    let captured = service.totals().cumulative();
    println!(
        "Capture: sent: {}  received: {}  total: {}",
        byte_count_si(captured.sent()),
        byte_count_si(captured.recv()),
        byte_count_si(captured.total()),
    );
    result?;
    println!("Stop monitoring. Bye bye...");
    Ok(())
}

fn stats(config: &Config, query: Query) -> Result<()> {
    if !config.db_path.exists() {
        bail!("database `{}` does not exist", config.db_path.display());
    }
    let store = Store::new(&config.db_path)
        .with_context(|| format!("failed to open database `{}`", config.db_path.display()))?;
    report::respond(&store, &query, config.store_timeout, &mut io::stdout().lock())
}
