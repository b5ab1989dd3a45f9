pub use duration::parse_duration;

use serde::Deserialize;
use std::fs::File;
use std::io;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// How often the network counters are sampled.
    #[serde(with = "duration", default = "default_monitor_interval")]
    pub monitor_interval: Duration,
    /// How often the accumulated traffic is written to the database.
    #[serde(with = "duration", default = "default_capture_interval")]
    pub capture_interval: Duration,
    /// Upper bound of a single database operation.
    #[serde(with = "duration", default = "default_store_timeout")]
    pub store_timeout: Duration,
    #[serde(default)]
    pub persist: bool,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    // empty means all interfaces
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor_interval: default_monitor_interval(),
            capture_interval: default_capture_interval(),
            store_timeout: default_store_timeout(),
            persist: false,
            db_path: default_db_path(),
            interfaces: vec![],
            log_path: None,
            log_level: default_log_level(),
        }
    }
}

fn default_monitor_interval() -> Duration {
    Duration::from_secs(1)
}
fn default_capture_interval() -> Duration {
    Duration::from_secs(60 * 60)
}
fn default_store_timeout() -> Duration {
    Duration::from_secs(3)
}
fn default_db_path() -> PathBuf {
    PathBuf::from("netmeter.db")
}
fn default_log_level() -> String {
    "info".to_string()
}

mod duration {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    /// Parses `500ms`, `10s`, `5m` or `1h`.
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (num, unit) = s.split_at(split);
        let invalid = || format!("invalid value: {}, expected 500ms, 10s, 5m or 1h", s);
        let n: u64 = num.parse().map_err(|_| invalid())?;
        let secs = |factor: u64| {
            n.checked_mul(factor)
                .map(Duration::from_secs)
                .ok_or_else(invalid)
        };
        match unit.trim() {
            "ms" => Ok(Duration::from_millis(n)),
            "s" => Ok(Duration::from_secs(n)),
            "m" => secs(60),
            "h" => secs(60 * 60),
            _ => Err(invalid()),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(|_| {
            Error::invalid_value(serde::de::Unexpected::Str(&s), &"500ms, 10s, 5m or 1h")
        })
    }
}

impl Config {
    pub fn from_config_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Config::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> io::Result<Self> {
        let conf: Config = serde_yaml::from_reader(reader)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
        conf.validate()?;
        tracing::debug!(?conf, "config loaded");
        Ok(conf)
    }

    pub fn validate(&self) -> io::Result<()> {
        if self.monitor_interval.is_zero() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "monitor_interval can not be zero.",
            ));
        }
        if self.capture_interval.is_zero() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "capture_interval can not be zero.",
            ));
        }
        if self.store_timeout.is_zero() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "store_timeout can not be zero.",
            ));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("log_level must be one of {:?}.", LOG_LEVELS),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert!(parse_duration("1d").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5124095576030432h").is_err());
        assert!(parse_duration("307445734561825861m").is_err());
    }

    #[test]
    fn test_reject_overflowing_duration() {
        let err = Config::from_reader("capture_interval: 5124095576030432h".as_bytes())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_reject_zero_store_timeout() {
        let err = Config::from_reader("store_timeout: 0s".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_parse_config() {
        let data = r#"
monitor_interval: 2s
capture_interval: 30m
persist: true
db_path: /var/lib/netmeter/netmeter.db
interfaces:
  - eth0
log_level: debug
        "#;
        let conf = Config::from_reader(data.as_bytes()).unwrap();
        assert_eq!(conf.monitor_interval, Duration::from_secs(2));
        assert_eq!(conf.capture_interval, Duration::from_secs(30 * 60));
        assert_eq!(conf.store_timeout, Duration::from_secs(3));
        assert!(conf.persist);
        assert_eq!(conf.db_path, PathBuf::from("/var/lib/netmeter/netmeter.db"));
        assert_eq!(conf.interfaces, vec!["eth0".to_string()]);
        assert_eq!(conf.log_path, None);
        assert_eq!(conf.log_level, "debug");
    }

    #[test]
    fn test_defaults() {
        let conf = Config::from_reader("persist: false".as_bytes()).unwrap();
        assert_eq!(conf, Config::default());
    }

    #[test]
    fn test_reject_zero_interval() {
        let err = Config::from_reader("monitor_interval: 0s".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_reject_unknown_log_level() {
        let err = Config::from_reader("log_level: loud".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
