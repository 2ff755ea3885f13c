//! Command-line and environment configuration.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use regex::Regex;

use crate::error::ConfigError;
use crate::metrics::{EngineConfig, DEFAULT_PREFIX};
use crate::netdev::IFACE_PATTERN;

/// Parse a single duration such as `500ms`, `1s` or `1m`.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    humantime::parse_duration(s).map_err(|source| ConfigError::Duration {
        input: s.to_string(),
        source,
    })
}

/// Comma-separated list of durations, e.g. `1s, 5s`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationList(pub Vec<Duration>);

impl FromStr for DurationList {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',').map(parse_duration).collect::<Result<_, _>>().map(Self)
    }
}

impl fmt::Display for DurationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", humantime::format_duration(*d))?;
        }
        Ok(())
    }
}

/// netexp is a Prometheus exporter that provides advanced network usage metrics.
#[derive(Parser, Debug, Clone)]
#[command(name = "netexp", version)]
pub struct Args {
    /// Address to listen on
    #[arg(short, long, env = "NETEXP_LISTEN", default_value = "0.0.0.0:9298")]
    pub listen: SocketAddr,

    /// Regexp matching the network interfaces to sum
    #[arg(long, env = "NETEXP_IFACE_REGEXP", default_value = IFACE_PATTERN)]
    pub iface_regexp: Regex,

    /// Polling interval (e.g. 500ms, 1s)
    #[arg(short, long, env = "NETEXP_INTERVAL", default_value = "1s", value_parser = parse_duration)]
    pub interval: Duration,

    /// Comma-separated burst window durations
    #[arg(long, env = "NETEXP_BURST_WINDOWS", default_value = "1s,5s")]
    pub burst_windows: DurationList,

    /// Comma-separated output window durations
    #[arg(long, env = "NETEXP_OUTPUT_WINDOWS", default_value = "15s,30s,60s")]
    pub output_windows: DurationList,

    /// Root of the proc filesystem to read counters from
    #[arg(long, env = "HOST_PROC", default_value = "/proc")]
    pub host_proc: PathBuf,
}

impl Args {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            prefix: DEFAULT_PREFIX.to_string(),
            interval: self.interval,
            burst_windows: self.burst_windows.0.clone(),
            output_windows: self.output_windows.0.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["netexp"]).unwrap();
        assert_eq!(args.listen, "0.0.0.0:9298".parse::<SocketAddr>().unwrap());
        assert_eq!(args.interval, SEC);
        assert_eq!(args.burst_windows.0, vec![SEC, 5 * SEC]);
        assert_eq!(args.output_windows.0, vec![15 * SEC, 30 * SEC, 60 * SEC]);
        assert_eq!(args.iface_regexp.as_str(), IFACE_PATTERN);
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "netexp",
            "--listen",
            "127.0.0.1:9000",
            "--interval",
            "500ms",
            "--burst-windows",
            "500ms, 2s",
            "--output-windows",
            "1m",
            "--host-proc",
            "/host/proc",
        ])
        .unwrap();

        assert_eq!(args.listen.port(), 9000);
        assert_eq!(args.interval, Duration::from_millis(500));
        assert_eq!(args.host_proc, PathBuf::from("/host/proc"));

        let config = args.engine_config();
        assert_eq!(config.burst_windows, vec![Duration::from_millis(500), 2 * SEC]);
        assert_eq!(config.output_windows, vec![60 * SEC]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_duration() {
        assert!(Args::try_parse_from(["netexp", "--burst-windows", "1s,fast"]).is_err());
        assert!(Args::try_parse_from(["netexp", "--interval", ""]).is_err());
    }

    #[test]
    fn test_rejects_bad_regexp() {
        assert!(Args::try_parse_from(["netexp", "--iface-regexp", "(eth"]).is_err());
    }

    #[test]
    fn test_duration_list_display() {
        let list: DurationList = "1s,1m".parse().unwrap();
        assert_eq!(list.to_string(), "1s,1m");
    }
}
