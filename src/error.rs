use std::fmt;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Which of the two window lists a configuration error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Burst,
    Output,
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Burst => "burst",
            Self::Output => "output",
        })
    }
}

/// Invalid startup configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse duration {input:?}: {source}")]
    Duration {
        input: String,
        source: humantime::DurationError,
    },

    #[error("interval must be positive")]
    ZeroInterval,

    #[error("at least one {0} window is required")]
    NoWindows(WindowKind),

    #[error("{0} windows must be positive")]
    ZeroWindow(WindowKind),

    #[error("{kind} window {window:?} is not a multiple of the interval {interval:?}")]
    NotMultiple {
        kind: WindowKind,
        window: Duration,
        interval: Duration,
    },

    #[error("{kind} window {window:?} is configured more than once")]
    Duplicate { kind: WindowKind, window: Duration },

    #[error("invalid metric prefix {0:?}")]
    InvalidPrefix(String),
}

/// Failure to obtain one tick's counters. The tick is skipped.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed line {line}: {reason}")]
    Malformed { line: usize, reason: &'static str },

    #[error("could not parse {field} bytes of {iface}: {source}")]
    Counter {
        iface: String,
        field: &'static str,
        source: ParseIntError,
    },
}
