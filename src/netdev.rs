//! Cumulative traffic counters from `/proc/net/dev`.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::info;

use crate::error::SampleError;
use crate::metrics::Counters;

/// Typical wide area network interface names.
///
/// See systemd's predictable network interface naming scheme.
pub const IFACE_PATTERN: &str = r"^(eth\d+|en[osp]\d+\S+|enx\S+|w[lw]\S+)$";

/// 1-indexed; the first two lines are column headers.
const FIRST_LINE: usize = 3;

/// 0-indexed, counted after the `iface:` prefix.
const RECV_FIELD: usize = 0;
const TRNS_FIELD: usize = 8;

const IFACE_LIST_DELIM: &str = ", ";

/// Source of one tick's cumulative counters.
pub trait Sampler: Send {
    fn sample(&mut self) -> Result<Counters, SampleError>;
}

/// Sums the byte counters of every interface matching a pattern.
#[derive(Debug)]
pub struct NetDev {
    path: PathBuf,
    matcher: Regex,
    contents: String,
    ifaces: String,
    prev_ifaces: Option<String>,
}

impl NetDev {
    /// Reads `<host_proc>/net/dev`.
    pub fn new(host_proc: impl AsRef<Path>, matcher: Regex) -> Self {
        Self {
            path: host_proc.as_ref().join("net/dev"),
            matcher,
            contents: String::with_capacity(4096),
            ifaces: String::new(),
            prev_ifaces: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&mut self) -> Result<(), SampleError> {
        self.contents.clear();
        File::open(&self.path)
            .and_then(|mut file| file.read_to_string(&mut self.contents))
            .map(drop)
            .map_err(|source| SampleError::Read {
                path: self.path.clone(),
                source,
            })
    }

    fn log_iface_change(&mut self) {
        if self.prev_ifaces.as_deref() == Some(self.ifaces.as_str()) {
            self.ifaces.clear();
            return;
        }
        if self.ifaces.is_empty() {
            info!(pattern = %self.matcher, "no interfaces matched");
        } else {
            info!(interfaces = %self.ifaces, "matched interfaces");
        }
        let mut prev = self.prev_ifaces.take().unwrap_or_default();
        std::mem::swap(&mut prev, &mut self.ifaces);
        self.prev_ifaces = Some(prev);
        self.ifaces.clear();
    }
}

impl Sampler for NetDev {
    fn sample(&mut self) -> Result<Counters, SampleError> {
        self.read()?;
        let counters = parse(&self.contents, &self.matcher, &mut self.ifaces)?;
        self.log_iface_change();
        Ok(counters)
    }
}

/// Parses `/proc/net/dev` contents, appending matched interface names to `ifaces`.
fn parse(data: &str, matcher: &Regex, ifaces: &mut String) -> Result<Counters, SampleError> {
    ifaces.clear();
    let mut counters = Counters::default();

    for (index, line) in data.lines().enumerate() {
        let line_no = index + 1;
        if line_no < FIRST_LINE || line.trim().is_empty() {
            continue;
        }

        let (iface, stats) = line.split_once(':').ok_or(SampleError::Malformed {
            line: line_no,
            reason: "missing interface separator",
        })?;
        let iface = iface.trim();
        if !matcher.is_match(iface) {
            continue;
        }

        let mut fields = stats.split_whitespace();
        let recv = fields.nth(RECV_FIELD);
        let trns = fields.nth(TRNS_FIELD - RECV_FIELD - 1);
        let (Some(recv), Some(trns)) = (recv, trns) else {
            return Err(SampleError::Malformed {
                line: line_no,
                reason: "too few fields",
            });
        };

        counters.recv = counters.recv.saturating_add(parse_counter(iface, "received", recv)?);
        counters.trns = counters.trns.saturating_add(parse_counter(iface, "transmitted", trns)?);

        if !ifaces.is_empty() {
            ifaces.push_str(IFACE_LIST_DELIM);
        }
        ifaces.push_str(iface);
    }

    Ok(counters)
}

fn parse_counter(iface: &str, field: &'static str, text: &str) -> Result<i64, SampleError> {
    text.parse().map_err(|source| SampleError::Counter {
        iface: iface.to_string(),
        field,
        source,
    })
}
