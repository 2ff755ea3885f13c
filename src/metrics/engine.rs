use std::io::Write;
use std::time::Duration;

use tracing::warn;

use super::series::Series;
use crate::error::{ConfigError, WindowKind};

/// Default metric name prefix.
pub const DEFAULT_PREFIX: &str = "netexp";

/// Windows the engine aggregates over.
///
/// A burst window of 5s with an output window of 60s yields the metric
/// "the maximum 5 second burst rate over the last 60 seconds".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub prefix: String,
    pub interval: Duration,
    pub burst_windows: Vec<Duration>,
    pub output_windows: Vec<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            interval: Duration::from_secs(1),
            burst_windows: vec![Duration::from_secs(1), Duration::from_secs(5)],
            output_windows: vec![
                Duration::from_secs(15),
                Duration::from_secs(30),
                Duration::from_secs(60),
            ],
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_metric_name(&self.prefix) {
            return Err(ConfigError::InvalidPrefix(self.prefix.clone()));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        validate_windows(WindowKind::Burst, &self.burst_windows, self.interval)?;
        validate_windows(WindowKind::Output, &self.output_windows, self.interval)?;
        Ok(())
    }
}

fn validate_windows(
    kind: WindowKind,
    windows: &[Duration],
    interval: Duration,
) -> Result<(), ConfigError> {
    if windows.is_empty() {
        return Err(ConfigError::NoWindows(kind));
    }
    for (i, &window) in windows.iter().enumerate() {
        if window.is_zero() {
            return Err(ConfigError::ZeroWindow(kind));
        }
        if window.as_nanos() % interval.as_nanos() != 0 {
            return Err(ConfigError::NotMultiple {
                kind,
                window,
                interval,
            });
        }
        if windows[..i].contains(&window) {
            return Err(ConfigError::Duplicate { kind, window });
        }
    }
    Ok(())
}

fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Renders a window as it appears in metric names: `1s`, `500ms`, `250us`.
pub fn duration_label(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else if d.as_nanos() % 1_000_000 == 0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{}us", d.as_micros())
    }
}

/// One tick's cumulative byte counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub recv: i64,
    pub trns: i64,
}

/// Burst rates computed over one burst window.
#[derive(Debug)]
struct Burst {
    window: Duration,
    label: String,
    recv: Series,
    trns: Series,
}

#[derive(Debug)]
struct OutputWindow {
    window: Duration,
    label: String,
}

/// Turns cumulative counters into "maximum burst rate over a window" metrics.
///
/// Owned and stepped by the single collector task; needs no synchronization.
#[derive(Debug)]
pub struct Engine {
    prefix: String,
    interval: Duration,
    recv: Series,
    trns: Series,
    bursts: Vec<Burst>,
    outputs: Vec<OutputWindow>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let interval = config.interval;

        // validate() guarantees at least one output window.
        let history = config
            .output_windows
            .iter()
            .copied()
            .max()
            .ok_or(ConfigError::NoWindows(WindowKind::Output))?;

        let bursts = config
            .burst_windows
            .iter()
            .map(|&window| {
                if window > history {
                    warn!(
                        burst_window = %duration_label(window),
                        history = %duration_label(history),
                        "burst window exceeds the longest output window and will never be reported"
                    );
                }
                Burst {
                    window,
                    label: duration_label(window),
                    recv: Series::new(interval, history),
                    trns: Series::new(interval, history),
                }
            })
            .collect();

        let outputs = config
            .output_windows
            .iter()
            .map(|&window| OutputWindow {
                window,
                label: duration_label(window),
            })
            .collect();

        Ok(Self {
            prefix: config.prefix,
            interval,
            recv: Series::new(interval, history),
            trns: Series::new(interval, history),
            bursts,
            outputs,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Feeds one tick's counters and appends the rendered snapshot to `out`.
    ///
    /// Every line is `name value\n`. Burst lines are missing until enough
    /// history has accumulated; the raw counter lines are always present.
    pub fn step(&mut self, counters: Counters, out: &mut Vec<u8>) {
        self.recv.put(counters.recv);
        self.trns.put(counters.trns);

        for burst in &mut self.bursts {
            if let Some(rate) = self.recv.rate(burst.window) {
                burst.recv.put(rate);
            }
            if let Some(rate) = self.trns.rate(burst.window) {
                burst.trns.put(rate);
            }
        }

        let prefix = &self.prefix;
        for burst in &self.bursts {
            for output in &self.outputs {
                for (direction, series) in [("recv", &burst.recv), ("trns", &burst.trns)] {
                    if let Some(max) = series.max(output.window) {
                        line(
                            out,
                            format_args!(
                                "{prefix}_max_{}_{direction}_burst_bps_over_{} {max}",
                                burst.label, output.label
                            ),
                        );
                    }
                }
            }
        }

        line(out, format_args!("{prefix}_recv_bytes {}", counters.recv));
        line(out, format_args!("{prefix}_trns_bytes {}", counters.trns));
    }
}

fn line(out: &mut Vec<u8>, args: std::fmt::Arguments<'_>) {
    // Writing into a Vec<u8> cannot fail.
    let _ = out.write_fmt(args);
    out.push(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    fn config(bursts: &[u64], outputs: &[u64]) -> EngineConfig {
        EngineConfig {
            prefix: DEFAULT_PREFIX.to_string(),
            interval: SEC,
            burst_windows: bursts.iter().map(|&s| Duration::from_secs(s)).collect(),
            output_windows: outputs.iter().map(|&s| Duration::from_secs(s)).collect(),
        }
    }

    fn step(engine: &mut Engine, recv: i64, trns: i64) -> Vec<String> {
        let mut out = Vec::new();
        engine.step(Counters { recv, trns }, &mut out);
        let text = String::from_utf8(out).unwrap();
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        lines.sort();
        lines
    }

    fn sorted(lines: &[&str]) -> Vec<String> {
        let mut lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        lines.sort();
        lines
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Engine::new(EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_first_step_renders_raw_counters_only() {
        let mut engine = Engine::new(config(&[1], &[5])).unwrap();
        let mut out = Vec::new();
        engine.step(Counters { recv: 10, trns: 12 }, &mut out);
        assert_eq!(out, b"netexp_recv_bytes 10\nnetexp_trns_bytes 12\n");
    }

    #[test]
    fn test_step_sequence() {
        let mut engine = Engine::new(config(&[1, 2], &[5, 10])).unwrap();
        let steps: &[(i64, i64, &[&str])] = &[
            (10, 10, &["netexp_recv_bytes 10", "netexp_trns_bytes 10"]),
            (20, 20, &["netexp_recv_bytes 20", "netexp_trns_bytes 20"]),
            (40, 38, &["netexp_recv_bytes 40", "netexp_trns_bytes 38"]),
            (50, 50, &["netexp_recv_bytes 50", "netexp_trns_bytes 50"]),
            (60, 60, &["netexp_recv_bytes 60", "netexp_trns_bytes 60"]),
            (
                70,
                70,
                &[
                    "netexp_recv_bytes 70",
                    "netexp_trns_bytes 70",
                    "netexp_max_1s_recv_burst_bps_over_5s 20",
                    "netexp_max_1s_trns_burst_bps_over_5s 18",
                ],
            ),
            (
                80,
                80,
                &[
                    "netexp_recv_bytes 80",
                    "netexp_trns_bytes 80",
                    "netexp_max_1s_recv_burst_bps_over_5s 20",
                    "netexp_max_1s_trns_burst_bps_over_5s 18",
                    "netexp_max_2s_recv_burst_bps_over_5s 15",
                    "netexp_max_2s_trns_burst_bps_over_5s 15",
                ],
            ),
            (
                82,
                85,
                &[
                    "netexp_recv_bytes 82",
                    "netexp_trns_bytes 85",
                    "netexp_max_1s_recv_burst_bps_over_5s 10",
                    "netexp_max_1s_trns_burst_bps_over_5s 12",
                    "netexp_max_2s_recv_burst_bps_over_5s 15",
                    "netexp_max_2s_trns_burst_bps_over_5s 15",
                ],
            ),
            (
                90,
                90,
                &[
                    "netexp_recv_bytes 90",
                    "netexp_trns_bytes 90",
                    "netexp_max_1s_recv_burst_bps_over_5s 10",
                    "netexp_max_1s_trns_burst_bps_over_5s 10",
                    "netexp_max_2s_recv_burst_bps_over_5s 10",
                    "netexp_max_2s_trns_burst_bps_over_5s 11",
                ],
            ),
            (
                115,
                120,
                &[
                    "netexp_recv_bytes 115",
                    "netexp_trns_bytes 120",
                    "netexp_max_1s_recv_burst_bps_over_5s 25",
                    "netexp_max_1s_trns_burst_bps_over_5s 30",
                    "netexp_max_2s_recv_burst_bps_over_5s 16",
                    "netexp_max_2s_trns_burst_bps_over_5s 17",
                ],
            ),
        ];

        for (i, &(recv, trns, want)) in steps.iter().enumerate() {
            assert_eq!(step(&mut engine, recv, trns), sorted(want), "step {i}");
        }
    }

    #[test]
    fn test_line_names_are_unique() {
        let mut engine = Engine::new(config(&[1, 2, 3], &[3, 4, 5])).unwrap();
        for i in 0..20 {
            let lines = step(&mut engine, i * 100, i * 50);
            let mut names: Vec<&str> = lines
                .iter()
                .map(|l| l.split_once(' ').unwrap().0)
                .collect();
            let total = names.len();
            names.dedup();
            assert_eq!(names.len(), total);
        }
    }

    #[test]
    fn test_counter_reset_yields_negative_rate() {
        let mut engine = Engine::new(config(&[1], &[1])).unwrap();
        step(&mut engine, 100, 100);
        let lines = step(&mut engine, 40, 100);
        assert!(lines.contains(&"netexp_max_1s_recv_burst_bps_over_1s -60".to_string()));
        assert!(lines.contains(&"netexp_max_1s_trns_burst_bps_over_1s 0".to_string()));
    }

    #[test]
    fn test_custom_prefix() {
        let mut engine = Engine::new(EngineConfig {
            prefix: "host_net".to_string(),
            ..config(&[1], &[5])
        })
        .unwrap();
        let lines = step(&mut engine, 1, 2);
        assert_eq!(lines, sorted(&["host_net_recv_bytes 1", "host_net_trns_bytes 2"]));
    }

    #[test]
    fn test_sub_second_labels() {
        let mut engine = Engine::new(EngineConfig {
            prefix: DEFAULT_PREFIX.to_string(),
            interval: Duration::from_millis(500),
            burst_windows: vec![Duration::from_millis(500)],
            output_windows: vec![Duration::from_millis(1500)],
        })
        .unwrap();
        for i in 0..4 {
            step(&mut engine, i * 100, i * 100);
        }
        let lines = step(&mut engine, 400, 400);
        assert!(lines.contains(&"netexp_max_500ms_recv_burst_bps_over_1500ms 200".to_string()));
    }

    #[test]
    fn test_duration_label() {
        assert_eq!(duration_label(Duration::from_secs(60)), "60s");
        assert_eq!(duration_label(Duration::from_millis(250)), "250ms");
        assert_eq!(duration_label(Duration::from_micros(1500)), "1500us");
    }

    #[test]
    fn test_validation_errors() {
        let zero_interval = EngineConfig {
            interval: Duration::ZERO,
            ..config(&[1], &[5])
        };
        assert!(matches!(
            Engine::new(zero_interval),
            Err(ConfigError::ZeroInterval)
        ));
        assert!(matches!(
            Engine::new(config(&[], &[5])),
            Err(ConfigError::NoWindows(WindowKind::Burst))
        ));
        assert!(matches!(
            Engine::new(config(&[1], &[])),
            Err(ConfigError::NoWindows(WindowKind::Output))
        ));
        assert!(matches!(
            Engine::new(config(&[0], &[5])),
            Err(ConfigError::ZeroWindow(WindowKind::Burst))
        ));
        assert!(matches!(
            Engine::new(config(&[1, 1], &[5])),
            Err(ConfigError::Duplicate {
                kind: WindowKind::Burst,
                ..
            })
        ));
        let uneven = EngineConfig {
            interval: 2 * SEC,
            ..config(&[2], &[5])
        };
        assert!(matches!(
            Engine::new(uneven),
            Err(ConfigError::NotMultiple {
                kind: WindowKind::Output,
                ..
            })
        ));
        let bad_prefix = EngineConfig {
            prefix: "9lives".to_string(),
            ..config(&[1], &[5])
        };
        assert!(matches!(
            Engine::new(bad_prefix),
            Err(ConfigError::InvalidPrefix(_))
        ));
    }
}
