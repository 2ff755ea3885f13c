use std::time::Duration;

/// Fixed-capacity window of samples taken every `interval`.
///
/// Holds `window / interval + 1` samples, oldest first, newest last. Once full,
/// each `put` evicts the oldest sample. Backed by a ring buffer allocated once
/// at construction.
#[derive(Debug, Clone)]
pub struct Series {
    samples: Box<[i64]>,
    /// Position of the oldest sample.
    head: usize,
    len: usize,
    interval: Duration,
    window: Duration,
}

impl Series {
    /// # Panics
    ///
    /// Panics if `interval` or `window` is zero, or `window` is not a
    /// multiple of `interval`.
    pub fn new(interval: Duration, window: Duration) -> Self {
        assert!(!interval.is_zero(), "series: interval must be positive");
        assert!(!window.is_zero(), "series: window must be positive");
        assert!(
            window.as_nanos() % interval.as_nanos() == 0,
            "series: window {window:?} is not a multiple of interval {interval:?}"
        );
        let capacity = (window.as_nanos() / interval.as_nanos()) as usize + 1;
        Self {
            samples: vec![0; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
            interval,
            window,
        }
    }

    pub fn put(&mut self, sample: i64) {
        let capacity = self.capacity();
        if self.len < capacity {
            self.samples[(self.head + self.len) % capacity] = sample;
            self.len += 1;
        } else {
            self.samples[self.head] = sample;
            self.head = (self.head + 1) % capacity;
        }
    }

    /// Per-second rate of change over the last `d`, truncated toward zero.
    ///
    /// Only meaningful for cumulative series. `d` is floored to a whole number
    /// of intervals for the lookback, but the difference is divided by `d`
    /// itself. A decreasing counter gives a negative rate.
    /// Returns `None` until `d / interval + 1` samples are stored.
    ///
    /// # Panics
    ///
    /// Panics if `d` is shorter than the interval.
    pub fn rate(&self, d: Duration) -> Option<i64> {
        let intervals = self.intervals(d, "rate");
        if intervals >= self.len {
            return None;
        }
        let diff = self.newest(0).wrapping_sub(self.newest(intervals));
        Some((diff as f64 / d.as_secs_f64()) as i64)
    }

    /// Largest of the samples taken over the last `d` (`d / interval` samples).
    ///
    /// # Panics
    ///
    /// Panics if `d` is shorter than the interval.
    pub fn max(&self, d: Duration) -> Option<i64> {
        let count = self.intervals(d, "max");
        if count > self.len {
            return None;
        }
        (0..count).map(|back| self.newest(back)).max()
    }

    /// Stored samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = i64> + '_ {
        let capacity = self.capacity();
        (0..self.len).map(move |i| self.samples[(self.head + i) % capacity])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// The sample stored `back` places before the newest one.
    fn newest(&self, back: usize) -> i64 {
        let capacity = self.capacity();
        self.samples[(self.head + self.len - 1 - back) % capacity]
    }

    fn intervals(&self, d: Duration, op: &str) -> usize {
        assert!(
            d >= self.interval,
            "series: {op} over {d:?} is shorter than the interval {:?}",
            self.interval
        );
        (d.as_nanos() / self.interval.as_nanos()) as usize
    }
}
