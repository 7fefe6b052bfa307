//! Best-effort wall-clock instrumentation.

use std::time::{Duration, Instant};
use parking_lot::Mutex;

/// A labelled wall-clock interval
#[derive(Clone, Debug)]
pub struct Interval {
    pub label: &'static str,
    pub start: Instant,
    pub end: Instant,
}

impl Interval {
    pub fn duration(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}

/// Collects intervals recorded by a kernel
#[derive(Debug, Default)]
pub struct Profiler {
    intervals: Mutex<Vec<Interval>>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_interval(&self, label: &'static str, start: Instant, end: Instant) {
        self.intervals.lock().push(Interval { label, start, end });
    }

    /// Snapshot of every interval recorded so far
    pub fn intervals(&self) -> Vec<Interval> {
        self.intervals.lock().clone()
    }

    /// Sum of the durations recorded under `label`
    pub fn total(&self, label: &str) -> Duration {
        self.intervals
            .lock()
            .iter()
            .filter(|i| i.label == label)
            .map(Interval::duration)
            .sum()
    }
}
