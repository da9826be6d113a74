//! Timing utilities for benchmark runs
//!
//! Wall-clock timestamps are recorded for exported documents while elapsed
//! time is measured with a monotonic clock.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Start and end of one benchmark execution
#[derive(Debug, Clone, Copy)]
pub struct RunWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Stopwatch that produces a [`RunWindow`]
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    start: DateTime<Utc>,
    instant: Instant,
}

impl RunClock {
    /// Start timing now
    pub fn start() -> Self {
        Self {
            start: Utc::now(),
            instant: Instant::now(),
        }
    }

    /// Stop timing and return the window
    pub fn stop(self) -> RunWindow {
        RunWindow {
            start: self.start,
            end: Utc::now(),
            elapsed: self.instant.elapsed(),
        }
    }
}

impl RunWindow {
    /// Window of a run that happened elsewhere, e.g. a replayed transcript
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            start: instant,
            end: instant,
            elapsed: Duration::ZERO,
        }
    }
}

/// Current time as seconds since the Unix epoch
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
