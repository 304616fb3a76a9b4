//! Windowed success ratio
//!
//! Counts boolean outcomes whose timestamp falls strictly inside a time window
//! and reports the fraction that succeeded. Both window boundaries are
//! excluded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open time interval `(start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether `t` lies strictly between start and end
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start < t && t < self.end
    }
}

/// Running tally of outcomes inside a [`TimeWindow`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedRatio {
    window: TimeWindow,
    success_count: u64,
    total_count: u64,
}

impl WindowedRatio {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::with_window(TimeWindow::new(start, end))
    }

    pub fn with_window(window: TimeWindow) -> Self {
        Self {
            window,
            success_count: 0,
            total_count: 0,
        }
    }

    /// Record an outcome; ignored unless `t` falls inside the window
    pub fn add(&mut self, t: DateTime<Utc>, success: bool) {
        if self.window.contains(t) {
            self.total_count += 1;
            if success {
                self.success_count += 1;
            }
        }
    }

    /// Success fraction, 0 when nothing was counted
    pub fn value(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total_count as f64
    }

    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }
}
