//! Activity scoring
//!
//! Compares the long-run average posting interval of a source with the
//! average interval over a recent verification window:
//!
//! ```text
//! avg_interval   = (last - first) / (count - 1)
//! verify_period  = max(avg_interval * min_entry_count, min_verify_period)
//! verify_count   = entries created after now - verify_period
//! activity       = avg_interval / (verify_period / verify_count)
//! ```
//!
//! A score above 1 means the source currently posts faster than its
//! historical pace, below 1 slower. The score is not clamped.

use crate::config::ActivityConfig;
use crate::types::EntryRecord;
use chrono::{DateTime, Duration, Utc};

/// Intermediate values of one scoring run
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityBreakdown {
    pub entry_count: usize,
    pub history_span: Duration,
    pub avg_interval: Duration,
    pub verify_period: Duration,
    pub verify_count: usize,
    pub score: f64,
}

/// Cadence scorer for one source's entries
#[derive(Debug, Clone, Default)]
pub struct ActivityScorer {
    config: ActivityConfig,
}

impl ActivityScorer {
    pub fn new(config: ActivityConfig) -> Self {
        Self { config }
    }

    /// Score entries in any order against `now`
    ///
    /// Returns 0 when there are too few entries, the source went quiet, the
    /// whole history fits in less than the minimum span, or nothing was
    /// posted within the verification window.
    pub fn score(&self, entries: &[EntryRecord], now: DateTime<Utc>) -> f64 {
        self.evaluate(entries, now)
            .map(|breakdown| breakdown.score)
            .unwrap_or(0.0)
    }

    /// Like [`score`](Self::score) but keeps the intermediate values
    ///
    /// `None` covers every early exit that scores 0 before the verification
    /// window is examined.
    pub fn evaluate(
        &self,
        entries: &[EntryRecord],
        now: DateTime<Utc>,
    ) -> Option<ActivityBreakdown> {
        let entry_count = entries.len();
        let min_entry_count = self.config.min_entry_count;

        if entry_count < min_entry_count || entry_count < 2 {
            return None;
        }

        let mut created: Vec<DateTime<Utc>> = entries.iter().map(|e| e.created_at).collect();
        created.sort_unstable();

        let first = created[0];
        let last = created[entry_count - 1];

        if now - last > self.config.max_inactive_interval {
            return None;
        }

        let history_span = last - first;
        if history_span < self.config.min_history_span {
            return None;
        }

        let span_nanos = nanos(history_span);
        let avg_nanos = span_nanos / (entry_count as i64 - 1);
        let verify_nanos = avg_nanos
            .saturating_mul(min_entry_count as i64)
            .max(nanos(self.config.min_verify_period));

        let verify_period = Duration::nanoseconds(verify_nanos);
        let verify_start = now - verify_period;

        let first_recent = created.partition_point(|t| *t <= verify_start);
        let verify_count = entry_count - first_recent;

        let avg_interval = Duration::nanoseconds(avg_nanos);

        if verify_count == 0 {
            tracing::debug!(
                source_id = %entries[0].source_id,
                entry_count,
                avg_interval_hours = avg_interval.num_seconds() as f64 / 3600.0,
                history_span_days = history_span.num_seconds() as f64 / 86_400.0,
                verify_period_days = verify_period.num_seconds() as f64 / 86_400.0,
                "no entries in activity verification window"
            );
            return Some(ActivityBreakdown {
                entry_count,
                history_span,
                avg_interval,
                verify_period,
                verify_count,
                score: 0.0,
            });
        }

        let verify_interval_nanos = verify_nanos / verify_count as i64;
        let score = if verify_interval_nanos > 0 {
            avg_nanos as f64 / verify_interval_nanos as f64
        } else {
            0.0
        };

        Some(ActivityBreakdown {
            entry_count,
            history_span,
            avg_interval,
            verify_period,
            verify_count,
            score,
        })
    }
}

fn nanos(d: Duration) -> i64 {
    d.num_nanoseconds().unwrap_or(i64::MAX)
}
