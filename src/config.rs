//! Summary configuration
//!
//! Every time constant and limit used by the scorer, aggregator and batch
//! driver lives here so callers can inject their own values (and their own
//! "now") instead of relying on process-wide state.
//!
//! Durations are stored in JSON as fractional hours.

use crate::error::SummaryError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default number of source ids processed per batch
pub const DEFAULT_BATCH_LIMIT: usize = 100;

/// Default minimum number of entries needed to score activity
pub const DEFAULT_MIN_ENTRY_COUNT: usize = 20;

/// Longest duration accepted anywhere in the configuration (100 years)
pub const MAX_DURATION_HOURS: i64 = 876_600;

/// Enrichment was rolled out on 2023-09-29; earlier entries never carry a marker
const ENRICHMENT_START_UNIX: i64 = 1_695_945_600;

/// Parameters of the activity scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Fewer entries than this score 0
    pub min_entry_count: usize,
    /// Sources silent for longer than this score 0
    #[serde(rename = "max_inactive_interval_hours", with = "hours")]
    pub max_inactive_interval: Duration,
    /// History shorter than this (first to last entry) scores 0
    #[serde(rename = "min_history_span_hours", with = "hours")]
    pub min_history_span: Duration,
    /// Lower bound of the recent verification window
    #[serde(rename = "min_verify_period_hours", with = "hours")]
    pub min_verify_period: Duration,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            min_entry_count: DEFAULT_MIN_ENTRY_COUNT,
            max_inactive_interval: Duration::days(30),
            min_history_span: Duration::hours(24),
            min_verify_period: Duration::days(7),
        }
    }
}

/// Configuration of a summary run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Maximum number of source ids processed per batch
    pub batch_limit: usize,
    /// Enrichment ratio never looks before this instant
    pub enrichment_start: DateTime<Utc>,
    /// Length of the enrichment evaluation window ending at "now"
    #[serde(rename = "enrichment_eval_period_hours", with = "hours")]
    pub enrichment_eval_period: Duration,
    /// A processing source not updated for longer than this is stalled
    #[serde(rename = "stall_threshold_hours", with = "hours")]
    pub stall_threshold: Duration,
    pub activity: ActivityConfig,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            enrichment_start: DateTime::<Utc>::from_timestamp(ENRICHMENT_START_UNIX, 0)
                .unwrap_or_default(),
            enrichment_eval_period: Duration::days(30),
            stall_threshold: Duration::hours(24),
            activity: ActivityConfig::default(),
        }
    }
}

impl SummaryConfig {
    /// Parse and validate configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, SummaryError> {
        let config: SummaryConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, SummaryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, SummaryError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check limits and durations
    pub fn validate(&self) -> Result<(), SummaryError> {
        if self.batch_limit == 0 {
            return Err(SummaryError::InvalidConfig(
                "batch_limit must be greater than 0".to_string(),
            ));
        }
        if self.activity.min_entry_count == 0 {
            return Err(SummaryError::InvalidConfig(
                "activity.min_entry_count must be greater than 0".to_string(),
            ));
        }

        let durations = [
            ("enrichment_eval_period_hours", self.enrichment_eval_period),
            ("stall_threshold_hours", self.stall_threshold),
            (
                "activity.max_inactive_interval_hours",
                self.activity.max_inactive_interval,
            ),
            (
                "activity.min_history_span_hours",
                self.activity.min_history_span,
            ),
            (
                "activity.min_verify_period_hours",
                self.activity.min_verify_period,
            ),
        ];
        let max = Duration::hours(MAX_DURATION_HOURS);
        for (name, value) in durations {
            if value <= Duration::zero() {
                return Err(SummaryError::InvalidConfig(format!(
                    "{} must be positive",
                    name
                )));
            }
            if value > max {
                return Err(SummaryError::InvalidConfig(format!(
                    "{} must not exceed {} hours",
                    name, MAX_DURATION_HOURS
                )));
            }
        }

        Ok(())
    }

    /// Start of the enrichment evaluation window for a run at `now`
    pub fn enrichment_window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.enrichment_eval_period)
            .map_or(self.enrichment_start, |start| self.enrichment_start.max(start))
    }
}

/// Serialize a duration as fractional hours
mod hours {
    use super::MAX_DURATION_HOURS;
    use chrono::Duration;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    const MILLIS_PER_HOUR: f64 = 3_600_000.0;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.num_milliseconds() as f64 / MILLIS_PER_HOUR)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let hours = f64::deserialize(deserializer)?;
        if !hours.is_finite() {
            return Err(D::Error::custom("duration hours must be finite"));
        }
        // Bound before converting; chrono panics on out-of-range milliseconds
        if hours.abs() > MAX_DURATION_HOURS as f64 {
            return Err(D::Error::custom(format!(
                "duration hours must be within +/-{}",
                MAX_DURATION_HOURS
            )));
        }
        Ok(Duration::milliseconds((hours * MILLIS_PER_HOUR).round() as i64))
    }
}
