//! Per-source aggregation
//!
//! Merges every registration of a logical source and its eligible entries
//! into one [`SummaryData`]. Registration flags are computed first; entry
//! metrics are only computed for enabled sources.
//!
//! Entries passed to the aggregator must be sorted ascending by `created_at`.
//! This is not checked: unsorted input silently yields wrong staleness and
//! per-day figures.

use crate::activity::ActivityScorer;
use crate::config::SummaryConfig;
use crate::error::SummaryError;
use crate::ratio::WindowedRatio;
use crate::types::{EntryRecord, RejectReason, SourceRecord, SourceStatus, SummaryData};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

const NANOS_PER_DAY: f64 = 86_400_000_000_000.0;

/// Result of aggregating one source
///
/// Both variants carry a summary row; `Partial` also records why the
/// computation stopped early.
#[derive(Debug)]
pub enum AggregateOutcome {
    Complete(SummaryData),
    Partial {
        summary: SummaryData,
        reason: SummaryError,
    },
}

impl AggregateOutcome {
    pub fn summary(&self) -> &SummaryData {
        match self {
            AggregateOutcome::Complete(summary) => summary,
            AggregateOutcome::Partial { summary, .. } => summary,
        }
    }

    pub fn reason(&self) -> Option<&SummaryError> {
        match self {
            AggregateOutcome::Complete(_) => None,
            AggregateOutcome::Partial { reason, .. } => Some(reason),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, AggregateOutcome::Complete(_))
    }

    pub fn into_summary(self) -> SummaryData {
        match self {
            AggregateOutcome::Complete(summary) => summary,
            AggregateOutcome::Partial { summary, .. } => summary,
        }
    }
}

/// Aggregator for logical sources
#[derive(Debug, Clone, Default)]
pub struct SourceAggregator {
    config: SummaryConfig,
    scorer: ActivityScorer,
}

impl SourceAggregator {
    pub fn new(config: SummaryConfig) -> Self {
        let scorer = ActivityScorer::new(config.activity.clone());
        Self { config, scorer }
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// Aggregate registrations and entries of one source
    pub fn aggregate(
        &self,
        source_id: &str,
        sources: &[SourceRecord],
        entries: &[EntryRecord],
        now: DateTime<Utc>,
    ) -> AggregateOutcome {
        if sources.is_empty() {
            return AggregateOutcome::Partial {
                summary: SummaryData::default(),
                reason: SummaryError::NoSourceRecords(source_id.to_string()),
            };
        }

        let summary = self.source_flags(sources, now);
        if !summary.enabled {
            return AggregateOutcome::Complete(summary);
        }

        self.complete(source_id, summary, entries, now)
    }

    /// Fill entry metrics into a summary that already carries its flags
    pub fn complete(
        &self,
        source_id: &str,
        mut summary: SummaryData,
        entries: &[EntryRecord],
        now: DateTime<Utc>,
    ) -> AggregateOutcome {
        match self.entry_metrics(source_id, &mut summary, entries, now) {
            Ok(()) => AggregateOutcome::Complete(summary),
            Err(reason) => AggregateOutcome::Partial { summary, reason },
        }
    }

    /// Registration count, first registration time and status flags
    pub fn source_flags(&self, sources: &[SourceRecord], now: DateTime<Utc>) -> SummaryData {
        let mut summary = SummaryData {
            source_count: sources.len() as u64,
            ..Default::default()
        };

        if let Some(added_at) = sources.iter().map(|s| s.created_at).min() {
            summary.added_at = added_at;
        }

        for source in sources {
            if source.status == SourceStatus::Processing {
                summary.enabled = true;

                if now - source.updated_at > self.config.stall_threshold {
                    summary.stalled_processing = true;
                }
            }

            let threshold = engagement_threshold(&source.options).unwrap_or_else(|e| {
                tracing::trace!(
                    source_id = %source.source_id,
                    error = %e,
                    "ignoring source options"
                );
                0
            });
            if threshold > 0 {
                summary.engagement_check = true;
            }
        }

        summary
    }

    /// Entry counts, staleness, cadence and enrichment ratio
    ///
    /// `entries` must be ascending by `created_at`. Fails with
    /// [`SummaryError::InsufficientData`] when there are none.
    pub fn entry_metrics(
        &self,
        source_id: &str,
        summary: &mut SummaryData,
        entries: &[EntryRecord],
        now: DateTime<Utc>,
    ) -> Result<(), SummaryError> {
        let last_entry = entries
            .last()
            .ok_or_else(|| SummaryError::InsufficientData(source_id.to_string()))?;

        summary.entry_count = entries.len() as u64;
        let last_activity = last_entry.created_at;
        summary.days_since_last_entry = days(now - last_activity);

        let mut enrichment = WindowedRatio::new(self.config.enrichment_window_start(now), now);
        let mut first_submissions = 0usize;

        for entry in entries {
            if entry.is_completed() {
                summary.completed_count += 1;

                // Reposts would inflate the posting rate
                if entry.metadata.order == 0 {
                    first_submissions += 1;
                }

                enrichment.add(entry.created_at, entry.metadata.enriched.is_some());
            }

            if entry.has_reject_reason(&RejectReason::GenericError) {
                summary.error_count += 1;
            }
        }

        let active_duration = last_activity - summary.added_at;
        if active_duration > Duration::zero() {
            summary.avg_entries_per_day =
                round_to_cents(first_submissions as f64 / days(active_duration));
        }

        if first_submissions > 0 {
            summary.activity = self.scorer.score(entries, now);
        }

        summary.enriched_ratio = enrichment.value();

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct EngagementOptions {
    #[serde(default)]
    engagement: EngagementSettings,
}

#[derive(Debug, Default, Deserialize)]
struct EngagementSettings {
    #[serde(default)]
    threshold: i64,
}

/// Engagement threshold configured in a source options blob
///
/// Reads `engagement.threshold`. A missing field (or null options) is 0; any
/// other shape is [`SummaryError::MalformedOptions`], which callers treat as 0.
pub fn engagement_threshold(options: &serde_json::Value) -> Result<i64, SummaryError> {
    if options.is_null() {
        return Ok(0);
    }

    let parsed = EngagementOptions::deserialize(options)
        .map_err(|e| SummaryError::MalformedOptions(e.to_string()))?;
    Ok(parsed.engagement.threshold)
}

fn days(d: Duration) -> f64 {
    match d.num_nanoseconds() {
        Some(nanos) => nanos as f64 / NANOS_PER_DAY,
        None => d.num_seconds() as f64 / 86_400.0,
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Enriched, EntryMetadata, EntryStatus};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn source(status: SourceStatus, created_ago: Duration, updated_ago: Duration) -> SourceRecord {
        SourceRecord {
            id: Uuid::new_v4(),
            engine_id: "rss".to_string(),
            source_id: "blog".to_string(),
            url: "https://example.com/feed".to_string(),
            status,
            options: serde_json::Value::Null,
            created_at: now() - created_ago,
            updated_at: now() - updated_ago,
        }
    }

    fn entry(created_ago: Duration, status: EntryStatus) -> EntryRecord {
        EntryRecord {
            id: Uuid::new_v4(),
            source_id: "blog".to_string(),
            status,
            reject_reason: None,
            metadata: EntryMetadata::default(),
            created_at: now() - created_ago,
            updated_at: now() - created_ago,
        }
    }

    fn enriched() -> Option<Enriched> {
        Some(Enriched {
            model: Some("summarizer".to_string()),
            enrich_id: None,
        })
    }

    #[test]
    fn test_engagement_threshold() {
        assert_eq!(
            engagement_threshold(&json!({"engagement": {"threshold": 15}})).unwrap(),
            15
        );
        assert_eq!(engagement_threshold(&json!({"other": true})).unwrap(), 0);
        assert_eq!(engagement_threshold(&json!({"engagement": {}})).unwrap(), 0);
        assert_eq!(engagement_threshold(&serde_json::Value::Null).unwrap(), 0);

        assert!(matches!(
            engagement_threshold(&json!("not an object")),
            Err(SummaryError::MalformedOptions(_))
        ));
        assert!(matches!(
            engagement_threshold(&json!({"engagement": {"threshold": "high"}})),
            Err(SummaryError::MalformedOptions(_))
        ));
    }

    #[test]
    fn test_stalled_detection() {
        let aggregator = SourceAggregator::default();

        let stale = source(SourceStatus::Processing, Duration::days(10), Duration::hours(25));
        let flags = aggregator.source_flags(&[stale], now());
        assert!(flags.enabled);
        assert!(flags.stalled_processing);

        let fresh = source(SourceStatus::Processing, Duration::days(10), Duration::hours(23));
        let flags = aggregator.source_flags(&[fresh], now());
        assert!(flags.enabled);
        assert!(!flags.stalled_processing);

        // Exactly at the threshold is not yet stalled
        let boundary = source(SourceStatus::Processing, Duration::days(10), Duration::hours(24));
        let flags = aggregator.source_flags(&[boundary], now());
        assert!(flags.enabled);
        assert!(!flags.stalled_processing);

        // Paused sources are never stalled
        let paused = source(SourceStatus::Paused, Duration::days(10), Duration::hours(100));
        let flags = aggregator.source_flags(&[paused], now());
        assert!(!flags.enabled);
        assert!(!flags.stalled_processing);
    }

    #[test]
    fn test_flags_merge_registrations() {
        let aggregator = SourceAggregator::default();

        let mut older = source(SourceStatus::Disabled, Duration::days(40), Duration::days(1));
        older.options = json!({"engagement": {"threshold": 3}});
        let mut newer = source(SourceStatus::Processing, Duration::days(5), Duration::hours(1));
        newer.options = json!("{broken");

        let flags = aggregator.source_flags(&[newer, older], now());
        assert_eq!(flags.source_count, 2);
        assert_eq!(flags.added_at, now() - Duration::days(40));
        assert!(flags.enabled);
        assert!(flags.engagement_check);
        assert!(!flags.stalled_processing);
    }

    #[test]
    fn test_disabled_source_skips_entries() {
        let aggregator = SourceAggregator::default();
        let sources = [source(SourceStatus::Disabled, Duration::days(10), Duration::days(2))];
        let entries = [entry(Duration::days(1), EntryStatus::Completed)];

        let outcome = aggregator.aggregate("blog", &sources, &entries, now());
        assert!(outcome.is_complete());

        let summary = outcome.into_summary();
        assert!(!summary.enabled);
        assert_eq!(summary.source_count, 1);
        assert_eq!(summary.entry_count, 0);
        assert_eq!(summary.completed_count, 0);
    }

    #[test]
    fn test_enabled_without_entries() {
        let aggregator = SourceAggregator::default();
        let sources = [source(SourceStatus::Processing, Duration::days(10), Duration::hours(30))];

        let outcome = aggregator.aggregate("blog", &sources, &[], now());
        assert!(matches!(
            outcome.reason(),
            Some(SummaryError::InsufficientData(id)) if id == "blog"
        ));

        let summary = outcome.into_summary();
        assert!(summary.enabled);
        assert!(summary.stalled_processing);
        assert_eq!(summary.source_count, 1);
        assert_eq!(summary.entry_count, 0);
        assert_eq!(summary.days_since_last_entry, 0.0);
        assert_eq!(summary.activity, 0.0);
    }

    #[test]
    fn test_no_source_records() {
        let aggregator = SourceAggregator::default();
        let outcome = aggregator.aggregate("ghost", &[], &[], now());

        assert!(matches!(
            outcome.reason(),
            Some(SummaryError::NoSourceRecords(_))
        ));
        assert_eq!(outcome.into_summary(), SummaryData::default());
    }

    #[test]
    fn test_entry_metrics() {
        let aggregator = SourceAggregator::default();
        let sources = [source(SourceStatus::Processing, Duration::days(10), Duration::hours(1))];

        let mut repost = entry(Duration::days(6), EntryStatus::Completed);
        repost.metadata.order = 1;
        repost.metadata.enriched = enriched();

        let mut failed = entry(Duration::days(5), EntryStatus::Rejected);
        failed.reject_reason = Some(RejectReason::GenericError);

        let mut first = entry(Duration::days(4), EntryStatus::Completed);
        first.metadata.enriched = enriched();

        let pending = entry(Duration::days(3), EntryStatus::Pending);
        let second = entry(Duration::days(2), EntryStatus::Completed);

        let entries = [repost, failed, first, pending, second];

        let outcome = aggregator.aggregate("blog", &sources, &entries, now());
        assert!(outcome.is_complete());
        let summary = outcome.into_summary();

        assert_eq!(summary.entry_count, 5);
        assert_eq!(summary.completed_count, 3);
        assert_eq!(summary.error_count, 1);
        assert!((summary.days_since_last_entry - 2.0).abs() < 1e-9);

        // Two first submissions over 8 days (added 10 days ago, last entry 2 days ago)
        assert_eq!(summary.avg_entries_per_day, 0.25);

        // Below the minimum entry count
        assert_eq!(summary.activity, 0.0);

        // Completed entries in the window: repost and first enriched, second not
        assert!((summary.enriched_ratio - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_enrichment_window_excludes_old_entries() {
        let aggregator = SourceAggregator::default();
        let sources = [source(SourceStatus::Processing, Duration::days(90), Duration::hours(1))];

        let mut old = entry(Duration::days(45), EntryStatus::Completed);
        old.metadata.enriched = enriched();
        let recent = entry(Duration::days(3), EntryStatus::Completed);

        let summary = aggregator
            .aggregate("blog", &sources, &[old, recent], now())
            .into_summary();

        assert_eq!(summary.completed_count, 2);
        assert_eq!(summary.enriched_ratio, 0.0);
    }

    #[test]
    fn test_avg_entries_rounding() {
        let aggregator = SourceAggregator::default();
        let sources = [source(SourceStatus::Processing, Duration::days(4), Duration::hours(1))];

        // One first submission over 3 days = 0.333...
        let entries = [entry(Duration::days(1), EntryStatus::Completed)];
        let summary = aggregator
            .aggregate("blog", &sources, &entries, now())
            .into_summary();

        assert_eq!(summary.avg_entries_per_day, 0.33);
    }

    #[test]
    fn test_non_positive_active_duration() {
        let aggregator = SourceAggregator::default();

        // Entry created before the registration
        let sources = [source(SourceStatus::Processing, Duration::days(2), Duration::hours(1))];
        let entries = [entry(Duration::days(3), EntryStatus::Completed)];

        let summary = aggregator
            .aggregate("blog", &sources, &entries, now())
            .into_summary();

        assert_eq!(summary.entry_count, 1);
        assert_eq!(summary.avg_entries_per_day, 0.0);
    }

    #[test]
    fn test_activity_only_with_first_submissions() {
        let aggregator = SourceAggregator::default();
        let sources = [source(SourceStatus::Processing, Duration::days(30), Duration::hours(1))];

        // 25 daily completed reposts ending yesterday: cadence would score,
        // but without first submissions activity stays 0
        let mut entries: Vec<EntryRecord> = (1..=25)
            .rev()
            .map(|n| {
                let mut e = entry(Duration::days(n), EntryStatus::Completed);
                e.metadata.order = 2;
                e
            })
            .collect();

        let summary = aggregator
            .aggregate("blog", &sources, &entries, now())
            .into_summary();
        assert_eq!(summary.activity, 0.0);
        assert_eq!(summary.avg_entries_per_day, 0.0);

        // One first submission is enough to score all entries
        entries[0].metadata.order = 0;
        let summary = aggregator
            .aggregate("blog", &sources, &entries, now())
            .into_summary();
        assert!((summary.activity - 0.95).abs() < 1e-9);
    }
}
