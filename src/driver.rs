//! Batch orchestration
//!
//! Builds one summary row per listed source id, up to the configured batch
//! limit, and writes all rows back in a single upsert. A failure for one source
//! never aborts the batch: the source still gets a row, carrying whatever
//! was computed before the failure.

use crate::aggregator::{AggregateOutcome, SourceAggregator};
use crate::config::SummaryConfig;
use crate::error::SummaryError;
use crate::store::{EntryRepository, SourceLister, SourceRepository, SummaryStore};
use crate::types::{SourceSummary, SummaryData};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters of one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Distinct source ids returned by the lister
    pub listed: usize,
    /// Source ids that produced a row
    pub processed: usize,
    /// Rows produced from a partial aggregation
    pub degraded: usize,
    /// Source ids beyond the batch limit
    pub skipped: usize,
}

/// Rows built by a batch, not yet written
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub rows: Vec<SourceSummary>,
    pub report: BatchReport,
}

/// Sequential batch driver
#[derive(Debug, Clone, Default)]
pub struct BatchDriver {
    aggregator: SourceAggregator,
}

impl BatchDriver {
    pub fn new(config: SummaryConfig) -> Self {
        Self {
            aggregator: SourceAggregator::new(config),
        }
    }

    /// Build rows from `store` and upsert them back into it
    pub fn run<S>(&self, store: &mut S, now: DateTime<Utc>) -> Result<BatchReport, SummaryError>
    where
        S: SourceLister + SourceRepository + EntryRepository + SummaryStore,
    {
        let output = self.collect(&*store, now)?;
        store.upsert_batch(output.rows).map_err(into_store_error)?;

        tracing::info!(
            listed = output.report.listed,
            processed = output.report.processed,
            degraded = output.report.degraded,
            skipped = output.report.skipped,
            "source summaries written"
        );

        Ok(output.report)
    }

    /// Build one row per source id without writing anything
    ///
    /// Fails only when the source ids cannot be listed.
    pub fn collect<R>(&self, repo: &R, now: DateTime<Utc>) -> Result<BatchOutput, SummaryError>
    where
        R: SourceLister + SourceRepository + EntryRepository + ?Sized,
    {
        let source_ids = repo.distinct_source_ids().map_err(into_listing_error)?;
        let limit = self.aggregator.config().batch_limit;

        let mut report = BatchReport {
            listed: source_ids.len(),
            skipped: source_ids.len().saturating_sub(limit),
            ..Default::default()
        };

        tracing::info!(
            listed = report.listed,
            limit,
            %now,
            "building source summaries"
        );

        let mut rows = Vec::with_capacity(source_ids.len().min(limit));

        for source_id in source_ids.iter().take(limit) {
            let outcome = self.summarize_source(repo, source_id, now);

            match outcome.reason() {
                Some(reason) => {
                    report.degraded += 1;
                    tracing::warn!(
                        source_id = %source_id,
                        reason = %reason,
                        "emitting degraded summary"
                    );
                }
                None => {
                    tracing::debug!(source_id = %source_id, "summary complete");
                }
            }

            rows.push(SourceSummary::new(
                source_id.as_str(),
                outcome.into_summary(),
                now,
            ));
            report.processed += 1;
        }

        Ok(BatchOutput { rows, report })
    }

    /// Fetch the records of one source and aggregate them
    ///
    /// Entries are only fetched for enabled sources.
    pub fn summarize_source<R>(
        &self,
        repo: &R,
        source_id: &str,
        now: DateTime<Utc>,
    ) -> AggregateOutcome
    where
        R: SourceRepository + EntryRepository + ?Sized,
    {
        let sources = match repo.sources_for(source_id) {
            Ok(sources) => sources,
            Err(e) => {
                return AggregateOutcome::Partial {
                    summary: SummaryData::default(),
                    reason: into_fetch_error(source_id, e),
                };
            }
        };

        if sources.is_empty() {
            return self.aggregator.aggregate(source_id, &sources, &[], now);
        }

        let summary = self.aggregator.source_flags(&sources, now);
        if !summary.enabled {
            return AggregateOutcome::Complete(summary);
        }

        match repo.eligible_entries(source_id) {
            Ok(entries) => self.aggregator.complete(source_id, summary, &entries, now),
            Err(e) => AggregateOutcome::Partial {
                summary,
                reason: into_fetch_error(source_id, e),
            },
        }
    }
}

fn into_fetch_error(source_id: &str, e: SummaryError) -> SummaryError {
    match e {
        SummaryError::Fetch { .. } => e,
        other => SummaryError::Fetch {
            source_id: source_id.to_string(),
            message: other.to_string(),
        },
    }
}

fn into_listing_error(e: SummaryError) -> SummaryError {
    match e {
        SummaryError::Listing(_) => e,
        other => SummaryError::Listing(other.to_string()),
    }
}

fn into_store_error(e: SummaryError) -> SummaryError {
    match e {
        SummaryError::Store(_) => e,
        other => SummaryError::Store(other.to_string()),
    }
}
