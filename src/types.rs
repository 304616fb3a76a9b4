//! Core types for source summaries
//!
//! This module defines the records read from the ingestion log (source
//! registrations and content entries) and the summary rows produced from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processing status of a source registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Processing,
    Paused,
    Disabled,
    /// Any status this crate does not interpret
    #[serde(untagged)]
    Other(String),
}

/// Processing status of an ingested entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Processing,
    Completed,
    Rejected,
    #[serde(untagged)]
    Other(String),
}

/// Why an entry was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Below the engagement threshold; excluded from summaries entirely
    LowEngagement,
    /// Processing failed
    GenericError,
    #[serde(untagged)]
    Other(String),
}

/// One physical registration of a logical source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: Uuid,
    #[serde(default)]
    pub engine_id: String,
    pub source_id: String,
    #[serde(default)]
    pub url: String,
    pub status: SourceStatus,
    /// Processing options blob, see [`crate::aggregator::engagement_threshold`]
    #[serde(default)]
    pub options: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Marker left on an entry by the enrichment step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enriched {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrich_id: Option<String>,
}

/// Entry metadata in the context of the ingestion system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    /// Initiator of scraping: internal, community, squad
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    /// 0 for a first submission, >0 for reposts
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched: Option<Enriched>,
}

/// One ingested content item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: Uuid,
    pub source_id: String,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
    #[serde(default)]
    pub metadata: EntryMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntryRecord {
    pub fn is_completed(&self) -> bool {
        self.status == EntryStatus::Completed
    }

    pub fn has_reject_reason(&self, reason: &RejectReason) -> bool {
        self.reject_reason.as_ref() == Some(reason)
    }
}

/// Health summary for one logical source
///
/// Every field has a zero value meaning "no data"; a summary is never partially
/// null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryData {
    /// Number of registrations sharing the source id
    pub source_count: u64,
    /// At least one registration is processing
    pub enabled: bool,
    /// Processing, but not updated within the stall threshold
    pub stalled_processing: bool,
    /// At least one registration has an engagement threshold configured
    pub engagement_check: bool,
    /// Earliest registration time
    pub added_at: DateTime<Utc>,
    /// Entries excluding low-engagement rejects
    pub entry_count: u64,
    pub completed_count: u64,
    pub error_count: u64,
    pub days_since_last_entry: f64,
    /// First-submission completed entries per day, two decimals
    #[serde(rename = "avg_entries_day")]
    pub avg_entries_per_day: f64,
    /// Historical to recent posting interval ratio; unbounded above
    pub activity: f64,
    /// Share of recently completed entries that carry an enrichment marker
    #[serde(rename = "llm_enriched")]
    pub enriched_ratio: f64,
}

impl Default for SummaryData {
    fn default() -> Self {
        Self {
            source_count: 0,
            enabled: false,
            stalled_processing: false,
            engagement_check: false,
            added_at: DateTime::<Utc>::default(),
            entry_count: 0,
            completed_count: 0,
            error_count: 0,
            days_since_last_entry: 0.0,
            avg_entries_per_day: 0.0,
            activity: 0.0,
            enriched_ratio: 0.0,
        }
    }
}

/// Write-back row, keyed by source id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source_id: String,
    pub summary: SummaryData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceSummary {
    pub fn new(source_id: impl Into<String>, summary: SummaryData, now: DateTime<Utc>) -> Self {
        Self {
            source_id: source_id.into(),
            summary,
            created_at: now,
            updated_at: now,
        }
    }
}
