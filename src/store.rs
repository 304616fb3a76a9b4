//! Record repositories and the summary store
//!
//! The batch driver only talks to the traits below. [`MemoryStore`]
//! implements all of them over records loaded from NDJSON or JSON arrays,
//! which is what the CLI and the tests use.

use crate::error::SummaryError;
use crate::types::{EntryRecord, RejectReason, SourceRecord, SourceSummary};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};

/// Lists every logical source id known to the system
pub trait SourceLister {
    fn distinct_source_ids(&self) -> Result<Vec<String>, SummaryError>;
}

/// Returns all registrations of one logical source
pub trait SourceRepository {
    fn sources_for(&self, source_id: &str) -> Result<Vec<SourceRecord>, SummaryError>;
}

/// Returns the entries of one source that count towards its summary
pub trait EntryRepository {
    /// Entries whose reject reason is not `low_engagement`, ascending by
    /// `created_at`
    fn eligible_entries(&self, source_id: &str) -> Result<Vec<EntryRecord>, SummaryError>;
}

/// Accepts summary rows in batches
pub trait SummaryStore {
    /// Insert rows, or on a source id conflict replace `summary` and
    /// `updated_at` while keeping the stored `created_at`
    fn upsert_batch(&mut self, rows: Vec<SourceSummary>) -> Result<(), SummaryError>;
}

/// In-memory implementation of every repository
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sources: Vec<SourceRecord>,
    entries: Vec<EntryRecord>,
    summaries: BTreeMap<String, SourceSummary>,
}

impl MemoryStore {
    pub fn new(sources: Vec<SourceRecord>, entries: Vec<EntryRecord>) -> Self {
        Self {
            sources,
            entries,
            summaries: BTreeMap::new(),
        }
    }

    /// Seed previously written summary rows
    pub fn with_summaries(mut self, rows: Vec<SourceSummary>) -> Self {
        for row in rows {
            self.summaries.insert(row.source_id.clone(), row);
        }
        self
    }

    pub fn summary(&self, source_id: &str) -> Option<&SourceSummary> {
        self.summaries.get(source_id)
    }

    /// Stored rows ordered by source id
    pub fn summaries(&self) -> Vec<SourceSummary> {
        self.summaries.values().cloned().collect()
    }
}

impl SourceLister for MemoryStore {
    fn distinct_source_ids(&self) -> Result<Vec<String>, SummaryError> {
        let ids: BTreeSet<&str> = self.sources.iter().map(|s| s.source_id.as_str()).collect();
        Ok(ids.into_iter().map(str::to_string).collect())
    }
}

impl SourceRepository for MemoryStore {
    fn sources_for(&self, source_id: &str) -> Result<Vec<SourceRecord>, SummaryError> {
        Ok(self
            .sources
            .iter()
            .filter(|s| s.source_id == source_id)
            .cloned()
            .collect())
    }
}

impl EntryRepository for MemoryStore {
    fn eligible_entries(&self, source_id: &str) -> Result<Vec<EntryRecord>, SummaryError> {
        let mut entries: Vec<EntryRecord> = self
            .entries
            .iter()
            .filter(|e| e.source_id == source_id)
            .filter(|e| !e.has_reject_reason(&RejectReason::LowEngagement))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }
}

impl SummaryStore for MemoryStore {
    fn upsert_batch(&mut self, rows: Vec<SourceSummary>) -> Result<(), SummaryError> {
        for row in rows {
            match self.summaries.get_mut(&row.source_id) {
                Some(existing) => {
                    existing.summary = row.summary;
                    existing.updated_at = row.updated_at;
                }
                None => {
                    self.summaries.insert(row.source_id.clone(), row);
                }
            }
        }
        Ok(())
    }
}

/// Parse a JSON array of records
pub fn parse_array<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, SummaryError> {
    let records: Vec<T> = serde_json::from_str(json)?;
    Ok(records)
}

/// Parse NDJSON (newline-delimited JSON) records
pub fn parse_ndjson<T: DeserializeOwned>(ndjson: &str) -> Result<Vec<T>, SummaryError> {
    let mut records = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => {
                return Err(SummaryError::Parse(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryMetadata, EntryStatus, SourceStatus, SummaryData};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn source(source_id: &str) -> SourceRecord {
        SourceRecord {
            id: Uuid::new_v4(),
            engine_id: String::new(),
            source_id: source_id.to_string(),
            url: String::new(),
            status: SourceStatus::Processing,
            options: serde_json::Value::Null,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn entry(source_id: &str, hours: i64, reject: Option<RejectReason>) -> EntryRecord {
        EntryRecord {
            id: Uuid::new_v4(),
            source_id: source_id.to_string(),
            status: EntryStatus::Completed,
            reject_reason: reject,
            metadata: EntryMetadata::default(),
            created_at: at(hours),
            updated_at: at(hours),
        }
    }

    #[test]
    fn test_distinct_source_ids() {
        let store = MemoryStore::new(
            vec![source("b"), source("a"), source("b"), source("c")],
            vec![],
        );

        assert_eq!(store.distinct_source_ids().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.sources_for("b").unwrap().len(), 2);
        assert!(store.sources_for("missing").unwrap().is_empty());
    }

    #[test]
    fn test_eligible_entries_filtered_and_sorted() {
        let store = MemoryStore::new(
            vec![source("a")],
            vec![
                entry("a", 5, None),
                entry("a", 1, Some(RejectReason::GenericError)),
                entry("a", 3, Some(RejectReason::LowEngagement)),
                entry("b", 2, None),
                entry("a", 2, None),
            ],
        );

        let entries = store.eligible_entries("a").unwrap();
        let hours: Vec<DateTime<Utc>> = entries.iter().map(|e| e.created_at).collect();
        assert_eq!(hours, vec![at(1), at(2), at(5)]);
    }

    #[test]
    fn test_upsert_keeps_created_at() {
        let mut store = MemoryStore::default().with_summaries(vec![SourceSummary::new(
            "a",
            SummaryData::default(),
            at(0),
        )]);

        let updated = SummaryData {
            enabled: true,
            entry_count: 7,
            ..Default::default()
        };
        store
            .upsert_batch(vec![
                SourceSummary::new("a", updated.clone(), at(24)),
                SourceSummary::new("b", SummaryData::default(), at(24)),
            ])
            .unwrap();

        let a = store.summary("a").unwrap();
        assert_eq!(a.created_at, at(0));
        assert_eq!(a.updated_at, at(24));
        assert_eq!(a.summary, updated);

        let b = store.summary("b").unwrap();
        assert_eq!(b.created_at, at(24));

        let ids: Vec<String> = store.summaries().into_iter().map(|s| s.source_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = MemoryStore::default();
        let row = SourceSummary::new("a", SummaryData::default(), at(1));

        store.upsert_batch(vec![row.clone()]).unwrap();
        let first = store.summaries();
        store.upsert_batch(vec![row]).unwrap();

        assert_eq!(store.summaries(), first);
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"
{"id":"6f1c1a52-3b8e-4a4c-9d59-0f0a6c1e2b11","source_id":"a","status":"processing","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-02T00:00:00Z"}

{"id":"7a2d2b63-4c9f-4b5d-8e6a-1f1b7d2f3c22","source_id":"a","status":"paused","options":{"engagement":{"threshold":4}},"created_at":"2024-01-03T00:00:00Z","updated_at":"2024-01-03T00:00:00Z"}
"#;

        let sources: Vec<SourceRecord> = parse_ndjson(ndjson).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].status, SourceStatus::Paused);
        assert_eq!(sources[1].options["engagement"]["threshold"], 4);
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"id\":\"6f1c1a52-3b8e-4a4c-9d59-0f0a6c1e2b11\",\"source_id\":\"a\",\"status\":\"completed\",\"created_at\":\"2024-01-01T00:00:00Z\",\"updated_at\":\"2024-01-01T00:00:00Z\"}\nnot json\n";

        let err = parse_ndjson::<EntryRecord>(ndjson).unwrap_err();
        match err {
            SummaryError::Parse(msg) => assert!(msg.contains("line 2"), "{}", msg),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_array() {
        let json = r#"[{"id":"6f1c1a52-3b8e-4a4c-9d59-0f0a6c1e2b11","source_id":"a","status":"completed","reject_reason":"low_engagement","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}]"#;

        let entries: Vec<EntryRecord> = parse_array(json).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].has_reject_reason(&RejectReason::LowEngagement));

        assert!(parse_array::<EntryRecord>("{}").is_err());
    }
}
