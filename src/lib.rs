//! Sources Summary - health metrics for content ingestion sources
//!
//! Turns the time-ordered log of ingested entries into one compact summary per
//! logical source: registration flags, entry counts, staleness, posting
//! cadence and enrichment success. Downstream jobs use the summaries to keep,
//! throttle or flag sources.
//!
//! ## Modules
//!
//! - **ratio**: success fraction of outcomes inside an open time window
//! - **activity**: historical vs. recent posting cadence score
//! - **aggregator**: merges registrations and entries of one source
//! - **driver**: bounded, failure-tolerant batch over all sources
//! - **store**: repository traits and the in-memory implementation

pub mod activity;
pub mod aggregator;
pub mod config;
pub mod driver;
pub mod error;
pub mod ratio;
pub mod store;
pub mod types;

#[cfg(feature = "cli")]
pub mod logging;

pub use activity::ActivityScorer;
pub use aggregator::{engagement_threshold, AggregateOutcome, SourceAggregator};
pub use config::{ActivityConfig, SummaryConfig};
pub use driver::{BatchDriver, BatchReport};
pub use error::SummaryError;
pub use ratio::{TimeWindow, WindowedRatio};
pub use store::{EntryRepository, MemoryStore, SourceLister, SourceRepository, SummaryStore};
pub use types::{EntryRecord, SourceRecord, SourceSummary, SummaryData};

/// Crate version embedded in CLI reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for CLI reports
pub const PRODUCER_NAME: &str = "sources-summary";
