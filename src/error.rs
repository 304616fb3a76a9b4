//! Error types for source summaries

use thiserror::Error;

/// Errors that can occur while building summaries
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Insufficient data: enabled source {0} has no eligible entries")]
    InsufficientData(String),

    #[error("No source records for source {0}")]
    NoSourceRecords(String),

    #[error("Malformed options: {0}")]
    MalformedOptions(String),

    #[error("Failed to fetch records for source {source_id}: {message}")]
    Fetch { source_id: String, message: String },

    #[error("Failed to list source ids: {0}")]
    Listing(String),

    #[error("Summary store error: {0}")]
    Store(String),

    #[error("Failed to parse input: {0}")]
    Parse(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
