//! Sources Summary CLI
//!
//! Commands:
//! - summarize: Build summaries for all sources and write the summary rows
//! - validate: Check source and entry records before a run
//! - doctor: Diagnose configuration and environment
//! - config: Print the default configuration

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use sources_summary::logging::init_tracing;
use sources_summary::store::{parse_array, parse_ndjson};
use sources_summary::types::RejectReason;
use sources_summary::{
    BatchDriver, EntryRecord, MemoryStore, SourceRecord, SourceSummary, SummaryConfig,
    SummaryError, PRODUCER_NAME, VERSION,
};

/// Sources Summary - health metrics for content ingestion sources
#[derive(Parser)]
#[command(name = "sources-summary")]
#[command(version = VERSION)]
#[command(about = "Build per-source health summaries from ingestion records", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build summaries for all sources and write the summary rows
    Summarize {
        /// Source records file (use - for stdin)
        #[arg(long)]
        sources: PathBuf,

        /// Entry records file
        #[arg(long)]
        entries: PathBuf,

        /// Previously written summary rows to upsert into
        #[arg(long)]
        existing: Option<PathBuf>,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Reference time (RFC 3339), defaults to the current time
        #[arg(long)]
        now: Option<String>,

        /// Override the batch limit
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Check source and entry records before a run
    Validate {
        /// Source records file
        #[arg(long)]
        sources: PathBuf,

        /// Entry records file
        #[arg(long)]
        entries: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration
    Config,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one summary row per line)
    Ndjson,
    /// JSON array of summary rows
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SummaryCliError> {
    match cli.command {
        Commands::Summarize {
            sources,
            entries,
            existing,
            output,
            input_format,
            output_format,
            config,
            now,
            limit,
        } => cmd_summarize(
            &sources,
            &entries,
            existing.as_deref(),
            &output,
            input_format,
            output_format,
            config.as_deref(),
            now.as_deref(),
            limit,
        ),

        Commands::Validate {
            sources,
            entries,
            input_format,
            json,
        } => cmd_validate(&sources, &entries, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Config => cmd_config(),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_summarize(
    sources: &Path,
    entries: &Path,
    existing: Option<&Path>,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    now: Option<&str>,
    limit: Option<usize>,
) -> Result<(), SummaryCliError> {
    let mut config = match config {
        Some(path) => SummaryConfig::load(path)?,
        None => SummaryConfig::default(),
    };
    if let Some(limit) = limit {
        config.batch_limit = limit;
        config.validate()?;
    }

    let now = match now {
        Some(raw) => parse_now(raw)?,
        None => Utc::now(),
    };

    let source_records: Vec<SourceRecord> = read_records(sources, &input_format)?;
    let entry_records: Vec<EntryRecord> = read_records(entries, &input_format)?;

    if source_records.is_empty() {
        return Err(SummaryCliError::NoSources);
    }

    let mut store = MemoryStore::new(source_records, entry_records);
    if let Some(path) = existing {
        let rows: Vec<SourceSummary> = read_records(path, &input_format)?;
        store = store.with_summaries(rows);
    }

    let driver = BatchDriver::new(config);
    driver.run(&mut store, now)?;

    let output_data = format_output(&store.summaries(), &output_format)?;
    write_output(output, &output_data)?;

    Ok(())
}

fn cmd_validate(
    sources: &Path,
    entries: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), SummaryCliError> {
    let source_records: Vec<SourceRecord> = read_records(sources, &input_format)?;
    let entry_records: Vec<EntryRecord> = read_records(entries, &input_format)?;

    let known: BTreeSet<&str> = source_records
        .iter()
        .map(|s| s.source_id.as_str())
        .collect();

    let mut issues: Vec<ValidationIssue> = Vec::new();

    for (index, source) in source_records.iter().enumerate() {
        if source.source_id.trim().is_empty() {
            issues.push(ValidationIssue {
                kind: "source".to_string(),
                index,
                record_id: source.id.to_string(),
                error: "empty source_id".to_string(),
            });
        }
    }

    for (index, entry) in entry_records.iter().enumerate() {
        if !known.contains(entry.source_id.as_str()) {
            issues.push(ValidationIssue {
                kind: "entry".to_string(),
                index,
                record_id: entry.id.to_string(),
                error: format!("unknown source_id '{}'", entry.source_id),
            });
        }
    }

    let low_engagement = entry_records
        .iter()
        .filter(|e| e.has_reject_reason(&RejectReason::LowEngagement))
        .count();

    let report = ValidationReport {
        source_records: source_records.len(),
        distinct_sources: known.len(),
        entry_records: entry_records.len(),
        low_engagement_entries: low_engagement,
        issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Source records:     {}", report.source_records);
        println!("Distinct sources:   {}", report.distinct_sources);
        println!("Entry records:      {}", report.entry_records);
        println!("Low engagement:     {}", report.low_engagement_entries);
        println!("Issues:             {}", report.issues.len());

        if !report.issues.is_empty() {
            println!("\nIssues:");
            for issue in &report.issues {
                println!(
                    "  - {} {} (index {}): {}",
                    issue.kind, issue.record_id, issue.index, issue.error
                );
            }
        }
    }

    if report.issues.is_empty() {
        Ok(())
    } else {
        Err(SummaryCliError::ValidationFailed(report.issues.len()))
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), SummaryCliError> {
    let mut checks: Vec<DoctorCheck> = vec![DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, VERSION),
    }];

    match config {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Config file does not exist, defaults will be used".to_string(),
        }),
        Some(path) => match SummaryConfig::load(path) {
            Ok(loaded) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (batch limit {}, min entries {})",
                    loaded.batch_limit, loaded.activity.min_entry_count
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "No config file given, using defaults".to_string(),
        }),
    }

    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: if atty::is(atty::Stream::Stdin) {
            "stdin is a TTY (pass record files explicitly)".to_string()
        } else {
            "stdin is a pipe (--sources - is available)".to_string()
        },
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Doctor Report");
        println!("=============");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(SummaryCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_config() -> Result<(), SummaryCliError> {
    println!("{}", SummaryConfig::default().to_json()?);
    Ok(())
}

// Helper functions

fn read_input(path: &Path) -> Result<String, SummaryCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn read_records<T: DeserializeOwned>(
    path: &Path,
    format: &InputFormat,
) -> Result<Vec<T>, SummaryCliError> {
    let data = read_input(path)?;
    let records = match format {
        InputFormat::Ndjson => parse_ndjson(&data)?,
        InputFormat::Json => parse_array(&data)?,
    };
    Ok(records)
}

fn write_output(path: &Path, data: &str) -> Result<(), SummaryCliError> {
    if path.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(path, data)?;
    }
    Ok(())
}

fn parse_now(raw: &str) -> Result<DateTime<Utc>, SummaryCliError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SummaryCliError::InvalidNow(format!("{}: {}", raw, e)))
}

fn format_output(rows: &[SourceSummary], format: &OutputFormat) -> Result<String, SummaryCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for row in rows {
                lines.push(serde_json::to_string(row)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(rows)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(rows)?),
    }
}

// Error types

#[derive(Debug)]
enum SummaryCliError {
    Io(io::Error),
    Summary(SummaryError),
    Json(serde_json::Error),
    InvalidNow(String),
    NoSources,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for SummaryCliError {
    fn from(e: io::Error) -> Self {
        SummaryCliError::Io(e)
    }
}

impl From<SummaryError> for SummaryCliError {
    fn from(e: SummaryError) -> Self {
        SummaryCliError::Summary(e)
    }
}

impl From<serde_json::Error> for SummaryCliError {
    fn from(e: serde_json::Error) -> Self {
        SummaryCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SummaryCliError> for CliError {
    fn from(e: SummaryCliError) -> Self {
        match e {
            SummaryCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SummaryCliError::Summary(e) => {
                let (code, hint) = match &e {
                    SummaryError::InvalidConfig(_) => (
                        "CONFIG_ERROR",
                        "Run 'sources-summary config' for a valid template",
                    ),
                    SummaryError::Parse(_) | SummaryError::Json(_) => (
                        "PARSE_ERROR",
                        "Ensure records match the expected input format",
                    ),
                    SummaryError::Listing(_) | SummaryError::Store(_) => {
                        ("STORE_ERROR", "Check the record store and retry")
                    }
                    _ => ("SUMMARY_ERROR", "Run 'sources-summary validate' for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            SummaryCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SummaryCliError::InvalidNow(msg) => CliError {
                code: "INVALID_NOW".to_string(),
                message: msg,
                hint: Some("Use RFC 3339, e.g. 2024-03-01T00:00:00Z".to_string()),
            },
            SummaryCliError::NoSources => CliError {
                code: "NO_SOURCES".to_string(),
                message: "No source records found in input".to_string(),
                hint: Some("Ensure the sources file is not empty".to_string()),
            },
            SummaryCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation issues and retry".to_string()),
            },
            SummaryCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    source_records: usize,
    distinct_sources: usize,
    entry_records: usize,
    low_engagement_entries: usize,
    issues: Vec<ValidationIssue>,
}

#[derive(serde::Serialize)]
struct ValidationIssue {
    kind: String,
    index: usize,
    record_id: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
