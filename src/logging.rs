//! Tracing subscriber setup for the command-line tool

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "SOURCES_SUMMARY_LOG";

const DEFAULT_FILTER: &str = "sources_summary=info";

static INIT: Once = Once::new();

/// Install the global subscriber, writing to stderr
///
/// Reads the filter from `SOURCES_SUMMARY_LOG` (e.g.
/// `sources_summary=debug`), falling back to `sources_summary=info`. Safe to
/// call more than once; only the first call has an effect.
pub fn init_tracing(json: bool) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let registry = tracing_subscriber::registry().with(filter);
        if json {
            registry
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .init();
        } else {
            registry
                .with(fmt::layer().compact().with_target(true).with_writer(std::io::stderr))
                .init();
        }
    });
}
