//! # prodscore-logging
//!
//! Logging for prodscore batch runs.
//!
//! ## Key Types
//!
//! - [`Logger`] - Structured run event logging
//! - [`LogEvent`] - Run event types
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//! - [`RunJournal`] - JSONL record of every completed row

mod events;
mod journal;

pub use events::{LogEvent, LogFormat, Logger};
pub use journal::{JournalLine, RunJournal};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application.
///
/// `RUST_LOG` takes precedence over `level`. Diagnostics go to stderr so
/// that stdout stays free for JSON output.
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }
}
