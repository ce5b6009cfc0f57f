//! Structured logging and diagnostics infrastructure.
//!
//! The scanner reports non-fatal decode failures and progress through the
//! `tracing` framework rather than writing to (or monkey-patching) the
//! process streams; filtering is a policy of the subscriber configured here,
//! not a global override of stderr.
//!
//! # Usage
//!
//! Initialize tracing at application startup:
//!
//! ```no_run
//! use loggregate::observability;
//!
//! # fn main() -> eyre::Result<()> {
//! // Defaults: human-readable stderr output at info level
//! let _guard = observability::init_tracing(None, None, false)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Environment configuration
//!
//! ```bash
//! # Set log level for all modules
//! RUST_LOG=debug loggregate ...
//!
//! # Component-specific levels
//! RUST_LOG=loggregate=debug,reqwest=warn loggregate ...
//!
//! # JSON output for log aggregation
//! LOG_JSON=true loggregate ...
//!
//! # Write logs to a daily-rotated file
//! LOG_FILE=./logs/loggregate.log loggregate ...
//! ```

use eyre::Result;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the tracing subscriber.
///
/// Diagnostics go to **stderr** so they never interleave with the scan
/// display on stdout. An optional file layer adds daily-rotated JSON logs.
///
/// Returns a guard that must be held for the lifetime of the program when
/// file logging is enabled; dropping it flushes and stops the background
/// writer.
///
/// # Arguments
///
/// * `log_level` - Level override (e.g. "debug"); `RUST_LOG` wins if set
/// * `log_file` - Optional file path; enables daily rotation
/// * `json_output` - JSON console format instead of human-readable
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or subscriber
/// initialization fails.
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> Result<Option<WorkerGuard>> {
    // Build environment filter from RUST_LOG or provided level
    let env_filter = if let Ok(filter) = std::env::var("RUST_LOG") {
        EnvFilter::new(filter)
    } else if let Some(level) = log_level {
        EnvFilter::new(level)
    } else {
        // Default: info for our app, warn for dependencies
        EnvFilter::new("loggregate=info,warn")
    };

    // Console layer (stderr, away from the scan display)
    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    // File layer (optional, daily rotation, always JSON)
    let (file_layer, guard) = if let Some(ref path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file_appender = tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name().unwrap_or_else(|| OsStr::new("loggregate.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let layer = fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if let Some(file) = file_layer {
        subscriber.with(file).try_init()?;
    } else {
        subscriber.try_init()?;
    }

    Ok(guard)
}
