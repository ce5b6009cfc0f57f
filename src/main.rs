//! Binary entry point for the event-log scanner.

use colored::Colorize;
use loggregate::observability;
use std::env;
use std::path::PathBuf;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").ok();
    let log_file = env::var("LOG_FILE").ok().map(PathBuf::from);
    let json_output = env::var("LOG_JSON").is_ok_and(|v| v == "true" || v == "1");

    // Guard must live until exit so file logs flush
    let _guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = loggregate::cli::run().await {
        error!(error = %e, "Scan failed");
        eprintln!("{}", format!("✗ {e}").red());
        if let Some(position) = e.last_position() {
            eprintln!(
                "{}",
                format!("  resume with --from-block {position}").yellow()
            );
        }
        process::exit(1);
    }
}
