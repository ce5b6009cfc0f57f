//! Command-line interface for the event-log scanner.
//!
//! Parses and validates arguments, resolves the network directory, wires the
//! feed, registry, engine, throttle, and display together, and runs the scan
//! to completion.
//!
//! # Example
//!
//! ```bash
//! # Track ERC-20 transfer amounts on mainnet
//! loggregate -e "Transfer(address indexed from, address indexed to, uint256 value)" \
//!     -p value -d 18 -n eth
//!
//! # Track swap amounts for one contract on arbitrum, third parameter
//! loggregate -e "Swap(address,uint256,uint256,uint256,address)" -p 2 \
//!     -c 0x1234567890123456789012345678901234567890 -n arbitrum
//! ```

use crate::aggregate::AggregateEngine;
use crate::config::{ScanConfig, ScanInput};
use crate::display::{format_count, TerminalDisplay};
use crate::error::{ScanError, ScanResult};
use crate::feed::EthLogFeed;
use crate::networks::{NetworkDirectory, DEFAULT_CACHE_FILE};
use crate::registry::{EventDefinition, EventRegistry};
use crate::rpc::create_provider;
use crate::scanner::{ScanController, ScanState};
use crate::throttle::UpdateThrottle;
use clap::Parser;
use colored::Colorize;
use std::env;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Aggregate a numeric event parameter over a blockchain log stream.
#[derive(Parser, Debug)]
#[command(name = "loggregate")]
#[command(about = "Scan blockchain event logs and aggregate a numeric parameter", long_about = None)]
#[command(version)]
struct Cli {
    /// Event signature to monitor, e.g. "Transfer(address,address,uint256)"
    #[arg(short, long)]
    event: Option<String>,

    /// Event parameter to track, by name or zero-based index (integer types only)
    #[arg(short, long)]
    param: Option<String>,

    /// Contract address to monitor
    #[arg(short, long)]
    contract: Option<String>,

    /// Network to connect to
    #[arg(short, long, default_value = "eth")]
    network: String,

    /// Number of decimals to divide values by (e.g. 18 for wei to ETH)
    #[arg(short, long, default_value_t = 0)]
    decimals: u32,

    /// Starting block number
    #[arg(short = 'b', long, default_value_t = 0)]
    from_block: u64,

    /// RPC endpoint override, bypassing the network directory
    #[arg(long)]
    rpc_url: Option<String>,

    /// Custom title for the scanner display
    #[arg(short, long, default_value = "Blockchain Event Scanner")]
    title: String,

    /// List all available networks and exit
    #[arg(short = 'N', long)]
    list_networks: bool,

    /// Refresh the network list from the public chain registry
    #[arg(long)]
    refresh_networks: bool,

    /// Show additional setup info
    #[arg(short, long)]
    verbose: bool,
}

fn networks_cache_path() -> PathBuf {
    env::var("LOGGREGATE_NETWORKS_CACHE")
        .map_or_else(|_| PathBuf::from(DEFAULT_CACHE_FILE), PathBuf::from)
}

fn print_networks(directory: &NetworkDirectory) {
    println!("{}", "Available networks:".blue().bold());
    for (name, url) in directory.networks() {
        println!("  {}: {url}", name.green());
    }
    println!(
        "{}",
        format!("{} networks available", directory.len()).yellow()
    );
}

/// Parse CLI arguments and run the scan.
///
/// # Errors
///
/// Returns setup errors for invalid arguments, and the scan's fatal failure
/// when it terminates abnormally (after the partial results have been
/// displayed).
pub async fn run() -> ScanResult<()> {
    let cli = Cli::parse();

    let mut directory = NetworkDirectory::load(networks_cache_path());
    if cli.refresh_networks {
        match directory.refresh().await {
            Ok(total) => println!(
                "{}",
                format!("Networks refreshed: {total} known").green()
            ),
            Err(e) => {
                // Not fatal: the cached or default table keeps working
                warn!(error = %e, "Network refresh failed, using cached table");
                eprintln!("{}", format!("Warning: {e}").yellow());
            }
        }
    }

    if cli.list_networks {
        print_networks(&directory);
        return Ok(());
    }

    let event_signature = cli.event.ok_or_else(|| {
        ScanError::setup("no event signature provided; use --event", None)
    })?;
    let param = cli.param.ok_or_else(|| {
        ScanError::setup("no parameter to track; use --param <name-or-index>", None)
    })?;

    let config = ScanConfig::resolve(
        ScanInput {
            network: cli.network,
            rpc_url: cli.rpc_url,
            event_signature,
            param,
            contract: cli.contract,
            decimals: cli.decimals,
            from_block: cli.from_block,
            title: cli.title,
        },
        &directory,
    )?;

    // Everything rejectable is rejected here, before streaming
    let definition = EventDefinition::from_signature(config.event_signature(), config.param())?;
    let panel_label = format!("{}.{}", definition.name(), definition.param_label());

    if cli.verbose {
        println!("{} {}", "Event:".blue(), config.event_signature());
        println!("{} {}", "Parameter:".blue(), definition.param_label());
        println!("{} {}", "Network:".blue(), config.network());
        println!("{} {}", "Endpoint:".blue(), config.rpc_url());
        if let Some(contract) = config.contract() {
            println!("{} {contract}", "Contract:".blue());
        }
        if config.from_block() > 0 {
            println!("{} {}", "From block:".blue(), config.from_block());
        }
    }

    let registry = EventRegistry::new(vec![definition]);
    let provider = create_provider(config.rpc_url()).await?;
    let feed = EthLogFeed::new(
        provider,
        registry.topic_hashes().collect(),
        config.contract(),
        config.batch_size(),
    );
    let display = TerminalDisplay::new(
        format!("{} ({})", config.title(), config.network()),
        panel_label,
    );
    let engine = AggregateEngine::new(config.decimals());
    let throttle = UpdateThrottle::new(config.snapshot_interval(), config.log_interval());

    // Ctrl+C stops the scan cleanly between batches; the partial snapshot
    // is still rendered.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, requesting scan stop");
                cancel.cancel();
            }
        });
    }

    let controller = ScanController::new(feed, display, registry, engine, throttle)
        .with_from_block(config.from_block())
        .with_fetch_timeout(config.fetch_timeout())
        .with_cancellation(cancel);

    let report = controller.run().await?;

    match report.state {
        ScanState::Error => {
            // Partial results were rendered above; surface the failure
            report.failure.map_or(Ok(()), Err)
        }
        _ => {
            println!(
                "{}",
                format!(
                    "✓ Scan complete: {} logs across {} blocks in {:.1}s",
                    format_count(report.snapshot.aggregates.count),
                    format_count(report.snapshot.cursor_position),
                    report.snapshot.elapsed.as_secs_f64()
                )
                .green()
            );
            Ok(())
        }
    }
}
