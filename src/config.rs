//! Scan configuration, built once at setup.
//!
//! All knobs for a scan are collected into an immutable [`ScanConfig`] value
//! that is constructed from the command line (with `.env` overlays via
//! `dotenvy`) and passed into the controller. Nothing here is process-global
//! and nothing is re-read during streaming.
//!
//! ## Environment variables
//!
//! Optional (with defaults):
//! - `RPC_URL`: endpoint override, bypassing the network directory
//! - `BATCH_SIZE`: blocks per feed request (default: 1000)
//! - `SNAPSHOT_INTERVAL`: cursor positions between snapshot renders (default: 10000)
//! - `LOG_INTERVAL`: cursor positions between progress log lines (default: 50000)
//! - `FETCH_TIMEOUT_SECS`: per-batch fetch timeout (default: 30)

use crate::error::{ScanError, ScanResult};
use crate::networks::NetworkDirectory;
use crate::registry::ParamSpec;
use crate::throttle::{LOG_INTERVAL, SNAPSHOT_INTERVAL};
use alloy::primitives::Address;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Raw user-facing scan parameters, as collected by the CLI.
#[derive(Debug, Clone)]
pub struct ScanInput {
    /// Network name for directory lookup
    pub network: String,
    /// Explicit endpoint override; skips the directory when set
    pub rpc_url: Option<String>,
    /// Human-readable event signature to monitor
    pub event_signature: String,
    /// Tracked parameter, by name or zero-based index
    pub param: String,
    /// Optional emitting contract filter
    pub contract: Option<String>,
    /// Token decimals applied at display time
    pub decimals: u32,
    /// First block to scan
    pub from_block: u64,
    /// Title for the display
    pub title: String,
}

/// Immutable runtime configuration for one scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    network: String,
    rpc_url: String,
    event_signature: String,
    param: ParamSpec,
    contract: Option<Address>,
    decimals: u32,
    from_block: u64,
    title: String,
    batch_size: u64,
    snapshot_interval: u64,
    log_interval: u64,
    fetch_timeout: Duration,
}

/// Read an optional numeric environment variable.
fn env_u64(name: &str, default: u64) -> ScanResult<u64> {
    match env::var(name) {
        Ok(raw) => raw.parse::<u64>().map_err(|e| {
            ScanError::setup(
                format!("{name} must be a number, got \"{raw}\""),
                Some(Box::new(e)),
            )
        }),
        Err(_) => Ok(default),
    }
}

impl ScanConfig {
    /// Resolve user input into a validated configuration.
    ///
    /// Loads `.env` if present, resolves the RPC endpoint (explicit override
    /// first, then the network directory), and validates everything that can
    /// be validated without touching the network.
    ///
    /// # Errors
    ///
    /// Returns a setup error for an unknown network, a malformed contract
    /// address, or malformed numeric environment overrides.
    pub fn resolve(input: ScanInput, directory: &NetworkDirectory) -> ScanResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        let rpc_url = match input.rpc_url.or_else(|| env::var("RPC_URL").ok()) {
            Some(url) => url,
            None => directory.url(&input.network)?.to_owned(),
        };

        let contract = input
            .contract
            .map(|raw| {
                Address::from_str(&raw).map_err(|e| {
                    ScanError::setup(
                        format!("invalid contract address \"{raw}\""),
                        Some(Box::new(e)),
                    )
                })
            })
            .transpose()?;

        let batch_size = env_u64("BATCH_SIZE", 1_000)?;
        if batch_size == 0 {
            return Err(ScanError::setup("BATCH_SIZE must be at least 1", None));
        }

        let snapshot_interval = env_u64("SNAPSHOT_INTERVAL", SNAPSHOT_INTERVAL)?;
        let log_interval = env_u64("LOG_INTERVAL", LOG_INTERVAL)?;
        let fetch_timeout = Duration::from_secs(env_u64("FETCH_TIMEOUT_SECS", 30)?);

        let param = ParamSpec::from_str(&input.param)
            .unwrap_or(ParamSpec::Index(0));

        debug!(
            network = %input.network,
            from_block = input.from_block,
            batch_size,
            "Resolved scan configuration"
        );

        Ok(Self {
            network: input.network,
            rpc_url,
            event_signature: input.event_signature,
            param,
            contract,
            decimals: input.decimals,
            from_block: input.from_block,
            title: input.title,
            batch_size,
            snapshot_interval,
            log_interval,
            fetch_timeout,
        })
    }

    /// Network name.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Resolved RPC endpoint.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Monitored event signature.
    #[must_use]
    pub fn event_signature(&self) -> &str {
        &self.event_signature
    }

    /// Tracked parameter specification.
    #[must_use]
    pub const fn param(&self) -> &ParamSpec {
        &self.param
    }

    /// Optional contract address filter.
    #[must_use]
    pub const fn contract(&self) -> Option<Address> {
        self.contract
    }

    /// Token decimals for display formatting.
    #[must_use]
    pub const fn decimals(&self) -> u32 {
        self.decimals
    }

    /// First block to scan.
    #[must_use]
    pub const fn from_block(&self) -> u64 {
        self.from_block
    }

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Blocks per feed request.
    #[must_use]
    pub const fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Cursor positions between snapshot renders.
    #[must_use]
    pub const fn snapshot_interval(&self) -> u64 {
        self.snapshot_interval
    }

    /// Cursor positions between progress log lines.
    #[must_use]
    pub const fn log_interval(&self) -> u64 {
        self.log_interval
    }

    /// Per-batch fetch timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }
}
