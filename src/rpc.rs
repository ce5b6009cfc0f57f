//! RPC provider management for Ethereum connections.
//!
//! This module handles connection to an Ethereum JSON-RPC endpoint using
//! Alloy's `ProviderBuilder`. The provider is the transport behind the log
//! feed and the one-shot chain-height query at scan start.
//!
//! ## Example
//!
//! ```no_run
//! use loggregate::rpc::{create_provider, get_latest_block};
//! use loggregate::error::ScanResult;
//!
//! # async fn example() -> ScanResult<()> {
//! let provider = create_provider("https://eth.llamarpc.com").await?;
//! let height = get_latest_block(&provider).await?;
//! println!("Chain height: {height}");
//! # Ok(())
//! # }
//! ```

use crate::error::{ScanError, ScanResult};
use alloy::providers::{Provider as AlloyProvider, ProviderBuilder, RootProvider};
use alloy::transports::http::{Client, Http};
use tracing::{debug, info};

/// Type alias for the HTTP provider used by the log feed.
pub type Provider = RootProvider<Http<Client>>;

/// Create a new Ethereum RPC provider connected via HTTP.
///
/// # Errors
///
/// Returns a setup error if the RPC URL does not parse. Connectivity is not
/// probed here; the first real request surfaces transport problems.
#[allow(clippy::unused_async)]
pub async fn create_provider(rpc_url: &str) -> ScanResult<Provider> {
    debug!(rpc_url, "Creating HTTP provider");

    let url = rpc_url.parse().map_err(|e| {
        ScanError::setup(
            format!("invalid RPC URL \"{rpc_url}\""),
            Some(Box::new(e)),
        )
    })?;

    let provider = ProviderBuilder::new().on_http(url);
    info!(rpc_url, "RPC provider initialized");

    Ok(provider)
}

/// Query the current chain height.
///
/// Called exactly once at scan start; the height it returns is the frozen
/// upper bound for the whole scan.
///
/// # Errors
///
/// Returns a setup error if the RPC request fails — without a height there
/// is no scan to run.
pub async fn get_latest_block(provider: &Provider) -> ScanResult<u64> {
    let height = provider.get_block_number().await.map_err(|e| {
        ScanError::setup("failed to query chain height", Some(Box::new(e)))
    })?;

    debug!(height, "Fetched chain height");
    Ok(height)
}
