//! Network directory: name → RPC endpoint, with on-disk caching.
//!
//! The directory starts from a built-in table of popular networks, overlays
//! whatever a previous run cached on disk, and can be refreshed explicitly
//! from the public chain registry at <https://chainid.network/chains.json>.
//! A refresh failure is never fatal — the cached or default table keeps
//! working.
//!
//! This is deliberately an explicit value constructed once at setup and
//! passed where needed; there is no process-wide mutable network table.

use crate::error::{ScanError, ScanResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Built-in fallback endpoints for popular networks.
pub const DEFAULT_NETWORKS: [(&str, &str); 5] = [
    ("eth", "https://eth.llamarpc.com"),
    ("arbitrum", "https://arbitrum.llamarpc.com"),
    ("optimism", "https://optimism.llamarpc.com"),
    ("base", "https://base.llamarpc.com"),
    ("polygon", "https://polygon.llamarpc.com"),
];

/// Public chain registry used by [`NetworkDirectory::refresh`].
pub const REGISTRY_URL: &str = "https://chainid.network/chains.json";

/// Default on-disk cache location.
pub const DEFAULT_CACHE_FILE: &str = ".networks-cache.json";

/// One chain entry of the public registry (the fields we use).
#[derive(Debug, Deserialize)]
struct ChainEntry {
    #[serde(rename = "shortName", default)]
    short_name: String,
    #[serde(default)]
    rpc: Vec<String>,
}

/// Pick a usable endpoint: plain HTTP(S), no credential placeholders.
fn pick_rpc(rpc: &[String]) -> Option<&String> {
    rpc.iter()
        .find(|url| url.starts_with("http") && !url.contains('$'))
}

/// Name → RPC endpoint directory with an on-disk JSON cache.
#[derive(Debug, Clone)]
pub struct NetworkDirectory {
    networks: BTreeMap<String, String>,
    cache_path: PathBuf,
}

impl NetworkDirectory {
    /// Load the directory: built-in defaults overlaid with the cache file.
    ///
    /// A missing or unreadable cache is not an error; the defaults stand.
    #[must_use]
    pub fn load(cache_path: impl Into<PathBuf>) -> Self {
        let cache_path = cache_path.into();
        let mut networks: BTreeMap<String, String> = DEFAULT_NETWORKS
            .iter()
            .map(|(name, url)| ((*name).to_owned(), (*url).to_owned()))
            .collect();

        match fs::read_to_string(&cache_path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(cached) => {
                    debug!(count = cached.len(), path = %cache_path.display(), "Loaded network cache");
                    networks.extend(cached);
                }
                Err(e) => {
                    warn!(error = %e, path = %cache_path.display(), "Ignoring malformed network cache");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(error = %e, path = %cache_path.display(), "Failed to read network cache");
            }
        }

        Self {
            networks,
            cache_path,
        }
    }

    /// Resolve a network name to its RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns a setup error naming a sample of available networks when the
    /// name is not in the directory.
    pub fn url(&self, network: &str) -> ScanResult<&str> {
        self.networks.get(network).map(String::as_str).ok_or_else(|| {
            let sample: Vec<&str> = self
                .networks
                .keys()
                .take(10)
                .map(String::as_str)
                .collect();
            ScanError::setup(
                format!(
                    "network \"{}\" not known; available: {}... (use --list-networks to see all)",
                    network,
                    sample.join(", ")
                ),
                None,
            )
        })
    }

    /// All known networks in name order.
    pub fn networks(&self) -> impl Iterator<Item = (&str, &str)> {
        self.networks
            .iter()
            .map(|(name, url)| (name.as_str(), url.as_str()))
    }

    /// Number of known networks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Whether the directory is empty (it never is in practice).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Refresh the directory from the public chain registry and update the
    /// on-disk cache.
    ///
    /// Returns the number of networks known after the refresh.
    ///
    /// # Errors
    ///
    /// Returns a setup error if the registry cannot be fetched or parsed.
    /// Callers may treat this as non-fatal and keep the existing table.
    pub async fn refresh(&mut self) -> ScanResult<usize> {
        info!(url = REGISTRY_URL, "Refreshing network directory");

        let response = reqwest::get(REGISTRY_URL).await.map_err(|e| {
            ScanError::setup("failed to fetch network registry", Some(Box::new(e)))
        })?;
        let entries: Vec<ChainEntry> = response.json().await.map_err(|e| {
            ScanError::setup("failed to parse network registry", Some(Box::new(e)))
        })?;

        let mut added = 0usize;
        for entry in entries {
            if entry.short_name.is_empty() {
                continue;
            }
            if let Some(url) = pick_rpc(&entry.rpc) {
                let name = entry.short_name.to_lowercase();
                if self.networks.insert(name, url.clone()).is_none() {
                    added += 1;
                }
            }
        }

        info!(added, total = self.networks.len(), "Network directory refreshed");
        self.save_cache()?;
        Ok(self.networks.len())
    }

    /// Persist the current table to the cache file.
    ///
    /// # Errors
    ///
    /// Returns a setup error if the cache file cannot be written.
    pub fn save_cache(&self) -> ScanResult<()> {
        let data = serde_json::to_string_pretty(&self.networks).map_err(|e| {
            ScanError::setup("failed to serialize network cache", Some(Box::new(e)))
        })?;
        if let Some(parent) = self.cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ScanError::setup(
                    format!("failed to create cache directory {}", parent.display()),
                    Some(Box::new(e)),
                )
            })?;
        }
        fs::write(&self.cache_path, data).map_err(|e| {
            ScanError::setup(
                format!("failed to write network cache {}", self.cache_path.display()),
                Some(Box::new(e)),
            )
        })?;
        debug!(path = %self.cache_path.display(), "Saved network cache");
        Ok(())
    }

    /// Cache file location.
    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }
}
