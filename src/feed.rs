//! The paginated log feed boundary.
//!
//! The scanner consumes an abstract [`LogFeed`]: request a batch at a cursor
//! position, get back the contained logs and the next position, or nothing at
//! all once the stream is exhausted. Exhaustion is signalled by the absence
//! of a batch (`None`), not by an empty batch — a range of blocks with no
//! matching logs still advances the cursor.
//!
//! [`EthLogFeed`] is the production implementation: `eth_getLogs` over an
//! Alloy HTTP provider, paginated in fixed block ranges and filtered
//! server-side by the registered topic hashes (and optionally a contract
//! address). Tests substitute in-memory feeds.

use crate::error::{ScanError, ScanResult};
use crate::rpc::Provider;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::Provider as AlloyProvider;
use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;
use tracing::{debug, trace};

/// One event-log record as produced by the feed.
///
/// Read-only; processed once and not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Ordered topic hashes; the first entry is the event signature hash
    pub topics: Vec<B256>,
    /// Raw ABI-encoded payload (the non-indexed parameters)
    pub data: Bytes,
    /// Block the log was emitted in, when the feed reports it
    pub block_number: Option<u64>,
    /// Emitting transaction hash, when the feed reports it
    pub transaction_hash: Option<B256>,
    /// Position within the block, when the feed reports it
    pub log_index: Option<u64>,
}

impl LogRecord {
    /// Convert from an Alloy RPC log.
    #[must_use]
    pub fn from_rpc(log: &Log) -> Self {
        Self {
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
        }
    }
}

/// One page of the log stream.
#[derive(Debug, Clone)]
pub struct LogBatch {
    /// Logs in feed order
    pub logs: Vec<LogRecord>,
    /// Cursor position to request next; monotone across batches
    pub next_position: u64,
}

/// A paginated source of event-log records.
///
/// Implementations must be monotone in `next_position`. Transport failures
/// propagate as feed errors and terminate the scan; there is no retry at
/// this boundary.
#[async_trait]
pub trait LogFeed: Send {
    /// Current chain height. The scanner calls this exactly once, at start.
    async fn current_height(&mut self) -> ScanResult<u64>;

    /// Request the batch at `cursor_position`.
    ///
    /// Returns `None` once the stream is exhausted.
    async fn request_batch(&mut self, cursor_position: u64) -> ScanResult<Option<LogBatch>>;
}

/// Clamp a batch to `[position, position + batch_size)`, capped at the tip.
///
/// Returns `None` when the position is already past the tip.
fn block_range(position: u64, batch_size: u64, tip: u64) -> Option<(u64, u64)> {
    if position > tip {
        return None;
    }
    let to = position
        .saturating_add(batch_size.max(1) - 1)
        .min(tip);
    Some((position, to))
}

/// `eth_getLogs`-backed log feed.
pub struct EthLogFeed {
    provider: Provider,
    topics: Vec<B256>,
    address: Option<Address>,
    batch_size: u64,
    /// Chain height captured on first use; the stream's fixed end
    tip: Option<u64>,
}

impl EthLogFeed {
    /// Create a feed filtering on the given topic hashes and optional
    /// contract address, paginating `batch_size` blocks per request.
    #[must_use]
    pub fn new(
        provider: Provider,
        topics: Vec<B256>,
        address: Option<Address>,
        batch_size: u64,
    ) -> Self {
        Self {
            provider,
            topics,
            address,
            batch_size,
            tip: None,
        }
    }

    async fn tip(&mut self) -> ScanResult<u64> {
        if let Some(tip) = self.tip {
            return Ok(tip);
        }
        let tip = crate::rpc::get_latest_block(&self.provider).await?;
        self.tip = Some(tip);
        Ok(tip)
    }
}

#[async_trait]
impl LogFeed for EthLogFeed {
    async fn current_height(&mut self) -> ScanResult<u64> {
        self.tip().await
    }

    async fn request_batch(&mut self, cursor_position: u64) -> ScanResult<Option<LogBatch>> {
        let tip = self.tip().await?;
        let Some((from, to)) = block_range(cursor_position, self.batch_size, tip) else {
            debug!(cursor_position, tip, "Log stream exhausted");
            return Ok(None);
        };

        let mut filter = Filter::new()
            .event_signature(self.topics.clone())
            .from_block(from)
            .to_block(to);
        if let Some(address) = self.address {
            filter = filter.address(address);
        }

        trace!(from, to, "Requesting log batch");
        let logs = self.provider.get_logs(&filter).await.map_err(|e| {
            ScanError::feed(
                format!("eth_getLogs failed for blocks {from}..={to}"),
                Some(cursor_position),
                Some(Box::new(e)),
            )
        })?;

        Ok(Some(LogBatch {
            logs: logs.iter().map(LogRecord::from_rpc).collect(),
            next_position: to + 1,
        }))
    }
}
