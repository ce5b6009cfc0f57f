//! Scan orchestration: the decode-and-aggregate loop.
//!
//! [`ScanController`] drives the whole pipeline as an explicit state machine:
//!
//! ```text
//! INIT ──► STREAMING ──► DONE
//!              │
//!              └────────► ERROR
//! ```
//!
//! - `INIT → STREAMING`: the chain height is captured (once) as the frozen
//!   upper bound and the cursor starts at the configured from-block.
//! - `STREAMING → STREAMING`: each batch is pulled at the cursor position;
//!   every contained log runs matcher → decoder → aggregate engine in feed
//!   order; the cursor advances to the batch's reported next position; the
//!   throttle gates publishing to the display sink.
//! - `STREAMING → DONE`: the feed signals exhaustion, or cancellation is
//!   requested. A final snapshot and log line are always published.
//! - `STREAMING → ERROR`: a feed failure, fetch timeout, regressive cursor
//!   advance, or display-sink failure. No retry — the report carries the
//!   failure together with everything aggregated so far (partial results
//!   are valid).
//!
//! The loop is a single logical stream of control: the only suspension
//! points are the batch-fetch await and the display publish, so no locking
//! discipline is needed around the engine or the cursor. Per-log decode
//! failures are absorbed here (counted and reported to diagnostics) and
//! never terminate the scan.

use crate::aggregate::AggregateEngine;
use crate::cursor::StreamCursor;
use crate::decode::ParameterDecoder;
use crate::display::{DisplaySink, DisplaySnapshot};
use crate::error::{ScanError, ScanResult};
use crate::feed::{LogFeed, LogRecord};
use crate::registry::EventRegistry;
use crate::throttle::UpdateThrottle;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default timeout around a single batch-fetch await.
///
/// A hung feed becomes an `ERROR` transition instead of an indefinite stall.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle state of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Constructed, chain height not yet captured
    Init,
    /// Pulling and processing batches
    Streaming,
    /// Terminal: stream exhausted or cancellation honored
    Done,
    /// Terminal: feed failure; partial aggregates remain valid
    Error,
}

/// Outcome of a completed scan.
///
/// A scan that terminated in [`ScanState::Error`] still carries the final
/// snapshot with everything aggregated up to the failure, plus the failure
/// itself (with the last successful cursor position attached).
#[derive(Debug)]
pub struct ScanReport {
    /// Terminal state, [`ScanState::Done`] or [`ScanState::Error`]
    pub state: ScanState,
    /// Final forced snapshot
    pub snapshot: DisplaySnapshot,
    /// The fatal failure, when the scan ended in the error state
    pub failure: Option<ScanError>,
}

/// Orchestrates one scan: cursor, matcher, decoder, engine, throttle, sink.
///
/// A scan is single-use; a fresh scan is a fresh controller with a fresh
/// cursor/engine pair.
pub struct ScanController<F, D> {
    feed: F,
    display: D,
    registry: EventRegistry,
    decoder: ParameterDecoder,
    engine: AggregateEngine,
    throttle: UpdateThrottle,
    from_block: u64,
    fetch_timeout: Duration,
    cancel: CancellationToken,
}

impl<F: LogFeed, D: DisplaySink> ScanController<F, D> {
    /// Create a controller over the given collaborators.
    #[must_use]
    pub fn new(
        feed: F,
        display: D,
        registry: EventRegistry,
        engine: AggregateEngine,
        throttle: UpdateThrottle,
    ) -> Self {
        Self {
            feed,
            display,
            registry,
            decoder: ParameterDecoder::new(),
            engine,
            throttle,
            from_block: 0,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Start scanning from `block` instead of genesis.
    #[must_use]
    pub const fn with_from_block(mut self, block: u64) -> Self {
        self.from_block = block;
        self
    }

    /// Override the per-fetch timeout.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Observe an external cancellation signal.
    ///
    /// Cancellation is honored during the batch-fetch await and between
    /// batches; the scan transitions to `DONE` with its partial state valid.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the scan to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns an error only for setup failures (the chain-height query).
    /// Feed and display-sink errors do not surface here: they end the scan
    /// in [`ScanState::Error`] inside the returned report so the partial
    /// aggregates stay observable.
    pub async fn run(mut self) -> ScanResult<ScanReport> {
        info!(from_block = self.from_block, "Capturing chain height");
        let upper_bound = self.feed.current_height().await?;
        let mut cursor = StreamCursor::new(self.from_block, upper_bound);
        self.throttle.align_to(self.from_block);
        let started = Instant::now();

        info!(upper_bound, "Entering streaming state");
        let mut state = ScanState::Streaming;
        let mut failure: Option<ScanError> = None;
        let mut cancelled = false;

        if let Err(e) = self
            .display
            .append_log_line(&format!(
                "Starting scan from block {} to {}",
                self.from_block, upper_bound
            ))
            .await
        {
            warn!(error = %e, "Display sink rejected output");
            failure = Some(e);
            state = ScanState::Error;
        }

        while state == ScanState::Streaming {
            let cancel = self.cancel.clone();
            let position = cursor.position();

            let batch = tokio::select! {
                // Cancellation wins over a ready batch
                biased;
                () = cancel.cancelled() => {
                    info!(position, "Cancellation requested, stopping scan");
                    cancelled = true;
                    state = ScanState::Done;
                    continue;
                }
                fetched = tokio::time::timeout(
                    self.fetch_timeout,
                    self.feed.request_batch(position),
                ) => match fetched {
                    Err(_) => {
                        failure = Some(ScanError::feed(
                            format!(
                                "batch fetch timed out after {:.0?}",
                                self.fetch_timeout
                            ),
                            Some(position),
                            None,
                        ));
                        state = ScanState::Error;
                        continue;
                    }
                    Ok(Err(e)) => {
                        failure = Some(e);
                        state = ScanState::Error;
                        continue;
                    }
                    Ok(Ok(None)) => {
                        info!(position, "Feed exhausted, scan complete");
                        state = ScanState::Done;
                        continue;
                    }
                    Ok(Ok(Some(batch))) => batch,
                }
            };

            // Logs are processed in feed order; aggregate results are
            // deterministic for a deterministic feed regardless of how the
            // stream is cut into batches.
            for log in &batch.logs {
                self.process_log(log);
            }

            if let Err(e) = cursor.advance(batch.next_position) {
                warn!(error = %e, "Feed violated cursor monotonicity");
                failure = Some(ScanError::feed(
                    e.to_string(),
                    Some(cursor.position()),
                    Some(Box::new(e)),
                ));
                state = ScanState::Error;
                continue;
            }

            let position = cursor.position();
            if self.throttle.should_log(position) {
                let line = self.progress_line(position, started);
                if let Err(e) = self.display.append_log_line(&line).await {
                    warn!(error = %e, "Display sink rejected output");
                    failure = Some(e);
                    state = ScanState::Error;
                    continue;
                }
            }
            if self.throttle.should_snapshot(position) {
                let snapshot = self.snapshot(&cursor, started);
                if let Err(e) = self.display.render_snapshot(&snapshot).await {
                    warn!(error = %e, "Display sink rejected output");
                    failure = Some(e);
                    state = ScanState::Error;
                }
            }
        }

        // Terminal: one forced log line and snapshot, regardless of the
        // throttle intervals, so the display reflects the complete scan. A
        // sink failing here is recorded but cannot displace an earlier
        // failure or the partial report.
        let line = match (&state, &failure) {
            (ScanState::Error, Some(e)) => format!("Scan failed: {e}"),
            _ if cancelled => format!("Scan cancelled at block {}", cursor.position()),
            _ => "Scan complete".to_owned(),
        };
        if let Err(e) = self.display.append_log_line(&line).await {
            warn!(error = %e, "Display sink rejected final log line");
            state = ScanState::Error;
            failure.get_or_insert(e);
        }

        let snapshot = self.snapshot(&cursor, started);
        if let Err(e) = self.display.render_snapshot(&snapshot).await {
            warn!(error = %e, "Display sink rejected final snapshot");
            state = ScanState::Error;
            failure.get_or_insert(e);
        }

        Ok(ScanReport {
            state,
            snapshot,
            failure,
        })
    }

    /// Run one log through matcher → decoder → engine.
    ///
    /// Decode failures are absorbed: counted, reported to diagnostics,
    /// excluded from the numeric aggregates.
    fn process_log(&mut self, log: &LogRecord) {
        let Some(definition) = self.registry.match_log(log) else {
            self.engine.record_unknown();
            return;
        };

        self.engine.record_match(definition.name());

        match self.decoder.decode(definition, log) {
            Ok(value) => self.engine.update(value),
            Err(e) => {
                self.engine.record_decode_error();
                debug!(
                    error = %e,
                    block = log.block_number,
                    tx = ?log.transaction_hash,
                    "Matched log failed to decode"
                );
            }
        }
    }

    fn progress_line(&self, position: u64, started: Instant) -> String {
        let secs = started.elapsed().as_secs_f64().max(0.1);
        #[allow(clippy::cast_precision_loss)]
        let rate = self.engine.count() as f64 / secs;
        format!(
            "Block {} | {} logs | {rate:.1} logs/s",
            crate::display::format_count(position),
            crate::display::format_count(self.engine.count()),
        )
    }

    fn snapshot(&self, cursor: &StreamCursor, started: Instant) -> DisplaySnapshot {
        let elapsed = started.elapsed();
        let secs = elapsed.as_secs_f64().max(0.1);
        #[allow(clippy::cast_precision_loss)]
        let logs_per_second = self.engine.count() as f64 / secs;

        DisplaySnapshot {
            cursor_position: cursor.position(),
            upper_bound: cursor.upper_bound(),
            progress: cursor.progress(),
            aggregates: self.engine.snapshot(),
            elapsed,
            logs_per_second,
        }
    }
}
