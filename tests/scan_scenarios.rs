//! End-to-end scan scenarios over an in-memory log feed.
//!
//! These tests drive the full pipeline (matcher, decoder, engine, throttle,
//! display sink) through the controller with scripted batches, checking the
//! statistics, the lifecycle transitions, and the partial-result guarantees
//! without touching a network.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use alloy::primitives::{b256, Bytes, B256, U256};
use async_trait::async_trait;
use loggregate::aggregate::{AggregateEngine, AggregateSnapshot};
use loggregate::display::{DisplaySink, DisplaySnapshot};
use loggregate::error::{ScanError, ScanResult};
use loggregate::feed::{LogBatch, LogFeed, LogRecord};
use loggregate::registry::{EventDefinition, EventRegistry, ParamSpec};
use loggregate::scanner::{ScanController, ScanState};
use loggregate::throttle::UpdateThrottle;
use num_bigint::BigInt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

const TRANSFER_SIG: &str = "Transfer(address indexed from, address indexed to, uint256 value)";

/// Canonical ERC-20 Transfer topic hash.
const TRANSFER_TOPIC: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// A well-formed Transfer log carrying `value` in the data section.
fn transfer_log(value: u64, block: u64) -> LogRecord {
    LogRecord {
        topics: vec![TRANSFER_TOPIC, B256::ZERO, B256::ZERO],
        data: Bytes::copy_from_slice(&U256::from(value).to_be_bytes::<32>()),
        block_number: Some(block),
        transaction_hash: None,
        log_index: None,
    }
}

/// A log whose primary topic matches nothing in the registry.
fn unknown_log(block: u64) -> LogRecord {
    LogRecord {
        topics: vec![B256::repeat_byte(0xAB)],
        data: Bytes::new(),
        block_number: Some(block),
        transaction_hash: None,
        log_index: None,
    }
}

/// A matched Transfer log with a truncated data section.
fn corrupt_transfer_log(block: u64) -> LogRecord {
    LogRecord {
        topics: vec![TRANSFER_TOPIC, B256::ZERO, B256::ZERO],
        data: Bytes::copy_from_slice(&[0u8; 7]),
        block_number: Some(block),
        transaction_hash: None,
        log_index: None,
    }
}

/// Scripted in-memory feed: a fixed height and a queue of batch results.
struct MockFeed {
    height: u64,
    batches: VecDeque<ScanResult<Option<LogBatch>>>,
}

impl MockFeed {
    fn new(height: u64, batches: Vec<ScanResult<Option<LogBatch>>>) -> Self {
        Self {
            height,
            batches: batches.into(),
        }
    }

    fn batch(logs: Vec<LogRecord>, next_position: u64) -> ScanResult<Option<LogBatch>> {
        Ok(Some(LogBatch {
            logs,
            next_position,
        }))
    }
}

#[async_trait]
impl LogFeed for MockFeed {
    async fn current_height(&mut self) -> ScanResult<u64> {
        Ok(self.height)
    }

    async fn request_batch(&mut self, _cursor_position: u64) -> ScanResult<Option<LogBatch>> {
        self.batches.pop_front().unwrap_or(Ok(None))
    }
}

/// Display sink that records everything published to it.
#[derive(Clone, Default)]
struct CollectingSink {
    snapshots: Arc<Mutex<Vec<DisplaySnapshot>>>,
    lines: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    fn snapshots(&self) -> Vec<DisplaySnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl DisplaySink for CollectingSink {
    async fn render_snapshot(&mut self, snapshot: &DisplaySnapshot) -> ScanResult<()> {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }

    async fn append_log_line(&mut self, line: &str) -> ScanResult<()> {
        self.lines.lock().unwrap().push(line.to_owned());
        Ok(())
    }
}

/// Sink that accepts log lines but rejects every snapshot render.
#[derive(Clone, Copy, Default)]
struct SnapshotRejectingSink;

#[async_trait]
impl DisplaySink for SnapshotRejectingSink {
    async fn render_snapshot(&mut self, _snapshot: &DisplaySnapshot) -> ScanResult<()> {
        Err(ScanError::display("terminal closed", None))
    }

    async fn append_log_line(&mut self, _line: &str) -> ScanResult<()> {
        Ok(())
    }
}

fn transfer_registry() -> EventRegistry {
    let def = EventDefinition::from_signature(TRANSFER_SIG, &ParamSpec::Name("value".into()))
        .unwrap();
    EventRegistry::new(vec![def])
}

fn controller(
    feed: MockFeed,
    sink: CollectingSink,
) -> ScanController<MockFeed, CollectingSink> {
    ScanController::new(
        feed,
        sink,
        transfer_registry(),
        AggregateEngine::new(0),
        UpdateThrottle::default(),
    )
}

/// Run a scripted feed to completion and return the final aggregates.
async fn run_batches(batches: Vec<ScanResult<Option<LogBatch>>>, height: u64) -> AggregateSnapshot {
    let sink = CollectingSink::default();
    let report = controller(MockFeed::new(height, batches), sink)
        .run()
        .await
        .unwrap();
    assert_eq!(report.state, ScanState::Done);
    report.snapshot.aggregates
}

#[tokio::test]
async fn two_transfers_yield_exact_statistics() {
    let batches = vec![MockFeed::batch(
        vec![transfer_log(100, 5), transfer_log(300, 9)],
        1_000,
    )];
    let sink = CollectingSink::default();
    let report = controller(MockFeed::new(999, batches), sink)
        .run()
        .await
        .unwrap();

    assert_eq!(report.state, ScanState::Done);
    let stats = &report.snapshot.aggregates;
    assert_eq!(stats.count, 2);
    assert_eq!(stats.decoded_count, 2);
    assert_eq!(stats.sum, BigInt::from(400));
    assert_eq!(stats.min, Some(BigInt::from(100)));
    assert_eq!(stats.max, Some(BigInt::from(300)));
    assert_eq!(stats.mean_floor(), BigInt::from(200));
    assert_eq!(stats.variance_floor(), BigInt::from(10_000));
    assert_eq!(stats.std_dev_floor(), BigInt::from(100));
    assert!(stats.counts_consistent());
}

#[tokio::test]
async fn unknown_topic_counted_but_not_aggregated() {
    let batches = vec![MockFeed::batch(
        vec![transfer_log(50, 1), unknown_log(2)],
        100,
    )];
    let stats = run_batches(batches, 99).await;

    assert_eq!(stats.count, 2);
    assert_eq!(stats.unknown_count, 1);
    assert_eq!(stats.decoded_count, 1);
    assert_eq!(stats.sum, BigInt::from(50));
    assert!(stats.counts_consistent());
}

#[tokio::test]
async fn immediate_exhaustion_still_publishes_final_snapshot() {
    let sink = CollectingSink::default();
    let report = controller(MockFeed::new(1_000, vec![]), sink.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.state, ScanState::Done);
    assert_eq!(report.snapshot.aggregates.count, 0);
    assert_eq!(report.snapshot.cursor_position, 0);
    assert_eq!(report.snapshot.upper_bound, 1_000);

    // The forced terminal snapshot arrives regardless of the throttle
    let snapshots = sink.snapshots();
    assert_eq!(snapshots.len(), 1);
    assert!(sink.lines().iter().any(|l| l == "Scan complete"));
}

#[tokio::test]
async fn aggregates_are_invariant_under_batch_splits() {
    let one = run_batches(
        vec![MockFeed::batch(
            vec![
                transfer_log(10, 1),
                transfer_log(20, 2),
                transfer_log(30, 3),
                transfer_log(40, 4),
            ],
            500,
        )],
        499,
    )
    .await;

    let split = run_batches(
        vec![
            MockFeed::batch(vec![transfer_log(10, 1)], 100),
            MockFeed::batch(vec![transfer_log(20, 2), transfer_log(30, 3)], 300),
            MockFeed::batch(vec![transfer_log(40, 4)], 500),
        ],
        499,
    )
    .await;

    assert_eq!(one, split);
}

#[tokio::test]
async fn decode_failure_absorbed_and_counted() {
    let batches = vec![MockFeed::batch(
        vec![transfer_log(100, 1), corrupt_transfer_log(2)],
        100,
    )];
    let stats = run_batches(batches, 99).await;

    assert_eq!(stats.count, 2);
    assert_eq!(stats.decode_error_count, 1);
    assert_eq!(stats.decoded_count, 1);
    assert_eq!(stats.sum, BigInt::from(100));
    assert_eq!(stats.per_event_counts.get("Transfer"), Some(&2));
    assert!(stats.counts_consistent());
}

#[tokio::test]
async fn feed_failure_keeps_partial_aggregates() {
    let batches = vec![
        MockFeed::batch(vec![transfer_log(100, 5), transfer_log(300, 9)], 1_000),
        Err(ScanError::feed("connection reset", Some(1_000), None)),
    ];
    let sink = CollectingSink::default();
    let report = controller(MockFeed::new(9_999, batches), sink.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.state, ScanState::Error);
    let failure = report.failure.expect("error state carries the failure");
    assert_eq!(failure.last_position(), Some(1_000));

    // Everything aggregated before the failure stays observable
    assert_eq!(report.snapshot.aggregates.sum, BigInt::from(400));
    assert_eq!(report.snapshot.cursor_position, 1_000);
    assert!(sink.lines().iter().any(|l| l.starts_with("Scan failed")));
}

#[tokio::test]
async fn regressive_next_position_is_a_feed_error() {
    let batches = vec![
        MockFeed::batch(vec![], 500),
        MockFeed::batch(vec![], 200),
    ];
    let sink = CollectingSink::default();
    let report = controller(MockFeed::new(999, batches), sink)
        .run()
        .await
        .unwrap();

    assert_eq!(report.state, ScanState::Error);
    let failure = report.failure.unwrap();
    assert!(matches!(failure, ScanError::FeedError { .. }));
    assert_eq!(failure.last_position(), Some(500));
}

#[tokio::test]
async fn pre_cancelled_scan_finishes_cleanly() {
    let token = CancellationToken::new();
    token.cancel();

    let batches = vec![MockFeed::batch(vec![transfer_log(100, 1)], 100)];
    let sink = CollectingSink::default();
    let report = controller(MockFeed::new(999, batches), sink.clone())
        .with_cancellation(token)
        .run()
        .await
        .unwrap();

    // No batch is processed once cancellation is observed
    assert_eq!(report.state, ScanState::Done);
    assert_eq!(report.snapshot.aggregates.count, 0);
    assert!(sink
        .lines()
        .iter()
        .any(|l| l.starts_with("Scan cancelled at block")));
}

#[tokio::test]
async fn throttle_gates_intermediate_snapshots() {
    let batches = vec![
        MockFeed::batch(vec![transfer_log(1, 1)], 100),
        MockFeed::batch(vec![transfer_log(2, 2)], 200),
        MockFeed::batch(vec![transfer_log(3, 3)], 300),
    ];
    let sink = CollectingSink::default();
    let report = ScanController::new(
        MockFeed::new(299, batches),
        sink.clone(),
        transfer_registry(),
        AggregateEngine::new(0),
        // Snapshot every 100 positions, log lines effectively never
        UpdateThrottle::new(100, u64::MAX),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(report.state, ScanState::Done);
    // One snapshot per batch plus the forced terminal snapshot
    let snapshots = sink.snapshots();
    assert_eq!(snapshots.len(), 4);

    // Progress is monotone and the counter invariant holds at every publish
    let mut last_position = 0;
    for snapshot in &snapshots {
        assert!(snapshot.cursor_position >= last_position);
        assert!(snapshot.aggregates.counts_consistent());
        last_position = snapshot.cursor_position;
    }
    assert_eq!(snapshots.last().unwrap().aggregates.count, 3);
}

#[tokio::test]
async fn ten_thousand_values_match_textbook_statistics() {
    // Values 1..=10000 streamed in 100-log batches: mean 5000.5 and
    // population variance (n^2 - 1) / 12 = 8_333_333.25, exact at the
    // 10^6 fixed-point scale.
    let batches: Vec<ScanResult<Option<LogBatch>>> = (0..100)
        .map(|chunk| {
            let logs = (1..=100)
                .map(|i| transfer_log(chunk * 100 + i, chunk * 10))
                .collect();
            MockFeed::batch(logs, (chunk + 1) * 10)
        })
        .collect();
    let stats = run_batches(batches, 999).await;

    assert_eq!(stats.decoded_count, 10_000);
    assert_eq!(stats.mean_scaled, BigInt::from(5_000_500_000u64));
    assert_eq!(stats.variance_scaled, BigInt::from(8_333_333_250_000u64));
    assert_eq!(stats.std_dev_floor(), BigInt::from(2_886));
}

#[tokio::test]
async fn deep_start_does_not_fire_gates_on_first_batch() {
    let batches = vec![MockFeed::batch(
        vec![transfer_log(5, 19_000_050)],
        19_000_100,
    )];
    let sink = CollectingSink::default();
    let report = ScanController::new(
        MockFeed::new(19_001_000, batches),
        sink.clone(),
        transfer_registry(),
        AggregateEngine::new(0),
        UpdateThrottle::new(10_000, 10_000),
    )
    .with_from_block(19_000_000)
    .run()
    .await
    .unwrap();

    assert_eq!(report.state, ScanState::Done);
    // 100 positions of progress against a 10,000 interval: only the forced
    // terminal snapshot is rendered, and no intermediate progress line
    assert_eq!(sink.snapshots().len(), 1);
    assert_eq!(sink.lines().len(), 2);
    assert_eq!(report.snapshot.aggregates.decoded_count, 1);
}

#[tokio::test]
async fn sink_failure_keeps_partial_aggregates() {
    let batches = vec![MockFeed::batch(
        vec![transfer_log(100, 5), transfer_log(300, 9)],
        1_000,
    )];
    let report = ScanController::new(
        MockFeed::new(9_999, batches),
        SnapshotRejectingSink,
        transfer_registry(),
        AggregateEngine::new(0),
        UpdateThrottle::new(100, u64::MAX),
    )
    .run()
    .await
    .unwrap();

    // The sink failing is not a boundary error; the report still carries
    // everything aggregated before the failure.
    assert_eq!(report.state, ScanState::Error);
    assert!(matches!(
        report.failure,
        Some(ScanError::DisplayError { .. })
    ));
    assert_eq!(report.snapshot.aggregates.sum, BigInt::from(400));
    assert_eq!(report.snapshot.cursor_position, 1_000);
}

#[tokio::test]
async fn empty_batches_advance_the_cursor() {
    let batches = vec![
        MockFeed::batch(vec![], 1_000),
        MockFeed::batch(vec![transfer_log(7, 1_500), transfer_log(7, 1_600)], 2_000),
    ];
    let sink = CollectingSink::default();
    let report = controller(MockFeed::new(1_999, batches), sink)
        .run()
        .await
        .unwrap();

    assert_eq!(report.state, ScanState::Done);
    assert_eq!(report.snapshot.cursor_position, 2_000);
    assert_eq!(report.snapshot.aggregates.decoded_count, 2);
    assert_eq!(report.snapshot.aggregates.variance_scaled, BigInt::from(0));
}
