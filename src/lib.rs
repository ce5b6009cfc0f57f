//! Streaming blockchain event-log scanner with exact aggregation.
//!
//! `loggregate` pulls event logs from an EVM chain in bounded block batches,
//! matches them against a registered event signature, decodes one numeric
//! parameter from each match, and folds the values into exact running
//! aggregates (count, sum, min, max, mean, variance, standard deviation).
//! All arithmetic on observed values is arbitrary-precision integer math;
//! nothing is rounded until a snapshot is formatted for display.
//!
//! # Architecture
//!
//! ```text
//! LogFeed ──► ScanController ──► EventRegistry ──► ParameterDecoder
//!                  │                                      │
//!                  │◄─────────────────────────────────────┘
//!                  ▼
//!            AggregateEngine ──► UpdateThrottle ──► DisplaySink
//! ```
//!
//! The controller owns a [`cursor::StreamCursor`] over a block range frozen
//! at scan start, so a scan is a bounded job with monotone progress toward
//! 100%, never an open-ended tail.
//!
//! # Example
//!
//! ```no_run
//! use loggregate::aggregate::AggregateEngine;
//! use num_bigint::BigInt;
//!
//! let mut engine = AggregateEngine::new(0);
//! engine.record_match("Transfer");
//! engine.update(BigInt::from(100));
//! engine.record_match("Transfer");
//! engine.update(BigInt::from(300));
//!
//! let snapshot = engine.snapshot();
//! assert_eq!(snapshot.sum, BigInt::from(400));
//! assert_eq!(snapshot.mean_floor(), BigInt::from(200));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod cursor;
pub mod decode;
pub mod display;
pub mod error;
pub mod feed;
pub mod networks;
pub mod observability;
pub mod registry;
pub mod rpc;
pub mod scanner;
pub mod throttle;

pub use error::{ScanError, ScanResult};
