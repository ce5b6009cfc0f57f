//! Running statistical aggregates over decoded event values.
//!
//! The engine owns the counters and exact running sums for one numeric
//! series. Tracked quantities are on-chain token amounts which routinely
//! exceed 64 bits, and their squares exceed 256 bits, so every accumulator is
//! an arbitrary-precision [`BigInt`]. No floating point enters the statistics
//! path: the standard deviation uses an exact integer square root.
//!
//! # Derivation, not accumulation
//!
//! Mean, variance, and standard deviation are never stored. They are derived
//! on demand in [`AggregateEngine::snapshot`] from the exact `sum` and
//! `sum_of_squares`, in a single scaled-rational pass. Re-deriving variance
//! every tick from previously truncated intermediates accumulates rounding
//! error over a long scan; deriving once from exact sums cannot drift.
//!
//! Derived statistics are fixed-point values scaled by `10^`[`STAT_SCALE`].
//! The configured token `decimals` are applied exactly once, when a value is
//! formatted for display — never while accumulating.
//!
//! # Counters
//!
//! The invariant `count == Σ per_event_counts + unknown_count` holds after
//! every observation. The divisor for mean and variance is `decoded_count`,
//! the number of values that actually reached [`AggregateEngine::update`]:
//! unknown logs and matched-but-undecodable logs are counted separately and
//! contribute nothing numeric.

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use std::collections::BTreeMap;
use tracing::debug;

/// Fixed-point scale (decimal digits) for derived statistics.
///
/// Mean, variance, and standard deviation in a snapshot are integers scaled
/// by `10^STAT_SCALE`, giving six digits of sub-unit precision regardless of
/// the magnitude of the tracked values.
pub const STAT_SCALE: u32 = 6;

/// `10^exp` as a [`BigInt`].
fn pow10(exp: u32) -> BigInt {
    let mut out = BigInt::one();
    for _ in 0..exp {
        out *= 10;
    }
    out
}

/// Running aggregate state for one numeric event parameter.
///
/// Mutated exclusively by the scan controller's loop body; never shared.
#[derive(Debug, Clone)]
pub struct AggregateEngine {
    /// Total logs observed (matched + unknown)
    count: u64,

    /// Logs whose primary topic matched no registered event
    unknown_count: u64,

    /// Matched logs whose payload failed to decode
    decode_error_count: u64,

    /// Values that reached `update` (the divisor for mean/variance)
    decoded_count: u64,

    /// Matched-log counts keyed by event name
    per_event_counts: BTreeMap<String, u64>,

    /// Exact, unscaled running sum
    sum: BigInt,

    /// Exact, unscaled running sum of squares
    sum_of_squares: BigInt,

    /// Smallest decoded value, unset until the first update
    min: Option<BigInt>,

    /// Largest decoded value, unset until the first update
    max: Option<BigInt>,

    /// Token decimal scale, applied only at display time
    decimals: u32,
}

impl AggregateEngine {
    /// Create an empty engine for values carrying `decimals` token decimals.
    #[must_use]
    pub fn new(decimals: u32) -> Self {
        debug!(decimals, "Initializing aggregate engine");
        Self {
            count: 0,
            unknown_count: 0,
            decode_error_count: 0,
            decoded_count: 0,
            per_event_counts: BTreeMap::new(),
            sum: BigInt::zero(),
            sum_of_squares: BigInt::zero(),
            min: None,
            max: None,
            decimals,
        }
    }

    /// Record a log whose primary topic matched no registered event.
    pub fn record_unknown(&mut self) {
        self.count += 1;
        self.unknown_count += 1;
    }

    /// Record a log matched to the named registered event.
    ///
    /// Call once per matched log, before attempting to decode it.
    pub fn record_match(&mut self, event_name: &str) {
        self.count += 1;
        *self
            .per_event_counts
            .entry(event_name.to_owned())
            .or_insert(0) += 1;
    }

    /// Record a matched log whose payload could not be decoded.
    ///
    /// The log stays in its per-event count (it did match); it is only
    /// excluded from the numeric aggregates.
    pub fn record_decode_error(&mut self) {
        self.decode_error_count += 1;
    }

    /// Fold one successfully decoded value into the running aggregates.
    ///
    /// The single mutating numeric operation: exact sum and sum-of-squares
    /// accumulation, then min/max tracking. Values arrive in feed order.
    pub fn update(&mut self, value: BigInt) {
        self.decoded_count += 1;
        self.sum += &value;
        self.sum_of_squares += &value * &value;

        match &self.min {
            Some(current) if *current <= value => {}
            _ => self.min = Some(value.clone()),
        }
        match &self.max {
            Some(current) if *current >= value => {}
            _ => self.max = Some(value),
        }
    }

    /// Total logs observed so far.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Number of values folded into the numeric aggregates.
    #[must_use]
    pub const fn decoded_count(&self) -> u64 {
        self.decoded_count
    }

    /// Derive a read-only statistics snapshot from the current exact state.
    ///
    /// Pure with respect to the engine: calling this never mutates anything,
    /// and repeated calls on identical state produce identical snapshots.
    ///
    /// With zero decoded values the derived statistics are zero and min/max
    /// stay unset; there is no division by zero.
    #[must_use]
    pub fn snapshot(&self) -> AggregateSnapshot {
        let scale = pow10(STAT_SCALE);

        let (mean_scaled, variance_scaled, std_dev_scaled) = if self.decoded_count == 0 {
            (BigInt::zero(), BigInt::zero(), BigInt::zero())
        } else {
            let n = BigInt::from(self.decoded_count);
            let scale_sq = &scale * &scale;

            // One scaled-rational pass over the exact sums. Intermediate
            // values carry scale^2 so the subtraction below loses nothing.
            let mean_scaled = &self.sum * &scale / &n;
            let second_moment = &self.sum_of_squares * &scale_sq / &n;
            let mut variance_sq = second_moment - &mean_scaled * &mean_scaled;

            // Truncation in the two divisions above can push a near-zero
            // variance fractionally negative; clamp before the square root.
            if variance_sq.is_negative() {
                variance_sq = BigInt::zero();
            }

            let std_dev_scaled = variance_sq.sqrt();
            let variance_scaled = variance_sq / &scale;
            (mean_scaled, variance_scaled, std_dev_scaled)
        };

        AggregateSnapshot {
            count: self.count,
            unknown_count: self.unknown_count,
            decode_error_count: self.decode_error_count,
            decoded_count: self.decoded_count,
            per_event_counts: self.per_event_counts.clone(),
            sum: self.sum.clone(),
            min: self.min.clone(),
            max: self.max.clone(),
            mean_scaled,
            variance_scaled,
            std_dev_scaled,
            decimals: self.decimals,
        }
    }
}

/// Read-only copy of the aggregate statistics at one observation point.
///
/// A value object handed to the display sink; holds no references into the
/// engine. Derived statistics are fixed-point integers scaled by
/// `10^`[`STAT_SCALE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSnapshot {
    /// Total logs observed
    pub count: u64,
    /// Logs with an unregistered or missing primary topic
    pub unknown_count: u64,
    /// Matched logs whose payload failed to decode
    pub decode_error_count: u64,
    /// Values included in the numeric aggregates
    pub decoded_count: u64,
    /// Matched-log counts keyed by event name
    pub per_event_counts: BTreeMap<String, u64>,
    /// Exact sum of decoded values
    pub sum: BigInt,
    /// Smallest decoded value, `None` while no value has been decoded
    pub min: Option<BigInt>,
    /// Largest decoded value, `None` while no value has been decoded
    pub max: Option<BigInt>,
    /// Mean, scaled by `10^STAT_SCALE`
    pub mean_scaled: BigInt,
    /// Population variance, scaled by `10^STAT_SCALE`
    pub variance_scaled: BigInt,
    /// Standard deviation (floor of the exact root), scaled by `10^STAT_SCALE`
    pub std_dev_scaled: BigInt,
    /// Token decimal scale for display formatting
    pub decimals: u32,
}

impl AggregateSnapshot {
    /// Mean truncated to whole units (scale removed).
    #[must_use]
    pub fn mean_floor(&self) -> BigInt {
        &self.mean_scaled / pow10(STAT_SCALE)
    }

    /// Variance truncated to whole squared units.
    #[must_use]
    pub fn variance_floor(&self) -> BigInt {
        &self.variance_scaled / pow10(STAT_SCALE)
    }

    /// Standard deviation truncated to whole units.
    #[must_use]
    pub fn std_dev_floor(&self) -> BigInt {
        &self.std_dev_scaled / pow10(STAT_SCALE)
    }

    /// Check the counter invariant: total = Σ per-event + unknown.
    #[must_use]
    pub fn counts_consistent(&self) -> bool {
        let matched: u64 = self.per_event_counts.values().sum();
        self.count == matched + self.unknown_count
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn engine_with(values: &[i64]) -> AggregateEngine {
        let mut engine = AggregateEngine::new(0);
        for v in values {
            engine.record_match("Transfer");
            engine.update(BigInt::from(*v));
        }
        engine
    }

    #[test]
    fn test_two_value_statistics() {
        // 100 and 300: mean 200, variance 10000, std dev 100
        let engine = engine_with(&[100, 300]);
        let snap = engine.snapshot();

        assert_eq!(snap.count, 2);
        assert_eq!(snap.decoded_count, 2);
        assert_eq!(snap.sum, BigInt::from(400));
        assert_eq!(snap.min, Some(BigInt::from(100)));
        assert_eq!(snap.max, Some(BigInt::from(300)));
        assert_eq!(snap.mean_floor(), BigInt::from(200));
        assert_eq!(snap.variance_floor(), BigInt::from(10_000));
        assert_eq!(snap.std_dev_floor(), BigInt::from(100));
    }

    #[test]
    fn test_empty_snapshot_has_no_extremes() {
        let engine = AggregateEngine::new(18);
        let snap = engine.snapshot();

        assert_eq!(snap.count, 0);
        assert_eq!(snap.decoded_count, 0);
        assert_eq!(snap.min, None);
        assert_eq!(snap.max, None);
        assert_eq!(snap.mean_scaled, BigInt::zero());
        assert_eq!(snap.variance_scaled, BigInt::zero());
        assert_eq!(snap.std_dev_scaled, BigInt::zero());
        assert!(snap.counts_consistent());
    }

    #[test]
    fn test_single_value_sets_both_extremes() {
        let engine = engine_with(&[42]);
        let snap = engine.snapshot();
        assert_eq!(snap.min, Some(BigInt::from(42)));
        assert_eq!(snap.max, Some(BigInt::from(42)));
        assert_eq!(snap.mean_floor(), BigInt::from(42));
        assert_eq!(snap.variance_scaled, BigInt::zero());
    }

    #[test]
    fn test_unknown_logs_leave_aggregates_untouched() {
        let mut engine = engine_with(&[100, 300]);
        let before = engine.snapshot();
        engine.record_unknown();
        engine.record_unknown();
        let after = engine.snapshot();

        assert_eq!(after.count, 4);
        assert_eq!(after.unknown_count, 2);
        assert_eq!(after.sum, before.sum);
        assert_eq!(after.mean_scaled, before.mean_scaled);
        assert_eq!(after.variance_scaled, before.variance_scaled);
        assert!(after.counts_consistent());
    }

    #[test]
    fn test_decode_errors_excluded_from_numeric_aggregates() {
        let mut engine = engine_with(&[100]);
        engine.record_match("Transfer");
        engine.record_decode_error();
        let snap = engine.snapshot();

        assert_eq!(snap.count, 2);
        assert_eq!(snap.decode_error_count, 1);
        assert_eq!(snap.decoded_count, 1);
        assert_eq!(snap.sum, BigInt::from(100));
        assert!(snap.counts_consistent());
    }

    #[test]
    fn test_values_past_64_bits() {
        // 2^100 twice: the sum needs 101 bits, the sum of squares 201 bits.
        let big = BigInt::from(1u8) << 100usize;
        let mut engine = AggregateEngine::new(0);
        engine.record_match("Deposit");
        engine.update(big.clone());
        engine.record_match("Deposit");
        engine.update(big.clone());

        let snap = engine.snapshot();
        assert_eq!(snap.sum, &big * BigInt::from(2));
        assert_eq!(snap.mean_floor(), big);
        assert_eq!(snap.variance_scaled, BigInt::zero());
        assert_eq!(snap.std_dev_scaled, BigInt::zero());
    }

    #[test]
    fn test_textbook_variance_on_larger_input() {
        // 1..=100: mean 50.5, population variance (100^2 - 1) / 12 = 833.25
        let values: Vec<i64> = (1..=100).collect();
        let engine = engine_with(&values);
        let snap = engine.snapshot();

        assert_eq!(snap.mean_scaled, BigInt::from(50_500_000));
        assert_eq!(snap.variance_scaled, BigInt::from(833_250_000));
        // floor(sqrt(833.25)) at 10^6 scale
        assert_eq!(snap.std_dev_floor(), BigInt::from(28));
    }

    #[test]
    fn test_variance_on_ten_thousand_values() {
        // 1..=10000: mean (n + 1) / 2 = 5000.5, population variance
        // (n^2 - 1) / 12 = 8_333_333.25, both exact at the 10^6 scale.
        let values: Vec<i64> = (1..=10_000).collect();
        let engine = engine_with(&values);
        let snap = engine.snapshot();

        assert_eq!(snap.decoded_count, 10_000);
        assert_eq!(snap.mean_scaled, BigInt::from(5_000_500_000u64));
        assert_eq!(snap.variance_scaled, BigInt::from(8_333_333_250_000u64));
        // floor(sqrt(8333333.25)) = 2886
        assert_eq!(snap.std_dev_floor(), BigInt::from(2_886));
    }

    #[test]
    fn test_variance_of_distinct_values_past_64_bits() {
        // 2^100 and 3 * 2^100: mean 2 * 2^100, variance (2^100)^2 = 2^200,
        // standard deviation 2^100, all exact at the fixed statistics scale.
        let base = BigInt::from(1u8) << 100usize;
        let mut engine = AggregateEngine::new(0);
        engine.record_match("Deposit");
        engine.update(base.clone());
        engine.record_match("Deposit");
        engine.update(&base * BigInt::from(3));

        let scale = BigInt::from(1_000_000);
        let snap = engine.snapshot();
        assert_eq!(snap.sum, &base * BigInt::from(4));
        assert_eq!(snap.mean_floor(), &base * BigInt::from(2));
        assert_eq!(
            snap.variance_scaled,
            (BigInt::from(1u8) << 200usize) * &scale
        );
        assert_eq!(snap.std_dev_scaled, &base * &scale);
        assert_eq!(snap.std_dev_floor(), base);
    }

    #[test]
    fn test_negative_values() {
        let engine = engine_with(&[-300, -100]);
        let snap = engine.snapshot();
        assert_eq!(snap.min, Some(BigInt::from(-300)));
        assert_eq!(snap.max, Some(BigInt::from(-100)));
        assert_eq!(snap.mean_floor(), BigInt::from(-200));
        assert_eq!(snap.variance_floor(), BigInt::from(10_000));
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let engine = engine_with(&[7, 11, 13]);
        let first = engine.snapshot();
        let second = engine.snapshot();
        assert_eq!(first, second);
    }

    #[test]
    fn test_per_event_counts() {
        let mut engine = AggregateEngine::new(0);
        engine.record_match("Transfer");
        engine.record_match("Transfer");
        engine.record_match("Approval");
        engine.record_unknown();
        let snap = engine.snapshot();

        assert_eq!(snap.per_event_counts.get("Transfer"), Some(&2));
        assert_eq!(snap.per_event_counts.get("Approval"), Some(&1));
        assert_eq!(snap.count, 4);
        assert!(snap.counts_consistent());
    }
}
