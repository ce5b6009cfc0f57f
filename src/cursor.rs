//! Stream cursor tracking scan position against the chain height.
//!
//! The cursor owns two numbers: the next block position to request from the
//! log feed and the chain height captured once at scan start. The upper bound
//! is deliberately frozen — the chain keeps growing during a scan, but the
//! scan's target is the height observed when it began, and reaching it ends
//! the scan.
//!
//! The cursor has no independent exhaustion test; the feed signals the end of
//! the stream by returning no batch. What the cursor does enforce is
//! monotonicity: the feed is assumed to hand back non-decreasing positions,
//! but a regression is rejected rather than silently accepted.

use crate::error::{ScanError, ScanResult};
use tracing::debug;

/// Tracks the next position to request from the log feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCursor {
    /// Next block position to request
    position: u64,

    /// Chain height captured at scan start
    upper_bound: u64,
}

impl StreamCursor {
    /// Create a cursor starting at `position` with the given frozen upper bound.
    #[must_use]
    pub fn new(position: u64, upper_bound: u64) -> Self {
        debug!(position, upper_bound, "Initializing stream cursor");
        Self {
            position,
            upper_bound,
        }
    }

    /// Current cursor position.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Chain height captured at scan start.
    #[must_use]
    pub const fn upper_bound(&self) -> u64 {
        self.upper_bound
    }

    /// Advance the cursor to the feed's reported next position.
    ///
    /// # Errors
    ///
    /// Returns a [`ScanError::CursorError`] if `next_position` is behind the
    /// current position. The feed is specified as monotone; a regression is a
    /// protocol violation, not something to paper over.
    pub fn advance(&mut self, next_position: u64) -> ScanResult<()> {
        if next_position < self.position {
            return Err(ScanError::cursor(format!(
                "regressive advance: feed reported next position {} behind cursor {}",
                next_position, self.position
            )));
        }
        self.position = next_position;
        Ok(())
    }

    /// Fraction of the scan completed, in `0.0..=1.0`.
    ///
    /// Reports `1.0` for an upper bound of zero (an empty chain is already
    /// fully scanned). Clamped at `1.0` when the feed overshoots the frozen
    /// height.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        if self.upper_bound == 0 {
            return 1.0;
        }
        (self.position as f64 / self.upper_bound as f64).min(1.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_moves_position() {
        let mut cursor = StreamCursor::new(0, 1_000);
        cursor.advance(250).unwrap();
        assert_eq!(cursor.position(), 250);
        cursor.advance(250).unwrap(); // equal position is allowed
        assert_eq!(cursor.position(), 250);
    }

    #[test]
    fn test_regressive_advance_rejected() {
        let mut cursor = StreamCursor::new(500, 1_000);
        let err = cursor.advance(499).unwrap_err();
        assert!(matches!(err, ScanError::CursorError { .. }));
        // Position is untouched after a rejected advance
        assert_eq!(cursor.position(), 500);
    }

    #[test]
    fn test_progress_fraction() {
        let mut cursor = StreamCursor::new(0, 1_000);
        assert!((cursor.progress() - 0.0).abs() < f64::EPSILON);
        cursor.advance(500).unwrap();
        assert!((cursor.progress() - 0.5).abs() < f64::EPSILON);
        cursor.advance(1_000).unwrap();
        assert!((cursor.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_clamped_past_upper_bound() {
        // The chain keeps growing while we scan; the feed may report a next
        // position past the frozen height.
        let mut cursor = StreamCursor::new(0, 1_000);
        cursor.advance(1_500).unwrap();
        assert!((cursor.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_zero_upper_bound() {
        let cursor = StreamCursor::new(0, 0);
        assert!((cursor.progress() - 1.0).abs() < f64::EPSILON);
    }
}
