//! Display update throttling keyed on cursor position deltas.
//!
//! A fast feed can push tens of thousands of positions per second; repainting
//! the display for each batch would burn more time rendering than scanning.
//! The throttle turns that high-frequency stream into a low-frequency stream
//! of display updates by tracking two independent watermarks: the last cursor
//! position at which a full statistics snapshot was rendered, and the last at
//! which a progress log line was appended.
//!
//! The final snapshot at stream exhaustion is not the throttle's job — the
//! controller publishes unconditionally once the feed ends, so the display
//! always reflects the complete scan.

/// Default cursor-position interval between statistics snapshots.
pub const SNAPSHOT_INTERVAL: u64 = 10_000;

/// Default cursor-position interval between progress log lines.
pub const LOG_INTERVAL: u64 = 50_000;

/// Stateful gate bounding display churn on a fast stream.
#[derive(Debug, Clone, Copy)]
pub struct UpdateThrottle {
    snapshot_interval: u64,
    log_interval: u64,
    last_snapshot_position: u64,
    last_log_position: u64,
}

impl UpdateThrottle {
    /// Create a throttle with explicit intervals.
    ///
    /// An interval of zero gates nothing: every call fires.
    #[must_use]
    pub const fn new(snapshot_interval: u64, log_interval: u64) -> Self {
        Self {
            snapshot_interval,
            log_interval,
            last_snapshot_position: 0,
            last_log_position: 0,
        }
    }

    /// Seed both watermarks at the scan's starting position.
    ///
    /// Without this a scan starting deep in the chain would treat the first
    /// batch as having moved the full distance from genesis and fire both
    /// gates immediately, whatever the intervals.
    pub fn align_to(&mut self, position: u64) {
        self.last_snapshot_position = position;
        self.last_log_position = position;
    }

    /// Whether a statistics snapshot should be rendered at `position`.
    ///
    /// Fires when the cursor has moved at least the snapshot interval past
    /// the watermark, and resets the watermark to `position` on firing.
    pub fn should_snapshot(&mut self, position: u64) -> bool {
        if position.saturating_sub(self.last_snapshot_position) >= self.snapshot_interval {
            self.last_snapshot_position = position;
            return true;
        }
        false
    }

    /// Whether a progress log line should be emitted at `position`.
    ///
    /// Same watermark pattern as [`should_snapshot`](Self::should_snapshot),
    /// tracked independently.
    pub fn should_log(&mut self, position: u64) -> bool {
        if position.saturating_sub(self.last_log_position) >= self.log_interval {
            self.last_log_position = position;
            return true;
        }
        false
    }
}

impl Default for UpdateThrottle {
    fn default() -> Self {
        Self::new(SNAPSHOT_INTERVAL, LOG_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_fires_after_cumulative_interval() {
        // Advances of 3000, 7000, 12000 (cumulative) against a 10000 interval:
        // no fire, no fire, fire on the third with the watermark reset.
        let mut throttle = UpdateThrottle::new(10_000, 50_000);

        assert!(!throttle.should_snapshot(3_000));
        assert!(!throttle.should_snapshot(7_000));
        assert!(throttle.should_snapshot(12_000));
        assert_eq!(throttle.last_snapshot_position, 12_000);

        // Immediately after firing the gate is closed again
        assert!(!throttle.should_snapshot(12_001));
        assert!(throttle.should_snapshot(22_000));
    }

    #[test]
    fn test_log_watermark_is_independent() {
        let mut throttle = UpdateThrottle::new(10_000, 50_000);

        assert!(throttle.should_snapshot(10_000));
        assert!(!throttle.should_log(10_000));
        assert!(throttle.should_log(50_000));
        assert_eq!(throttle.last_log_position, 50_000);
        assert_eq!(throttle.last_snapshot_position, 10_000);
    }

    #[test]
    fn test_zero_interval_always_fires() {
        let mut throttle = UpdateThrottle::new(0, 0);
        assert!(throttle.should_snapshot(0));
        assert!(throttle.should_snapshot(0));
        assert!(throttle.should_log(1));
    }

    #[test]
    fn test_aligned_watermarks_ignore_distance_from_genesis() {
        // A scan starting at block 19M must not fire on its first small
        // advance just because the watermarks began at zero.
        let mut throttle = UpdateThrottle::new(10_000, 50_000);
        throttle.align_to(19_000_000);

        assert!(!throttle.should_snapshot(19_000_100));
        assert!(!throttle.should_log(19_000_100));
        assert!(throttle.should_snapshot(19_010_000));
        assert!(throttle.should_log(19_050_000));
    }

    #[test]
    fn test_stationary_cursor_does_not_fire() {
        let mut throttle = UpdateThrottle::new(10_000, 50_000);
        assert!(throttle.should_snapshot(10_000));
        for _ in 0..10 {
            assert!(!throttle.should_snapshot(10_000));
        }
    }
}
