//! Display sink boundary and the terminal renderer.
//!
//! The scanner publishes [`DisplaySnapshot`] values — copies, never live
//! references into engine state — to a [`DisplaySink`] at throttled
//! intervals, plus exactly once more at stream end. [`TerminalDisplay`]
//! renders them as a progress bar and statistics panel on stdout using the
//! `colored` crate; tests substitute collecting sinks.
//!
//! Number formatting follows the conventions of the scanner's display:
//! thousands separators everywhere, and the configured token `decimals`
//! applied here — and only here — by truncating to whole units.

use crate::aggregate::{AggregateSnapshot, STAT_SCALE};
use crate::error::{ScanError, ScanResult};
use async_trait::async_trait;
use colored::Colorize;
use num_bigint::BigInt;
use num_traits::Signed;
use std::io::Write;
use std::time::Duration;

/// A value object copied out of the engine for presentation.
#[derive(Debug, Clone)]
pub struct DisplaySnapshot {
    /// Cursor position at the observation point
    pub cursor_position: u64,
    /// Chain height captured at scan start
    pub upper_bound: u64,
    /// Scan progress fraction in `0.0..=1.0`
    pub progress: f64,
    /// Aggregate statistics at the observation point
    pub aggregates: AggregateSnapshot,
    /// Wall-clock time since the scan started
    pub elapsed: Duration,
    /// Observed logs per second since the scan started
    pub logs_per_second: f64,
}

/// Receives throttled snapshots and log lines from the scanner.
///
/// Implementations must tolerate irregular call intervals and must not
/// retain references into engine-owned state (snapshots are owned copies,
/// so there is nothing to retain).
#[async_trait]
pub trait DisplaySink: Send {
    /// Render a full statistics snapshot.
    async fn render_snapshot(&mut self, snapshot: &DisplaySnapshot) -> ScanResult<()>;

    /// Append a single progress log line.
    async fn append_log_line(&mut self, line: &str) -> ScanResult<()>;
}

/// Insert thousands separators into a plain digit string.
fn with_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - offset) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a plain counter with thousands separators.
#[must_use]
pub fn format_count(value: u64) -> String {
    with_thousands(&value.to_string())
}

/// Format a raw big-integer amount, truncating away `decimals` digits.
///
/// `1_500_000_000_000_000_000` with 18 decimals renders as `"1"`; values
/// smaller than one whole unit render as `"0"`.
#[must_use]
pub fn format_amount(value: &BigInt, decimals: u32) -> String {
    let mut digits = value.magnitude().to_string();
    let cut = decimals as usize;
    if cut > 0 {
        if digits.len() <= cut {
            digits = "0".to_owned();
        } else {
            digits.truncate(digits.len() - cut);
        }
    }
    let formatted = with_thousands(&digits);
    if value.is_negative() && formatted != "0" {
        format!("-{formatted}")
    } else {
        formatted
    }
}

/// Format a derived statistic carrying the `10^STAT_SCALE` fixed-point scale.
#[must_use]
pub fn format_scaled(value: &BigInt, decimals: u32) -> String {
    format_amount(value, STAT_SCALE + decimals)
}

/// Render an ASCII progress bar of `width` cells.
fn progress_bar(progress: f64, width: usize) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = ((progress.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    let mut bar = String::with_capacity(width);
    for _ in 0..filled {
        bar.push('█');
    }
    for _ in filled..width {
        bar.push('░');
    }
    bar
}

/// Stdout renderer for scan progress and statistics.
pub struct TerminalDisplay {
    title: String,
    param_label: String,
    bar_width: usize,
}

impl TerminalDisplay {
    /// Create a terminal display titled `title`, labelling the statistics
    /// panel with the tracked parameter.
    #[must_use]
    pub fn new(title: impl Into<String>, param_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            param_label: param_label.into(),
            bar_width: 40,
        }
    }

    fn write_snapshot(&self, out: &mut impl Write, snap: &DisplaySnapshot) -> std::io::Result<()> {
        let agg = &snap.aggregates;
        let d = agg.decimals;

        writeln!(out)?;
        writeln!(
            out,
            "{}  {} {:.2}%  {} {}/{}",
            progress_bar(snap.progress, self.bar_width).cyan(),
            "progress".dimmed(),
            snap.progress * 100.0,
            "block".dimmed(),
            format_count(snap.cursor_position),
            format_count(snap.upper_bound),
        )?;
        writeln!(
            out,
            "{} — {}",
            self.title.yellow().bold(),
            self.param_label.yellow()
        )?;
        writeln!(out, "  {:<12} {}", "Count".cyan(), format_count(agg.count))?;
        for (event, count) in &agg.per_event_counts {
            writeln!(out, "  {:<12} {}", event.as_str().cyan(), format_count(*count))?;
        }
        writeln!(
            out,
            "  {:<12} {}",
            "Unknown".cyan(),
            format_count(agg.unknown_count)
        )?;
        if agg.decode_error_count > 0 {
            writeln!(
                out,
                "  {:<12} {}",
                "DecodeErrs".red(),
                format_count(agg.decode_error_count)
            )?;
        }
        writeln!(
            out,
            "  {:<12} {}",
            "Sum".cyan(),
            format_amount(&agg.sum, d)
        )?;
        let unset = "-".dimmed().to_string();
        writeln!(
            out,
            "  {:<12} {}",
            "Min".cyan(),
            agg.min
                .as_ref()
                .map_or_else(|| unset.clone(), |v| format_amount(v, d))
        )?;
        writeln!(
            out,
            "  {:<12} {}",
            "Max".cyan(),
            agg.max
                .as_ref()
                .map_or_else(|| unset.clone(), |v| format_amount(v, d))
        )?;
        writeln!(
            out,
            "  {:<12} {}",
            "Avg".cyan(),
            format_scaled(&agg.mean_scaled, d)
        )?;
        writeln!(
            out,
            "  {:<12} {}",
            "Variance".cyan(),
            format_scaled(&agg.variance_scaled, d.saturating_mul(2))
        )?;
        writeln!(
            out,
            "  {:<12} {}",
            "StdDev".cyan(),
            format_scaled(&agg.std_dev_scaled, d)
        )?;
        writeln!(
            out,
            "  {:<12} {:.1}s  {:<12} {:.1} logs/s",
            "Elapsed".cyan(),
            snap.elapsed.as_secs_f64(),
            "Speed".cyan(),
            snap.logs_per_second
        )?;
        Ok(())
    }
}

#[async_trait]
impl DisplaySink for TerminalDisplay {
    async fn render_snapshot(&mut self, snapshot: &DisplaySnapshot) -> ScanResult<()> {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        self.write_snapshot(&mut lock, snapshot)
            .map_err(|e| ScanError::display("failed to write snapshot", Some(Box::new(e))))
    }

    async fn append_log_line(&mut self, line: &str) -> ScanResult<()> {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        writeln!(lock, "{} {line}", "›".cyan())
            .map_err(|e| ScanError::display("failed to write log line", Some(Box::new(e))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_amount_truncates_decimals() {
        let wei = BigInt::from(1_500_000_000_000_000_000u64);
        assert_eq!(format_amount(&wei, 18), "1");
        assert_eq!(format_amount(&wei, 0), "1,500,000,000,000,000,000");
    }

    #[test]
    fn test_amount_below_one_unit() {
        assert_eq!(format_amount(&BigInt::from(999), 18), "0");
    }

    #[test]
    fn test_amount_negative() {
        assert_eq!(format_amount(&BigInt::from(-2_500), 3), "-2");
        // Truncation toward zero drops the sign entirely
        assert_eq!(format_amount(&BigInt::from(-999), 3), "0");
    }

    #[test]
    fn test_scaled_statistic_formatting() {
        // 200 units at the fixed statistics scale, no token decimals
        let mean_scaled = BigInt::from(200_000_000);
        assert_eq!(format_scaled(&mean_scaled, 0), "200");
    }

    #[test]
    fn test_progress_bar_bounds() {
        assert_eq!(progress_bar(0.0, 4), "░░░░");
        assert_eq!(progress_bar(0.5, 4), "██░░");
        assert_eq!(progress_bar(1.0, 4), "████");
        assert_eq!(progress_bar(2.0, 4), "████");
    }
}
