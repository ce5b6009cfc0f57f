//! Error types for the event-log scanner.
//!
//! This module provides a unified error type [`ScanError`] covering every
//! failure that can occur while setting up and running a scan.
//!
//! # Design
//!
//! The error hierarchy follows the scan lifecycle:
//! - [`ScanError::SetupError`]: configuration, signature, and network
//!   directory problems detected before streaming starts
//! - [`ScanError::FeedError`]: transport or protocol failures from the log
//!   feed mid-stream (fatal, no retry)
//! - [`ScanError::DecodeError`]: malformed payload for an otherwise matched
//!   event (recoverable, absorbed by the controller)
//! - [`ScanError::CursorError`]: a regressive cursor advance handed back by
//!   the feed
//! - [`ScanError::DisplayError`]: the display sink failed to accept output
//!
//! Only setup errors cross the scanner's boundary as failures; feed and
//! display errors end the scan in its error state with the partial results
//! intact, and decode errors are counted and reported through diagnostics
//! while the scan continues.
//!
//! All errors implement [`std::error::Error`] and carry an optional source
//! for the full causal chain.

use std::fmt;

/// Result type alias using [`ScanError`].
pub type ScanResult<T> = Result<T, ScanError>;

/// Unified error type for the event-log scanner.
#[derive(Debug)]
pub enum ScanError {
    /// Configuration, signature parsing, or network directory errors.
    ///
    /// These are fatal and abort before the scan enters streaming.
    SetupError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transport or protocol failure from the log feed.
    ///
    /// Fatal mid-stream; the scan terminates without retry. Carries the last
    /// successfully processed cursor position so an external caller can
    /// restart from it.
    FeedError {
        /// Human-readable error message
        message: String,
        /// Last cursor position processed before the failure
        last_position: Option<u64>,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed log payload for a matched event.
    ///
    /// Recoverable: the log is excluded from numeric aggregates and the scan
    /// continues.
    DecodeError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The feed reported a next position behind the current cursor.
    ///
    /// The feed is assumed monotone but not trusted blindly; a regression is
    /// treated as a protocol violation.
    CursorError {
        /// Human-readable error message
        message: String,
    },

    /// The display sink rejected a snapshot or log line.
    ///
    /// Ends the scan in its error state; the aggregates accumulated before
    /// the sink failed stay in the final report.
    DisplayError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ScanError {
    /// Create a new setup error.
    ///
    /// # Example
    ///
    /// ```
    /// use loggregate::error::ScanError;
    ///
    /// let err = ScanError::setup("event signature is not parseable", None);
    /// assert!(matches!(err, ScanError::SetupError { .. }));
    /// ```
    #[must_use]
    pub fn setup(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SetupError {
            message: message.into(),
            source,
        }
    }

    /// Create a new feed error with the last good cursor position attached.
    ///
    /// # Example
    ///
    /// ```
    /// use loggregate::error::ScanError;
    ///
    /// let err = ScanError::feed("connection reset", Some(19_000_000), None);
    /// assert!(matches!(err, ScanError::FeedError { .. }));
    /// ```
    #[must_use]
    pub fn feed(
        message: impl Into<String>,
        last_position: Option<u64>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::FeedError {
            message: message.into(),
            last_position,
            source,
        }
    }

    /// Create a new decode error.
    #[must_use]
    pub fn decode(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::DecodeError {
            message: message.into(),
            source,
        }
    }

    /// Create a new cursor error.
    #[must_use]
    pub fn cursor(message: impl Into<String>) -> Self {
        Self::CursorError {
            message: message.into(),
        }
    }

    /// Create a new display error.
    #[must_use]
    pub fn display(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::DisplayError {
            message: message.into(),
            source,
        }
    }

    /// The last successful cursor position, for feed errors.
    ///
    /// Returns `None` for every other category.
    #[must_use]
    pub const fn last_position(&self) -> Option<u64> {
        match self {
            Self::FeedError { last_position, .. } => *last_position,
            _ => None,
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetupError { message, .. } => write!(f, "Setup error: {message}"),
            Self::FeedError {
                message,
                last_position,
                ..
            } => match last_position {
                Some(pos) => write!(f, "Feed error at position {pos}: {message}"),
                None => write!(f, "Feed error: {message}"),
            },
            Self::DecodeError { message, .. } => write!(f, "Decode error: {message}"),
            Self::CursorError { message } => write!(f, "Cursor error: {message}"),
            Self::DisplayError { message, .. } => write!(f, "Display error: {message}"),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SetupError { source, .. }
            | Self::FeedError { source, .. }
            | Self::DecodeError { source, .. }
            | Self::DisplayError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::CursorError { .. } => None,
        }
    }
}
