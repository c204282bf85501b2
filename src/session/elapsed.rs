//! Elapsed time decomposition.
//!
//! Splits a millisecond duration into minutes, seconds and milliseconds
//! for display and for the HTTP status payload.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

// ============================================================================
// Constants
// ============================================================================

const MILLIS_PER_SECOND: u64 = 1000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;

// ============================================================================
// ElapsedTime
// ============================================================================

/// A non-negative duration split into display units.
///
/// `seconds` is always below 60 and `milliseconds` below 1000; minutes
/// are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ElapsedTime {
    /// Whole minutes.
    pub minutes: u64,
    /// Seconds within the minute.
    pub seconds: u64,
    /// Milliseconds within the second.
    pub milliseconds: u64,
}

impl ElapsedTime {
    /// Decomposes a duration in milliseconds.
    #[must_use]
    pub const fn from_millis(total: u64) -> Self {
        let remainder = total % MILLIS_PER_MINUTE;
        Self {
            minutes: total / MILLIS_PER_MINUTE,
            seconds: remainder / MILLIS_PER_SECOND,
            milliseconds: remainder % MILLIS_PER_SECOND,
        }
    }

    /// Recombines into milliseconds.
    #[inline]
    #[must_use]
    pub const fn total_millis(&self) -> u64 {
        self.minutes * MILLIS_PER_MINUTE + self.seconds * MILLIS_PER_SECOND + self.milliseconds
    }
}

impl fmt::Display for ElapsedTime {
    /// Formats as `m:ss.mmm`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:02}.{:03}",
            self.minutes, self.seconds, self.milliseconds
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
