//! Device and host messages.
//!
//! Device lines are whitespace separated. The first token must be exactly
//! `START` or `STOP`; the second is the device clock in milliseconds.
//! Tokens after the timestamp are ignored.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

const START_TOKEN: &str = "START";
const STOP_TOKEN: &str = "STOP";

// ============================================================================
// DeviceMessage
// ============================================================================

/// A framed message from the timing device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMessage {
    /// Timing started at this device clock value (ms).
    Start(u64),
    /// Timing stopped at this device clock value (ms).
    Stop(u64),
}

impl DeviceMessage {
    /// Parses one device line.
    ///
    /// Returns `Ok(None)` for noise (any line whose first token is not
    /// exactly `START` or `STOP`, including blank lines).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if a `START`/`STOP` line has a missing
    /// or non-numeric timestamp.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut tokens = line.split_whitespace();

        let constructor: fn(u64) -> Self = match tokens.next() {
            Some(START_TOKEN) => Self::Start,
            Some(STOP_TOKEN) => Self::Stop,
            _ => return Ok(None),
        };

        let raw = tokens
            .next()
            .ok_or_else(|| Error::protocol(format!("Missing timestamp in '{line}'")))?;

        let millis = raw
            .parse::<u64>()
            .map_err(|e| Error::protocol(format!("Bad timestamp '{raw}' in '{line}': {e}")))?;

        Ok(Some(constructor(millis)))
    }
}

impl fmt::Display for DeviceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start(ms) => write!(f, "{START_TOKEN} {ms}"),
            Self::Stop(ms) => write!(f, "{STOP_TOKEN} {ms}"),
        }
    }
}

// ============================================================================
// HostCommand
// ============================================================================

/// A command sent from the bridge to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Remotely fire the device's start condition.
    Go,
}

impl HostCommand {
    /// Returns the raw wire bytes (no terminator).
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Go => b"GO",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
