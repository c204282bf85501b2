//! Error types for the stopwatch bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use stopwatch_bridge::{Result, SessionHandle};
//!
//! fn example(session: &SessionHandle) -> Result<()> {
//!     let report = session.status_report()?;
//!     println!("{report:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Startup | [`Error::NoEndpoints`], [`Error::ConnectionsExhausted`] |
//! | Transport | [`Error::Connection`], [`Error::Serial`] |
//! | Protocol | [`Error::Protocol`], [`Error::InvalidTransition`] |
//! | Query | [`Error::NotYetCalculated`], [`Error::InvalidInterval`] |
//! | External | [`Error::Io`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when bridge configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Startup Errors
    // ========================================================================
    /// No serial endpoints were discovered.
    ///
    /// Fatal: there is no device to bridge.
    #[error("No serial endpoints found; is the timing device plugged in?")]
    NoEndpoints,

    /// Every discovered endpoint refused to open.
    ///
    /// Fatal: returned after all candidates were tried in discovery order.
    #[error("Could not open any of {attempts} serial endpoint(s)")]
    ConnectionsExhausted {
        /// Number of endpoints that were tried.
        attempts: usize,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// A single endpoint failed to open.
    #[error("Connection to {endpoint} failed: {message}")]
    Connection {
        /// Endpoint identifier (e.g. `/dev/ttyACM0`, `COM11`).
        endpoint: String,
        /// Description of the connection error.
        message: String,
    },

    /// Serial port error.
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed device line.
    ///
    /// Returned when a `START`/`STOP` line carries a bad timestamp.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the framing error.
        message: String,
    },

    /// Session event arrived in a state that cannot accept it.
    #[error("Cannot apply {event} while session is {from}")]
    InvalidTransition {
        /// Session status at the time of the event.
        from: String,
        /// The rejected event.
        event: String,
    },

    // ========================================================================
    // Query Errors
    // ========================================================================
    /// No timing cycle has completed yet.
    #[error("Elapsed time not yet calculated")]
    NotYetCalculated,

    /// The last cycle reported STOP before START.
    ///
    /// Happens on device clock wraparound or a garbled message.
    #[error("Elapsed time invalid: STOP {end_ms} precedes START {start_ms}")]
    InvalidInterval {
        /// Device clock at START.
        start_ms: u64,
        /// Device clock at STOP.
        end_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error for one endpoint.
    #[inline]
    pub fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a connections exhausted error.
    #[inline]
    pub fn connections_exhausted(attempts: usize) -> Self {
        Self::ConnectionsExhausted { attempts }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid transition error.
    #[inline]
    pub fn invalid_transition(from: impl Into<String>, event: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            event: event.into(),
        }
    }

    /// Creates an invalid interval error.
    #[inline]
    pub fn invalid_interval(start_ms: u64, end_ms: u64) -> Self {
        Self::InvalidInterval { start_ms, end_ms }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error must terminate the process.
    ///
    /// There is no recovery from these without plugging in or powering
    /// the device.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::NoEndpoints | Self::ConnectionsExhausted { .. }
        )
    }

    /// Returns `true` if this is a transport error.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionsExhausted { .. }
                | Self::NoEndpoints
                | Self::Serial(_)
        )
    }

    /// Returns `true` if this error is reported to HTTP clients as a 4xx.
    #[inline]
    #[must_use]
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            Self::NotYetCalculated | Self::InvalidInterval { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
