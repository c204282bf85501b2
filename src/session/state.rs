//! Shared session record and its lock.
//!
//! A single [`Session`] lives for the whole process. The protocol driver
//! moves it through its lifecycle, the heartbeat bumps the interim
//! elapsed value, and HTTP handlers read projections of it.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──arm──► Armed ──begin──► Running ──complete──► Completed
//!   └───────────begin─────────────▲                       │
//!                                 └──────arm / begin──────┘
//! ```
//!
//! # Locking
//!
//! Every transition changes all affected fields inside one critical
//! section of a [`parking_lot::Mutex`]. The lock is never held across a
//! blocking call or an `.await`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

use super::elapsed::ElapsedTime;

// ============================================================================
// SessionStatus
// ============================================================================

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Nothing started yet in this cycle.
    #[default]
    Idle,
    /// GO was sent; waiting for the device to report START.
    Armed,
    /// START received; waiting for STOP.
    Running,
    /// STOP received; result available.
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::Running => "running",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Session
// ============================================================================

/// The single timing session record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Current lifecycle state.
    pub status: SessionStatus,

    /// Device clock at START.
    pub start_ms: Option<u64>,

    /// Device clock at STOP. Only ever set after `start_ms`.
    pub end_ms: Option<u64>,

    /// Interim heartbeat estimate while running; `end - start` once
    /// completed. `None` before the first START and after an invalid run.
    pub elapsed_ms: Option<u64>,

    /// Set when the last run reported STOP before START.
    pub invalid: bool,
}

impl Session {
    /// Returns `true` while a run is in progress.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Projects the record into the HTTP status payload.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInterval`] if the last run was flagged invalid
    /// - [`Error::NotYetCalculated`] if no run has completed yet
    pub fn status_report(&self) -> Result<StatusReport> {
        if self.is_running() {
            return Ok(StatusReport::running());
        }

        if self.invalid {
            return Err(Error::invalid_interval(
                self.start_ms.unwrap_or_default(),
                self.end_ms.unwrap_or_default(),
            ));
        }

        match self.elapsed_ms {
            Some(ms) => Ok(StatusReport::stopped(ElapsedTime::from_millis(ms))),
            None => Err(Error::NotYetCalculated),
        }
    }
}

// ============================================================================
// StatusReport
// ============================================================================

/// Status marker in the HTTP payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportStatus {
    /// A run is in progress.
    #[serde(rename = "START")]
    Start,
    /// The last run finished.
    #[serde(rename = "STOP")]
    Stop,
}

/// Payload of `GET /elapsed-time`.
///
/// ```json
/// {"status": "STOP", "minutes": 0, "seconds": 3, "milliseconds": 530}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// `START` while running, `STOP` once finished.
    pub status: ReportStatus,
    /// Whole minutes, `null` while running.
    pub minutes: Option<u64>,
    /// Seconds within the minute, `null` while running.
    pub seconds: Option<u64>,
    /// Milliseconds within the second, `null` while running.
    pub milliseconds: Option<u64>,
}

impl StatusReport {
    /// Report for a run in progress.
    #[inline]
    #[must_use]
    pub const fn running() -> Self {
        Self {
            status: ReportStatus::Start,
            minutes: None,
            seconds: None,
            milliseconds: None,
        }
    }

    /// Report for a finished run.
    #[inline]
    #[must_use]
    pub const fn stopped(elapsed: ElapsedTime) -> Self {
        Self {
            status: ReportStatus::Stop,
            minutes: Some(elapsed.minutes),
            seconds: Some(elapsed.seconds),
            milliseconds: Some(elapsed.milliseconds),
        }
    }
}

// ============================================================================
// CompletedRun
// ============================================================================

/// Result of the STOP transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedRun {
    /// Device clock at START.
    pub start_ms: u64,
    /// Device clock at STOP.
    pub end_ms: u64,
}

impl CompletedRun {
    /// Returns the authoritative elapsed time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInterval`] if STOP precedes START.
    pub fn elapsed(&self) -> Result<ElapsedTime> {
        self.end_ms
            .checked_sub(self.start_ms)
            .map(ElapsedTime::from_millis)
            .ok_or_else(|| Error::invalid_interval(self.start_ms, self.end_ms))
    }
}

// ============================================================================
// SessionHandle
// ============================================================================

/// Cloneable handle to the lock-guarded session.
///
/// This is the only way to reach the [`Session`]; every clone refers to
/// the same record.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session", &*self.inner.lock())
            .finish()
    }
}

impl SessionHandle {
    /// Creates a handle to a fresh idle session.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a consistent copy of the whole record.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.lock().clone()
    }

    /// Returns the current status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.lock().status
    }

    /// Projects the record into the HTTP status payload under the lock.
    ///
    /// # Errors
    ///
    /// See [`Session::status_report`].
    pub fn status_report(&self) -> Result<StatusReport> {
        self.inner.lock().status_report()
    }

    /// Marks the session as armed after a GO was sent.
    ///
    /// The previous result stays readable until the next START.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] while a run is in progress.
    pub fn arm(&self) -> Result<()> {
        let mut session = self.inner.lock();
        if session.is_running() {
            return Err(Error::invalid_transition(session.status.to_string(), "GO"));
        }
        session.status = SessionStatus::Armed;
        debug!("Session armed");
        Ok(())
    }

    /// Applies START: overwrites the previous run and begins timing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if a run is already in progress.
    pub fn begin(&self, start_ms: u64) -> Result<()> {
        let mut session = self.inner.lock();
        if session.is_running() {
            return Err(Error::invalid_transition(
                session.status.to_string(),
                format!("START {start_ms}"),
            ));
        }
        *session = Session {
            status: SessionStatus::Running,
            start_ms: Some(start_ms),
            end_ms: None,
            elapsed_ms: Some(0),
            invalid: false,
        };
        debug!(start_ms, "Session running");
        Ok(())
    }

    /// Applies STOP: records the end, replaces the heartbeat estimate with
    /// `end - start`, and completes the run.
    ///
    /// A STOP earlier than START completes the run flagged invalid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless a run is in progress.
    pub fn complete(&self, end_ms: u64) -> Result<CompletedRun> {
        let mut session = self.inner.lock();
        let start_ms = match (session.status, session.start_ms) {
            (SessionStatus::Running, Some(start_ms)) => start_ms,
            (status, _) => {
                return Err(Error::invalid_transition(
                    status.to_string(),
                    format!("STOP {end_ms}"),
                ));
            }
        };

        let elapsed_ms = end_ms.checked_sub(start_ms);
        session.status = SessionStatus::Completed;
        session.end_ms = Some(end_ms);
        session.elapsed_ms = elapsed_ms;
        session.invalid = elapsed_ms.is_none();

        debug!(start_ms, end_ms, ?elapsed_ms, "Session completed");
        Ok(CompletedRun { start_ms, end_ms })
    }

    /// Adds `step_ms` to the interim elapsed value if running.
    ///
    /// Returns `true` if the session was running.
    pub fn tick(&self, step_ms: u64) -> bool {
        let mut session = self.inner.lock();
        if !session.is_running() {
            return false;
        }
        let elapsed = session.elapsed_ms.unwrap_or_default();
        session.elapsed_ms = Some(elapsed.saturating_add(step_ms));
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
