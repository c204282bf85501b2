//! Timing session state.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SessionHandle`] | Lock-guarded shared session record |
//! | [`Session`] | Plain snapshot of the record |
//! | [`StatusReport`] | Read-only projection served over HTTP |
//! | [`ElapsedTime`] | Minutes / seconds / milliseconds split |
//! | [`Heartbeat`] | Background interim-elapsed ticker |

// ============================================================================
// Submodules
// ============================================================================

/// Elapsed time decomposition.
pub mod elapsed;

/// Session record, transitions and status projection.
pub mod state;

/// Heartbeat ticker task.
pub mod ticker;

// ============================================================================
// Re-exports
// ============================================================================

pub use elapsed::ElapsedTime;
pub use state::{
    CompletedRun, ReportStatus, Session, SessionHandle, SessionStatus, StatusReport,
};
pub use ticker::Heartbeat;
