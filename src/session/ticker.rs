//! Heartbeat ticker.
//!
//! Bumps the interim elapsed value once per period while a run is in
//! progress, so pollers see time moving before STOP arrives. The value
//! is replaced, not blended, when STOP is applied.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace};

use crate::shutdown::Shutdown;

use super::state::SessionHandle;

// ============================================================================
// Constants
// ============================================================================

/// Shortest accepted period; `interval_at` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

// ============================================================================
// Heartbeat
// ============================================================================

/// Periodic elapsed-time estimator.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    session: SessionHandle,
    period: Duration,
}

impl Heartbeat {
    /// Creates a heartbeat for `session` ticking every `period`.
    ///
    /// Periods below one millisecond are raised to one millisecond.
    #[must_use]
    pub fn new(session: SessionHandle, period: Duration) -> Self {
        Self {
            session,
            period: period.max(MIN_PERIOD),
        }
    }

    /// Milliseconds added per tick.
    #[inline]
    #[must_use]
    pub fn step_ms(&self) -> u64 {
        u64::try_from(self.period.as_millis()).unwrap_or(u64::MAX)
    }

    /// Spawns the ticker on the current tokio runtime.
    ///
    /// The task ends when `shutdown` is triggered.
    pub fn spawn(self, shutdown: Shutdown) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Runs the ticker until `shutdown` is triggered.
    pub async fn run(self, shutdown: Shutdown) {
        let step_ms = self.step_ms();
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(period_ms = step_ms, "Heartbeat started");

        loop {
            tokio::select! {
                () = shutdown.wait() => break,
                _ = interval.tick() => {
                    if self.session.tick(step_ms) {
                        trace!(step_ms, "Heartbeat tick");
                    }
                }
            }
        }

        debug!("Heartbeat stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================
