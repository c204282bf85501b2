//! Protocol driver state machine.
//!
//! The driver owns the serial transport, turns device lines into session
//! transitions and loops forever, one timing cycle at a time.
//!
//! # States
//!
//! ```text
//! AwaitingTrigger ──► AwaitingStart ──START──► AwaitingStop ──STOP──► Reporting
//!        ▲                                                                │
//!        └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines that do not fit the current state are noise: a STOP while
//! awaiting START and a START while awaiting STOP are both ignored.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tracing::{debug, info, trace, warn};

use crate::protocol::{DeviceMessage, HostCommand};
use crate::session::{CompletedRun, SessionHandle};
use crate::shutdown::Shutdown;
use crate::transport::LineTransport;

use super::trigger::{Trigger, TriggerDecision};

// ============================================================================
// DriverState
// ============================================================================

/// Protocol driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Deciding how the next cycle starts.
    AwaitingTrigger,
    /// Waiting for `START <ms>`.
    AwaitingStart,
    /// Waiting for `STOP <ms>`.
    AwaitingStop,
    /// Run finished; result not yet reported.
    Reporting(CompletedRun),
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingTrigger => "awaiting-trigger",
            Self::AwaitingStart => "awaiting-start",
            Self::AwaitingStop => "awaiting-stop",
            Self::Reporting(_) => "reporting",
        };
        f.write_str(name)
    }
}

/// Whether the loop continues after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep stepping.
    Continue,
    /// The trigger asked to quit.
    Quit,
}

/// Why [`ProtocolDriver::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The shutdown signal was triggered.
    Shutdown,
    /// The trigger asked to quit.
    Quit,
}

// ============================================================================
// ProtocolDriver
// ============================================================================

/// Drives the session from device lines.
pub struct ProtocolDriver<T, G> {
    /// Serial line source/sink, owned exclusively by the driver.
    transport: T,
    /// Per-cycle trigger decisions.
    trigger: G,
    /// Shared session record.
    session: SessionHandle,
    /// Current state.
    state: DriverState,
    /// Number of cycles reported.
    cycles: u64,
}

impl<T: LineTransport, G: Trigger> ProtocolDriver<T, G> {
    /// Creates a driver in [`DriverState::AwaitingTrigger`].
    pub fn new(transport: T, trigger: G, session: SessionHandle) -> Self {
        Self {
            transport,
            trigger,
            session,
            state: DriverState::AwaitingTrigger,
            cycles: 0,
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Returns the number of completed cycles.
    #[inline]
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Returns the transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs until `shutdown` is triggered or the trigger quits.
    ///
    /// Shutdown is checked between steps, so the loop notices it within one
    /// read timeout. Each step is a whole transition, never a partial one.
    pub fn run(&mut self, shutdown: &Shutdown) -> ExitReason {
        info!("Protocol driver started");

        let reason = loop {
            if shutdown.is_triggered() {
                break ExitReason::Shutdown;
            }
            if self.step() == Flow::Quit {
                break ExitReason::Quit;
            }
        };

        info!(?reason, cycles = self.cycles, "Protocol driver stopped");
        reason
    }

    /// Performs one state machine step.
    ///
    /// Awaiting states perform at most one `read_line`.
    pub fn step(&mut self) -> Flow {
        match self.state {
            DriverState::AwaitingTrigger => return self.await_trigger(),
            DriverState::AwaitingStart => self.await_start(),
            DriverState::AwaitingStop => self.await_stop(),
            DriverState::Reporting(run) => self.report(run),
        }
        Flow::Continue
    }

    fn await_trigger(&mut self) -> Flow {
        match self.trigger.next_cycle() {
            TriggerDecision::SendGo => {
                if self.transport.write_bytes(HostCommand::Go.as_bytes()) {
                    info!("Sent GO to device");
                    if let Err(e) = self.session.arm() {
                        warn!(error = %e, "Could not arm session");
                    }
                } else {
                    warn!("GO not delivered, waiting for device trigger instead");
                }
            }
            TriggerDecision::Listen => info!("Waiting for device trigger"),
            TriggerDecision::Quit => return Flow::Quit,
        }

        self.state = DriverState::AwaitingStart;
        Flow::Continue
    }

    fn await_start(&mut self) {
        match self.next_message() {
            Some(DeviceMessage::Start(start_ms)) => match self.session.begin(start_ms) {
                Ok(()) => {
                    info!(start_ms, "Start time received");
                    self.state = DriverState::AwaitingStop;
                }
                Err(e) => warn!(error = %e, "START rejected"),
            },
            Some(DeviceMessage::Stop(end_ms)) => {
                debug!(end_ms, "STOP without START ignored");
            }
            None => {}
        }
    }

    fn await_stop(&mut self) {
        match self.next_message() {
            Some(DeviceMessage::Stop(end_ms)) => match self.session.complete(end_ms) {
                Ok(run) => {
                    info!(end_ms, "End time received");
                    self.state = DriverState::Reporting(run);
                }
                Err(e) => warn!(error = %e, "STOP rejected"),
            },
            Some(DeviceMessage::Start(start_ms)) => {
                debug!(start_ms, "START while running ignored");
            }
            None => {}
        }
    }

    fn report(&mut self, run: CompletedRun) {
        match run.elapsed() {
            Ok(elapsed) => info!(
                elapsed_ms = elapsed.total_millis(),
                "Elapsed Time: {elapsed}"
            ),
            Err(e) => warn!(error = %e, "Run flagged invalid"),
        }
        self.cycles += 1;
        self.state = DriverState::AwaitingTrigger;
    }

    /// Reads one line and parses it. Noise, timeouts and malformed lines
    /// all yield `None`.
    fn next_message(&mut self) -> Option<DeviceMessage> {
        let line = self.transport.read_line()?;

        match DeviceMessage::parse(&line) {
            Ok(Some(message)) => {
                debug!(%message, state = %self.state, "Device message");
                Some(message)
            }
            Ok(None) => {
                trace!(line = %line, state = %self.state, "Ignoring device line");
                None
            }
            Err(e) => {
                warn!(error = %e, state = %self.state, "Malformed device line");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::thread;
    use std::time::Duration;

    use crate::session::{Session, SessionStatus, StatusReport};

    /// Transport replaying scripted lines; `None` entries are timeouts.
    #[derive(Default)]
    struct ScriptedTransport {
        lines: VecDeque<Option<String>>,
        written: Vec<u8>,
        accept_writes: bool,
    }

    impl ScriptedTransport {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| Some((*l).to_string())).collect(),
                written: Vec::new(),
                accept_writes: true,
            }
        }
    }

    impl LineTransport for ScriptedTransport {
        fn read_line(&mut self) -> Option<String> {
            self.lines.pop_front().flatten()
        }

        fn write_bytes(&mut self, bytes: &[u8]) -> bool {
            if self.accept_writes {
                self.written.extend_from_slice(bytes);
            }
            self.accept_writes
        }
    }

    /// Trigger that answers from a script, then quits.
    struct ScriptedTrigger(VecDeque<TriggerDecision>);

    impl Trigger for ScriptedTrigger {
        fn next_cycle(&mut self) -> TriggerDecision {
            self.0.pop_front().unwrap_or(TriggerDecision::Quit)
        }
    }

    fn driver(
        lines: &[&str],
        decisions: &[TriggerDecision],
    ) -> (ProtocolDriver<ScriptedTransport, ScriptedTrigger>, SessionHandle) {
        let session = SessionHandle::new();
        let driver = ProtocolDriver::new(
            ScriptedTransport::new(lines),
            ScriptedTrigger(decisions.iter().copied().collect()),
            session.clone(),
        );
        (driver, session)
    }

    fn step_n<T: LineTransport, G: Trigger>(driver: &mut ProtocolDriver<T, G>, n: usize) {
        for _ in 0..n {
            assert_eq!(driver.step(), Flow::Continue);
        }
    }

    #[test]
    fn test_full_cycle_short_run() {
        let (mut driver, session) = driver(&["START 1000", "STOP 4530"], &[TriggerDecision::Listen]);

        step_n(&mut driver, 1);
        assert_eq!(driver.state(), DriverState::AwaitingStart);

        step_n(&mut driver, 1);
        assert_eq!(driver.state(), DriverState::AwaitingStop);
        assert_eq!(session.status(), SessionStatus::Running);
        assert_eq!(session.status_report().unwrap(), StatusReport::running());

        step_n(&mut driver, 1);
        assert!(matches!(driver.state(), DriverState::Reporting(_)));
        assert_eq!(session.status(), SessionStatus::Completed);

        step_n(&mut driver, 1);
        assert_eq!(driver.state(), DriverState::AwaitingTrigger);
        assert_eq!(driver.cycles(), 1);

        let report = session.status_report().unwrap();
        assert_eq!(report.minutes, Some(0));
        assert_eq!(report.seconds, Some(3));
        assert_eq!(report.milliseconds, Some(530));
    }

    #[test]
    fn test_full_cycle_over_a_minute() {
        let (mut driver, session) =
            driver(&["START 59000", "STOP 125000"], &[TriggerDecision::Listen]);
        assert_eq!(driver.run(&Shutdown::new()), ExitReason::Quit);

        assert_eq!(session.snapshot().elapsed_ms, Some(66_000));
        let report = session.status_report().unwrap();
        assert_eq!(
            (report.minutes, report.seconds, report.milliseconds),
            (Some(1), Some(6), Some(0))
        );
    }

    #[test]
    fn test_near_miss_prefix_does_not_mutate_session() {
        let (mut driver, session) = driver(&["STAR 123"], &[TriggerDecision::Listen]);
        step_n(&mut driver, 2);

        assert_eq!(driver.state(), DriverState::AwaitingStart);
        assert_eq!(session.snapshot(), Session::default());
    }

    #[test]
    fn test_malformed_start_keeps_waiting() {
        let (mut driver, session) =
            driver(&["START abc", "START 200"], &[TriggerDecision::Listen]);
        step_n(&mut driver, 2);
        assert_eq!(driver.state(), DriverState::AwaitingStart);
        assert_eq!(session.status(), SessionStatus::Idle);

        step_n(&mut driver, 1);
        assert_eq!(driver.state(), DriverState::AwaitingStop);
        assert_eq!(session.snapshot().start_ms, Some(200));
    }

    #[test]
    fn test_malformed_stop_keeps_running() {
        let (mut driver, session) =
            driver(&["START 0", "STOP x", "STOP 10"], &[TriggerDecision::Listen]);
        step_n(&mut driver, 3);
        assert_eq!(driver.state(), DriverState::AwaitingStop);
        assert_eq!(session.status(), SessionStatus::Running);

        step_n(&mut driver, 1);
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    #[test]
    fn test_stop_without_start_is_noise() {
        let (mut driver, session) = driver(&["STOP 500"], &[TriggerDecision::Listen]);
        step_n(&mut driver, 2);

        assert_eq!(driver.state(), DriverState::AwaitingStart);
        assert_eq!(session.snapshot(), Session::default());
    }

    #[test]
    fn test_start_while_running_is_noise() {
        let (mut driver, session) =
            driver(&["START 100", "START 900", "STOP 1100"], &[TriggerDecision::Listen]);
        driver.run(&Shutdown::new());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.start_ms, Some(100));
        assert_eq!(snapshot.elapsed_ms, Some(1000));
    }

    #[test]
    fn test_timeouts_are_no_data() {
        let session = SessionHandle::new();
        let transport = ScriptedTransport {
            lines: vec![None, None, Some("START 5".to_string())].into(),
            written: Vec::new(),
            accept_writes: true,
        };
        let mut driver = ProtocolDriver::new(
            transport,
            ScriptedTrigger(vec![TriggerDecision::Listen].into()),
            session.clone(),
        );

        step_n(&mut driver, 3);
        assert_eq!(driver.state(), DriverState::AwaitingStart);
        step_n(&mut driver, 1);
        assert_eq!(driver.state(), DriverState::AwaitingStop);
    }

    #[test]
    fn test_go_is_sent_and_session_armed() {
        let (mut driver, session) = driver(&[], &[TriggerDecision::SendGo]);
        step_n(&mut driver, 1);

        assert_eq!(driver.transport().written, b"GO");
        assert_eq!(session.status(), SessionStatus::Armed);
        assert_eq!(driver.state(), DriverState::AwaitingStart);
    }

    #[test]
    fn test_failed_go_still_listens() {
        let session = SessionHandle::new();
        let transport = ScriptedTransport {
            accept_writes: false,
            ..ScriptedTransport::default()
        };
        let mut driver = ProtocolDriver::new(
            transport,
            ScriptedTrigger(vec![TriggerDecision::SendGo].into()),
            session.clone(),
        );

        step_n(&mut driver, 1);
        assert_eq!(driver.state(), DriverState::AwaitingStart);
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[test]
    fn test_invalid_interval_cycle_completes() {
        let (mut driver, session) = driver(&["START 5000", "STOP 1000"], &[TriggerDecision::Listen]);
        driver.run(&Shutdown::new());

        assert_eq!(driver.cycles(), 1);
        assert!(session.snapshot().invalid);
        assert!(session.status_report().is_err());
    }

    #[test]
    fn test_consecutive_cycles_overwrite() {
        let (mut driver, session) = driver(
            &["START 0", "STOP 1000", "START 5000", "STOP 7500"],
            &[TriggerDecision::Listen, TriggerDecision::SendGo],
        );
        assert_eq!(driver.run(&Shutdown::new()), ExitReason::Quit);

        assert_eq!(driver.cycles(), 2);
        assert_eq!(driver.transport().written, b"GO");
        assert_eq!(session.snapshot().elapsed_ms, Some(2500));
    }

    #[test]
    fn test_quit_ends_run_without_touching_session() {
        let (mut driver, session) = driver(&["START 1"], &[]);
        assert_eq!(driver.run(&Shutdown::new()), ExitReason::Quit);
        assert_eq!(session.snapshot(), Session::default());
    }

    #[test]
    fn test_pre_triggered_shutdown_exits_immediately() {
        let (mut driver, session) = driver(&["START 1"], &[TriggerDecision::Listen]);
        let shutdown = Shutdown::new();
        shutdown.trigger();

        assert_eq!(driver.run(&shutdown), ExitReason::Shutdown);
        assert_eq!(driver.state(), DriverState::AwaitingTrigger);
        assert_eq!(session.snapshot(), Session::default());
    }

    #[test]
    fn test_shutdown_from_another_thread() {
        let session = SessionHandle::new();
        let shutdown = Shutdown::new();
        let mut driver = ProtocolDriver::new(
            ScriptedTransport::default(),
            ScriptedTrigger(vec![TriggerDecision::Listen].into()),
            session,
        );

        let stopper = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                shutdown.trigger();
            })
        };

        assert_eq!(driver.run(&shutdown), ExitReason::Shutdown);
        stopper.join().unwrap();
    }

    #[test]
    fn test_step_continues_from_every_state() {
        let (mut driver, _session) = driver(&["START 10", "STOP 25"], &[TriggerDecision::Listen]);

        let mut visited = Vec::new();
        for _ in 0..4 {
            visited.push(driver.state().to_string());
            assert_eq!(driver.step(), Flow::Continue);
        }

        assert_eq!(
            visited,
            vec!["awaiting-trigger", "awaiting-start", "awaiting-stop", "reporting"]
        );
        assert_eq!(driver.state(), DriverState::AwaitingTrigger);
        assert_eq!(driver.step(), Flow::Quit);
    }
}
