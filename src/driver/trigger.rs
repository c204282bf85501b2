//! Per-cycle trigger decisions.
//!
//! Before each timing cycle the driver asks a [`Trigger`] whether to send
//! `GO` to the device, just listen for the device's own START, or stop.

// ============================================================================
// Imports
// ============================================================================

use std::io::{BufRead, BufReader, Stdin, Stdout, Write};

use tracing::warn;

use crate::config::TriggerMode;

// ============================================================================
// Constants
// ============================================================================

const PROMPT: &str =
    "Press '1' to send 'Go' signal or wait for button press on the device (press ENTER): ";

// ============================================================================
// TriggerDecision
// ============================================================================

/// What the driver does at the start of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Send `GO` and arm the session.
    SendGo,
    /// Wait for the device to start on its own.
    Listen,
    /// End the driver loop.
    Quit,
}

// ============================================================================
// Trigger
// ============================================================================

/// Source of per-cycle trigger decisions.
///
/// Called from the driver thread; implementations may block.
pub trait Trigger: Send {
    /// Decides how the next cycle starts.
    fn next_cycle(&mut self) -> TriggerDecision;
}

impl<G: Trigger + ?Sized> Trigger for Box<G> {
    fn next_cycle(&mut self) -> TriggerDecision {
        (**self).next_cycle()
    }
}

// ============================================================================
// FixedTrigger
// ============================================================================

/// Makes the same decision every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTrigger(pub TriggerDecision);

impl Trigger for FixedTrigger {
    fn next_cycle(&mut self) -> TriggerDecision {
        self.0
    }
}

impl From<TriggerMode> for FixedTrigger {
    /// `Prompt` has no fixed answer and maps to `Listen`.
    fn from(mode: TriggerMode) -> Self {
        match mode {
            TriggerMode::Go => Self(TriggerDecision::SendGo),
            TriggerMode::Device | TriggerMode::Prompt => Self(TriggerDecision::Listen),
        }
    }
}

// ============================================================================
// PromptTrigger
// ============================================================================

/// Asks an operator before every cycle.
///
/// `1` sends GO, an empty line listens, anything else (or EOF) quits.
pub struct PromptTrigger<R, W> {
    input: R,
    output: W,
}

impl<R, W> PromptTrigger<R, W> {
    /// Creates a prompt over the given input and output.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptTrigger<BufReader<Stdin>, Stdout> {
    /// Prompt on the process's stdin/stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<R: BufRead + Send, W: Write + Send> Trigger for PromptTrigger<R, W> {
    fn next_cycle(&mut self) -> TriggerDecision {
        if let Err(e) = write!(self.output, "{PROMPT}").and_then(|()| self.output.flush()) {
            warn!(error = %e, "Could not write trigger prompt");
        }

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) => TriggerDecision::Quit,
            Ok(_) => match answer.trim() {
                "1" => TriggerDecision::SendGo,
                "" => TriggerDecision::Listen,
                _ => TriggerDecision::Quit,
            },
            Err(e) => {
                warn!(error = %e, "Could not read trigger answer");
                TriggerDecision::Quit
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
