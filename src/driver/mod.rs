//! Protocol driver module.
//!
//! This module turns serial lines into session transitions.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ProtocolDriver`] | START/STOP state machine over a [`LineTransport`](crate::transport::LineTransport) |
//! | [`DriverState`] | Driver state (`AwaitingTrigger` … `Reporting`) |
//! | [`Trigger`] | Per-cycle GO / listen / quit decision |
//! | [`FixedTrigger`] | Same decision every cycle |
//! | [`PromptTrigger`] | Operator prompt on stdin |
//!
//! # Example
//!
//! ```no_run
//! use stopwatch_bridge::driver::{FixedTrigger, ProtocolDriver, TriggerDecision};
//! use stopwatch_bridge::transport::{EndpointDescriptor, SerialOptions, connect};
//! use stopwatch_bridge::{SessionHandle, Shutdown};
//!
//! # fn example() -> stopwatch_bridge::Result<()> {
//! let port = connect(&EndpointDescriptor::configured("/dev/ttyACM0"), &SerialOptions::default())?;
//! let session = SessionHandle::new();
//!
//! let mut driver = ProtocolDriver::new(port, FixedTrigger(TriggerDecision::Listen), session);
//! driver.run(&Shutdown::new());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Driver state machine.
pub mod core;

/// Per-cycle trigger decisions.
pub mod trigger;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{DriverState, ExitReason, Flow, ProtocolDriver};
pub use trigger::{FixedTrigger, PromptTrigger, Trigger, TriggerDecision};
