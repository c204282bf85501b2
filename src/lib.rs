//! Stopwatch Bridge - Serial-to-HTTP bridge for hardware stopwatches.
//!
//! This library connects to a timing device (light gate, push-button
//! stopwatch) over a serial line, tracks one timing session at a time,
//! and serves its state over HTTP.
//!
//! # Architecture
//!
//! Three concurrent units share one [`SessionHandle`] and nothing else:
//!
//! - **Protocol driver**: reads `START <ms>` / `STOP <ms>` lines from the
//!   device and drives the session through its cycle
//! - **Heartbeat**: advances the interim elapsed value while running
//! - **Status service**: answers `GET /elapsed-time` from the session
//!
//! Key design principles:
//!
//! - Final elapsed time is computed from device timestamps, never from
//!   host clocks
//! - Every session transition happens under one lock, so readers never
//!   see a half-applied update
//! - One [`Shutdown`] signal stops all units
//!
//! # Quick Start
//!
//! ```no_run
//! use stopwatch_bridge::{Bridge, BridgeConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Empty endpoint list means auto-discovery
//!     let config = BridgeConfig::builder()
//!         .baud_rate(9600)
//!         .http_addr("127.0.0.1:5000".parse().unwrap())
//!         .build()?;
//!
//!     let bridge = Bridge::new(config);
//!     let session = bridge.session();
//!     tokio::spawn(bridge.run());
//!
//!     println!("status: {}", session.status());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Startup and lifecycle: [`Bridge`] |
//! | [`config`] | [`BridgeConfig`] and its builder |
//! | [`driver`] | Serial protocol state machine |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Device line format |
//! | [`server`] | HTTP status service |
//! | [`session`] | Shared session record and heartbeat |
//! | [`shutdown`] | Cooperative shutdown signal |
//! | [`transport`] | Serial discovery and line I/O |

// ============================================================================
// Modules
// ============================================================================

/// Bridge startup and lifecycle.
pub mod bridge;

/// Bridge configuration.
///
/// Use [`BridgeConfig::builder()`] to create a validated configuration.
pub mod config;

/// Serial protocol driver.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Device line protocol.
pub mod protocol;

/// HTTP status service.
pub mod server;

/// Shared timing session.
pub mod session;

/// Cooperative shutdown signal.
pub mod shutdown;

/// Serial transport layer.
///
/// Endpoint discovery, connection setup and line framing.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::Bridge;

// Config types
pub use config::{BridgeConfig, BridgeConfigBuilder, TriggerMode};

// Driver types
pub use driver::{DriverState, ExitReason, ProtocolDriver, Trigger, TriggerDecision};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{DeviceMessage, HostCommand};

// Session types
pub use session::{
    ElapsedTime, ReportStatus, Session, SessionHandle, SessionStatus, StatusReport,
};

// Shutdown
pub use shutdown::Shutdown;
