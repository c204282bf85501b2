//! Serial transport layer.
//!
//! This module handles communication between the bridge (Rust) and the
//! timing device (microcontroller) over a serial line.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Bridge (Rust)  │          Serial 8N1          │  Timing device  │
//! │                 │◄──── START <ms> / STOP <ms> ─│                 │
//! │  LineConnection │───────────── GO ────────────►│  (button/gate)  │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `discover_endpoints` - Enumerate candidate serial ports
//! 2. `connect_any` - Open the first endpoint that accepts, in order
//! 3. `LineConnection` - Read lines, write raw commands
//! 4. Handle dropped when the protocol driver exits
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Line framing and endpoint retry |
//! | `discovery` | Serial endpoint enumeration |

// ============================================================================
// Submodules
// ============================================================================

/// Line-oriented serial connection and connect-with-retry.
pub mod connection;

/// Serial endpoint discovery.
pub mod discovery;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{
    LineConnection, LineTransport, SerialConnection, SerialOptions, connect, connect_any,
    connect_first,
};
pub use discovery::{EndpointDescriptor, discover_endpoints};
