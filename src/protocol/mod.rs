//! Serial protocol message types.
//!
//! This module defines the line format spoken between the bridge and the
//! timing device.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Wire format |
//! |---------|-----------|-------------|
//! | `Start` | Device → Host | `START <device-ms>\n` |
//! | `Stop` | Device → Host | `STOP <device-ms>\n` |
//! | `Go` | Host → Device | `GO` (two bytes, no terminator) |
//!
//! Any other device line is noise and is ignored.

// ============================================================================
// Submodules
// ============================================================================

/// Device and host message types and the line parser.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{DeviceMessage, HostCommand};
