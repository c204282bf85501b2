//! Bridge configuration and builder.
//!
//! Provides a fluent API for configuring the serial link, the HTTP
//! listener and the heartbeat cadence.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use stopwatch_bridge::{BridgeConfig, TriggerMode};
//!
//! # fn example() -> stopwatch_bridge::Result<()> {
//! let config = BridgeConfig::builder()
//!     .endpoint("/dev/ttyACM0")
//!     .baud_rate(9600)
//!     .read_timeout(Duration::from_secs(1))
//!     .trigger(TriggerMode::Go)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Baud rate the timing firmware talks at.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Serial read/write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Heartbeat cadence while a run is in progress.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(1);

/// Default HTTP bind address.
pub const DEFAULT_HTTP_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5000);

// ============================================================================
// TriggerMode
// ============================================================================

/// How each timing cycle is started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriggerMode {
    /// Wait for the device's own trigger (button press, light gate).
    #[default]
    Device,
    /// Send `GO` to the device at the start of every cycle.
    Go,
    /// Ask the operator on stdin before every cycle.
    Prompt,
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Device => "device",
            Self::Go => "go",
            Self::Prompt => "prompt",
        };
        f.write_str(name)
    }
}

impl FromStr for TriggerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "device" | "wait" => Ok(Self::Device),
            "go" => Ok(Self::Go),
            "prompt" => Ok(Self::Prompt),
            other => Err(Error::config(format!(
                "Unknown trigger mode '{other}' (expected device, go or prompt)"
            ))),
        }
    }
}

// ============================================================================
// BridgeConfig
// ============================================================================

/// Validated bridge configuration.
///
/// Use [`BridgeConfig::builder()`] to create one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Explicit serial endpoints, tried in order. Empty means auto-discover.
    pub endpoints: Vec<String>,

    /// Serial baud rate.
    pub baud_rate: u32,

    /// Serial read/write timeout.
    pub timeout: Duration,

    /// HTTP listen address.
    pub http_addr: SocketAddr,

    /// Heartbeat period while running.
    pub heartbeat: Duration,

    /// Per-cycle trigger behavior.
    pub trigger: TriggerMode,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            http_addr: DEFAULT_HTTP_ADDR,
            heartbeat: DEFAULT_HEARTBEAT,
            trigger: TriggerMode::default(),
        }
    }
}

impl BridgeConfig {
    /// Creates a configuration builder with defaults.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::new()
    }

    /// Returns `true` if endpoints should be discovered from the OS.
    #[inline]
    #[must_use]
    pub fn auto_discover(&self) -> bool {
        self.endpoints.is_empty()
    }
}

// ============================================================================
// BridgeConfigBuilder
// ============================================================================

/// Builder for [`BridgeConfig`].
#[derive(Debug, Default, Clone)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    /// Creates a builder holding the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an explicit serial endpoint (e.g. `/dev/ttyACM0`, `COM11`).
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, id: impl Into<String>) -> Self {
        self.config.endpoints.push(id.into());
        self
    }

    /// Adds several explicit serial endpoints.
    #[inline]
    #[must_use]
    pub fn endpoints(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.endpoints.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Sets the serial baud rate.
    #[inline]
    #[must_use]
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    /// Sets the serial read/write timeout.
    #[inline]
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the HTTP listen address.
    #[inline]
    #[must_use]
    pub fn http_addr(mut self, addr: SocketAddr) -> Self {
        self.config.http_addr = addr;
        self
    }

    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub fn heartbeat(mut self, period: Duration) -> Self {
        self.config.heartbeat = period;
        self
    }

    /// Sets the trigger mode.
    #[inline]
    #[must_use]
    pub fn trigger(mut self, trigger: TriggerMode) -> Self {
        self.config.trigger = trigger;
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the baud rate, timeout or heartbeat
    /// period is zero, or an endpoint id is blank.
    pub fn build(self) -> Result<BridgeConfig> {
        let config = self.config;

        if config.baud_rate == 0 {
            return Err(Error::config("Baud rate must be greater than zero"));
        }
        if config.timeout.is_zero() {
            return Err(Error::config("Serial timeout must be greater than zero"));
        }
        if config.heartbeat.is_zero() {
            return Err(Error::config("Heartbeat period must be greater than zero"));
        }
        if config.endpoints.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::config("Endpoint ids must not be blank"));
        }

        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
