//! Serial endpoint discovery.
//!
//! Enumerates candidate serial ports from the operating system, or turns
//! an explicit endpoint list from the configuration into descriptors.
//!
//! USB ports are listed before built-in UARTs so that a plugged-in
//! microcontroller is tried ahead of `/dev/ttyS*`-style ports that open
//! fine but never speak.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serialport::{SerialPortInfo, SerialPortType};
use tracing::{debug, info};

use crate::error::Result;

// ============================================================================
// EndpointDescriptor
// ============================================================================

/// A candidate serial endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// OS path or name (e.g. `/dev/ttyACM0`, `COM11`).
    pub id: String,
    /// Human-readable description (product name when known).
    pub description: String,
    /// Hardware identifier (`USB VID:PID=2341:0043 SER=...` for USB ports).
    pub hardware_id: String,
}

impl EndpointDescriptor {
    /// Creates a descriptor for an endpoint named in the configuration.
    #[must_use]
    pub fn configured(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: "configured".to_string(),
            hardware_id: "n/a".to_string(),
        }
    }

    /// Returns `true` if this endpoint is a USB device.
    #[inline]
    #[must_use]
    pub fn is_usb(&self) -> bool {
        self.hardware_id.starts_with("USB")
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [{}]", self.id, self.description, self.hardware_id)
    }
}

impl From<SerialPortInfo> for EndpointDescriptor {
    fn from(info: SerialPortInfo) -> Self {
        let (description, hardware_id) = match info.port_type {
            SerialPortType::UsbPort(usb) => {
                let description = usb
                    .product
                    .or(usb.manufacturer)
                    .unwrap_or_else(|| "USB serial device".to_string());
                let mut hardware_id = format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid);
                if let Some(serial) = usb.serial_number {
                    hardware_id.push_str(" SER=");
                    hardware_id.push_str(&serial);
                }
                (description, hardware_id)
            }
            SerialPortType::PciPort => ("PCI serial port".to_string(), "PCI".to_string()),
            SerialPortType::BluetoothPort => {
                ("Bluetooth serial port".to_string(), "BTHENUM".to_string())
            }
            SerialPortType::Unknown => ("n/a".to_string(), "n/a".to_string()),
        };

        Self {
            id: info.port_name,
            description,
            hardware_id,
        }
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Enumerates serial endpoints.
///
/// When `configured` is non-empty those ids are returned verbatim, in
/// order, without touching the OS. Otherwise the OS port list is used,
/// USB devices first.
///
/// An empty result is not an error here; the caller decides that no
/// endpoints is fatal.
///
/// # Errors
///
/// Returns [`Error::Serial`](crate::Error::Serial) if the OS enumeration fails.
pub fn discover_endpoints(configured: &[String]) -> Result<Vec<EndpointDescriptor>> {
    if !configured.is_empty() {
        debug!(count = configured.len(), "Using configured endpoints");
        return Ok(configured
            .iter()
            .map(EndpointDescriptor::configured)
            .collect());
    }

    let ports = serialport::available_ports()?;
    let endpoints = order_candidates(ports.into_iter().map(EndpointDescriptor::from).collect());

    for endpoint in &endpoints {
        info!(endpoint = %endpoint, "Discovered serial endpoint");
    }

    Ok(endpoints)
}

/// Stable-sorts USB endpoints ahead of the rest.
fn order_candidates(mut endpoints: Vec<EndpointDescriptor>) -> Vec<EndpointDescriptor> {
    endpoints.sort_by_key(|e| !e.is_usb());
    endpoints
}

// ============================================================================
// Tests
// ============================================================================
