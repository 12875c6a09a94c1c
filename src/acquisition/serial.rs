//! Serial transport
//!
//! Opens the microcontroller's UART bridge. Line framing and read timeouts are
//! handled by [`crate::pipeline::source::LineReader`]; this module only knows
//! how to find and open a port.

use std::time::Duration;

use thiserror::Error;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::discovery::{discover_port, PortCandidate};

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// No port given and auto-discovery found no matching device
    #[error("No matching serial device found (looked for: {patterns})")]
    NoDeviceFound { patterns: String },

    /// The port exists but could not be opened
    #[error("Transport unavailable ({port}): {message}")]
    Unavailable { port: String, message: String },

    /// Read failed on an open transport
    #[error("Transport read failure: {0}")]
    Read(#[from] std::io::Error),
}

/// Serial line settings
#[derive(Debug, Clone)]
pub struct SerialSettings {
    /// Explicit port path; `None` means auto-discover
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Substrings matched against port descriptions during discovery
    pub port_patterns: Vec<String>,
}

impl SerialSettings {
    /// Resolve the port to open: the explicit one, else the first discovered match.
    pub fn resolve_port(&self) -> Result<String, TransportError> {
        if let Some(ref port) = self.port {
            return Ok(port.clone());
        }

        let candidates = list_ports();
        tracing::debug!(count = candidates.len(), "Enumerated serial ports");

        discover_port(&candidates, &self.port_patterns)
            .map(|c| c.name.clone())
            .ok_or_else(|| TransportError::NoDeviceFound {
                patterns: self.port_patterns.join(", "),
            })
    }
}

/// Enumerate serial ports with their USB descriptions.
pub fn list_ports() -> Vec<PortCandidate> {
    match tokio_serial::available_ports() {
        Ok(ports) => ports.into_iter().map(PortCandidate::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Serial port enumeration failed");
            Vec::new()
        }
    }
}

/// Open a serial port for async reading.
pub fn open_serial(port: &str, baud_rate: u32) -> Result<SerialStream, TransportError> {
    tracing::info!(port = %port, baud = baud_rate, "Opening serial port");

    tokio_serial::new(port, baud_rate)
        .timeout(Duration::from_millis(100))
        .open_native_async()
        .map_err(|e| TransportError::Unavailable {
            port: port.to_string(),
            message: e.to_string(),
        })
}

impl From<tokio_serial::SerialPortInfo> for PortCandidate {
    fn from(info: tokio_serial::SerialPortInfo) -> Self {
        let description = match info.port_type {
            tokio_serial::SerialPortType::UsbPort(usb) => [usb.product, usb.manufacturer]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" "),
            tokio_serial::SerialPortType::PciPort => "PCI".to_string(),
            tokio_serial::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
            tokio_serial::SerialPortType::Unknown => String::new(),
        };

        PortCandidate {
            name: info.port_name,
            description,
        }
    }
}
