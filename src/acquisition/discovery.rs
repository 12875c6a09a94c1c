//! Serial port auto-discovery
//!
//! The wearable shows up behind a USB-UART bridge. Discovery picks the first
//! enumerated port whose description (or name) mentions one of the common
//! bridge chips.

use serde::Serialize;

/// Default description substrings: Silicon Labs CP210x, WCH CH340, and the
/// generic name several drivers report.
pub const DEFAULT_PORT_PATTERNS: &[&str] = &["CP210", "CH340", "USB Serial"];

/// An enumerated serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortCandidate {
    /// OS port name, e.g. `/dev/ttyUSB0` or `COM3`
    pub name: String,
    /// USB product and manufacturer strings, space separated
    pub description: String,
}

/// Pick the first candidate matching any pattern. Enumeration order wins.
pub fn discover_port<'a>(
    candidates: &'a [PortCandidate],
    patterns: &[String],
) -> Option<&'a PortCandidate> {
    candidates.iter().find(|c| {
        patterns
            .iter()
            .any(|p| c.description.contains(p.as_str()) || c.name.contains(p.as_str()))
    })
}

/// Default patterns as owned strings (for config defaults)
pub fn default_port_patterns() -> Vec<String> {
    DEFAULT_PORT_PATTERNS.iter().map(|s| s.to_string()).collect()
}
