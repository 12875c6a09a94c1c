//! Vital-sign reading types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Lower bound of the physiological heart-rate range (bpm).
pub const HEART_RATE_MIN_BPM: u32 = 30;

/// Upper bound of the physiological heart-rate range (bpm).
pub const HEART_RATE_MAX_BPM: u32 = 220;

/// Highest SpO2 value the sensor can report honestly (%).
///
/// Anything above this is a saturation artifact of the optical front-end.
pub const SPO2_CEILING_PERCENT: f64 = 99.9;

/// Fields extracted from a telemetry line that matched the full grammar.
///
/// Not yet sanitized; pass through [`crate::acquisition::validate`] to obtain
/// a [`Reading`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFields {
    /// Classifier's predicted class index (0-4 on current firmware)
    pub class_id: u32,
    /// Human-readable label printed by the firmware, verbatim
    pub label: String,
    pub heart_rate_bpm: u32,
    pub spo2_percent: f64,
    pub hrv_ms: f64,
    pub accel_g: f64,
}

/// Informational tags attached by the validator.
///
/// Tags never change whether a reading exists; they only record what the
/// validator noticed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationTags {
    /// SpO2 was above the sensor ceiling and has been clamped
    pub spo2_clamped: bool,
    /// Heart rate is outside 30-220 bpm (kept as reported)
    pub heart_rate_out_of_range: bool,
}

/// One validated vital-sign sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub heart_rate_bpm: u32,
    /// Clamped to at most 99.9
    pub spo2_percent: f64,
    pub hrv_ms: f64,
    /// Magnitude of acceleration (g)
    pub accel_g: f64,
    /// Raw classifier output, informational
    pub class_id: u32,
    /// Label text as printed by the firmware
    pub label: String,
    /// Wall-clock capture time (local)
    pub captured_at: DateTime<Local>,
    #[serde(default)]
    pub tags: ValidationTags,
}
