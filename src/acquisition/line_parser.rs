//! Telemetry line parser
//!
//! The wearable prints one prediction report per cycle on the same UART that
//! carries boot logs and debug prints:
//!
//! ```text
//! | ML PREDICTION: Class 1 (Stress/Risk) | Inputs: HR=130, SpO2=97.0, HRV=25.0, Acc=1.05 |
//! ```
//!
//! Each line is matched on its own against the full grammar. Lines without the
//! marker, or with the marker but a payload that does not fit the exact field
//! order and numeric formats, are not readings. Malformed input is expected and
//! never an error.

use chrono::{DateTime, Local};
use regex::Regex;

use super::validator::validate;
use crate::types::{ParsedFields, Reading};

/// Literal marker that introduces a prediction report.
pub const PREDICTION_MARKER: &str = "| ML PREDICTION:";

/// Full prediction-report grammar, anchored at the marker.
const PREDICTION_PATTERN: &str = concat!(
    r"\| ML PREDICTION: Class (\d+) \((.*?)\) \| Inputs: ",
    r"HR=(\d+), SpO2=(\d+(?:\.\d+)?), HRV=(\d+(?:\.\d+)?), Acc=(\d+(?:\.\d+)?)",
    r"(?:\s|\||$)",
);

/// Result of matching one line
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The line matched the full grammar
    Fields(ParsedFields),
    /// Diagnostic text, or a report that did not conform
    NotAReading,
}

impl ParseOutcome {
    pub fn is_reading(&self) -> bool {
        matches!(self, ParseOutcome::Fields(_))
    }
}

/// Compiled telemetry-line matcher. Build once, reuse for every line.
#[derive(Debug, Clone)]
pub struct LineParser {
    pattern: Regex,
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            // The pattern is a compile-time constant covered by tests.
            #[allow(clippy::expect_used)]
            pattern: Regex::new(PREDICTION_PATTERN).expect("prediction pattern is valid"),
        }
    }

    /// Cheap pre-check used before running the full pattern
    pub fn contains_marker(line: &str) -> bool {
        line.contains(PREDICTION_MARKER)
    }

    /// Match one line. Pure; never panics on arbitrary input.
    pub fn parse(&self, line: &str) -> ParseOutcome {
        if !Self::contains_marker(line) {
            return ParseOutcome::NotAReading;
        }

        let Some(caps) = self.pattern.captures(line) else {
            return ParseOutcome::NotAReading;
        };

        // Digits-only captures can still overflow; treat that as malformed.
        let fields = (|| {
            Some(ParsedFields {
                class_id: caps.get(1)?.as_str().parse().ok()?,
                label: caps.get(2)?.as_str().to_string(),
                heart_rate_bpm: caps.get(3)?.as_str().parse().ok()?,
                spo2_percent: parse_decimal(caps.get(4)?.as_str())?,
                hrv_ms: parse_decimal(caps.get(5)?.as_str())?,
                accel_g: parse_decimal(caps.get(6)?.as_str())?,
            })
        })();

        match fields {
            Some(f) => ParseOutcome::Fields(f),
            None => ParseOutcome::NotAReading,
        }
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_decimal(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse and validate in one step.
pub fn parse_reading(
    parser: &LineParser,
    line: &str,
    captured_at: DateTime<Local>,
) -> Option<Reading> {
    match parser.parse(line) {
        ParseOutcome::Fields(fields) => Some(validate(fields, captured_at)),
        ParseOutcome::NotAReading => None,
    }
}
