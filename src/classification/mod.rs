//! Classification state machine
//!
//! Derives presentation semantics from the label the on-device classifier
//! already printed. The label is never re-derived from raw vitals.
//!
//! Precedence among keywords found in the label text:
//!
//! ```text
//! Arrhythmia > Low SpO2 > Stress/Risk > Motion > Normal
//! ```
//!
//! Independently, a heart rate above the alarm threshold appends
//! `" (HIGH BPM!)"` to the label text and forces the severity to Alert.

use crate::types::{AlarmConfig, ClassifiedStatus, Reading, Severity, StatusLabel, HIGH_BPM_SUFFIX};

/// Keyword sets, checked in precedence order. Matching is case-insensitive.
const KEYWORD_RULES: &[(StatusLabel, &[&str])] = &[
    (StatusLabel::Arrhythmia, &["arrhythmia"]),
    (StatusLabel::LowSpO2, &["low spo2"]),
    (StatusLabel::StressRisk, &["stress", "risk"]),
    (StatusLabel::Motion, &["moving", "motion"]),
];

/// Map label text to a status category. Unrecognized text is Normal.
pub fn label_from_text(text: &str) -> StatusLabel {
    let lowered = text.to_lowercase();
    KEYWORD_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(label, _)| *label)
        .unwrap_or(StatusLabel::Normal)
}

/// Base severity for a status category, before the high-BPM override
pub fn severity_for(label: StatusLabel) -> Severity {
    match label {
        StatusLabel::Arrhythmia | StatusLabel::LowSpO2 => Severity::Alert,
        StatusLabel::StressRisk => Severity::Warning,
        StatusLabel::Motion => Severity::Informational,
        StatusLabel::Normal => Severity::Safe,
    }
}

/// Classify a reading under the given alarm configuration. Pure.
pub fn classify(reading: &Reading, config: &AlarmConfig) -> ClassifiedStatus {
    let label = label_from_text(&reading.label);
    let high_bpm_override = reading.heart_rate_bpm > config.threshold_bpm;

    let (text, severity) = if high_bpm_override {
        (format!("{}{}", reading.label, HIGH_BPM_SUFFIX), Severity::Alert)
    } else {
        (reading.label.clone(), severity_for(label))
    };

    ClassifiedStatus {
        label,
        text,
        severity,
        high_bpm_override,
    }
}
