//! Classification output and alarm configuration

use serde::{Deserialize, Serialize};

/// Suffix appended to the label text when the high-BPM override fires.
pub const HIGH_BPM_SUFFIX: &str = " (HIGH BPM!)";

/// Default alarm threshold (bpm).
pub const DEFAULT_ALARM_THRESHOLD_BPM: u32 = 120;

/// Clinical status category derived from the firmware's label text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StatusLabel {
    #[default]
    Normal,
    StressRisk,
    Motion,
    LowSpO2,
    Arrhythmia,
}

impl StatusLabel {
    /// Canonical firmware label text for a class index.
    ///
    /// Used by the simulator; the monitor itself never derives labels from
    /// class ids.
    pub fn firmware_text(class_id: u32) -> &'static str {
        match class_id {
            0 => "Normal",
            1 => "Stress/Risk",
            2 => "Moving",
            3 => "Low SpO2!",
            4 => "Arrhythmia!",
            _ => "Unknown",
        }
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusLabel::Normal => write!(f, "Normal"),
            StatusLabel::StressRisk => write!(f, "Stress/Risk"),
            StatusLabel::Motion => write!(f, "Motion"),
            StatusLabel::LowSpO2 => write!(f, "Low SpO2"),
            StatusLabel::Arrhythmia => write!(f, "Arrhythmia"),
        }
    }
}

/// Presentation severity tier, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Severity {
    #[default]
    Safe,
    /// Distinct from Safe for display, never alarmed
    Informational,
    Warning,
    Alert,
}

impl Severity {
    /// Display colour hint for front-ends
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Safe => "green",
            Severity::Informational => "blue",
            Severity::Warning => "#FF8C00",
            Severity::Alert => "red",
        }
    }

    /// Whether this tier should raise an operator alarm
    pub fn is_alarmed(&self) -> bool {
        matches!(self, Severity::Warning | Severity::Alert)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Safe => write!(f, "SAFE"),
            Severity::Informational => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Alert => write!(f, "ALERT"),
        }
    }
}

/// Derived label and severity for a reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedStatus {
    pub label: StatusLabel,
    /// Operator-facing text: firmware label, plus the high-BPM suffix when set
    pub text: String,
    pub severity: Severity,
    /// Heart rate exceeded the configured alarm threshold
    pub high_bpm_override: bool,
}

/// Operator-adjustable alarm thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmConfig {
    /// Heart rate above which the high-BPM override fires
    #[serde(default = "default_threshold_bpm")]
    pub threshold_bpm: u32,
}

fn default_threshold_bpm() -> u32 {
    DEFAULT_ALARM_THRESHOLD_BPM
}

impl AlarmConfig {
    /// Smallest threshold an operator may set
    pub const MIN_THRESHOLD_BPM: u32 = 1;
    /// Largest threshold an operator may set
    pub const MAX_THRESHOLD_BPM: u32 = 300;

    pub fn new(threshold_bpm: u32) -> Self {
        Self { threshold_bpm }
    }

    /// Whether a threshold value is acceptable from the control surface
    pub fn is_valid_threshold(threshold_bpm: u32) -> bool {
        (Self::MIN_THRESHOLD_BPM..=Self::MAX_THRESHOLD_BPM).contains(&threshold_bpm)
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            threshold_bpm: DEFAULT_ALARM_THRESHOLD_BPM,
        }
    }
}
