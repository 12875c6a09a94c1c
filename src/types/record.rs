//! Persisted telemetry record

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::{ClassifiedStatus, Reading};

/// A classified reading as written to the daily log. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub reading: Reading,
    pub status: ClassifiedStatus,
}

impl TelemetryRecord {
    pub fn new(reading: Reading, status: ClassifiedStatus) -> Self {
        Self { reading, status }
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.reading.captured_at
    }
}
