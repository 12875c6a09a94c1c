//! Daily log column layout and header alias resolution
//!
//! Logs written by older tools (and hand-edited spreadsheets) use assorted
//! header spellings. Each field carries a priority list of aliases; a file's
//! header row is resolved against them once, never per row.

use std::collections::HashMap;

/// A field of the persisted daily log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogColumn {
    Date,
    Time,
    HeartRate,
    SpO2,
    Hrv,
    Status,
    Accel,
    ClassId,
}

impl LogColumn {
    /// Column order used for new files
    pub const ALL: [LogColumn; 8] = [
        LogColumn::Date,
        LogColumn::Time,
        LogColumn::HeartRate,
        LogColumn::SpO2,
        LogColumn::Hrv,
        LogColumn::Status,
        LogColumn::Accel,
        LogColumn::ClassId,
    ];

    /// Columns every appended row must have a place for. The raw class id
    /// is informational and may be absent from older logs.
    pub fn is_required(&self) -> bool {
        !matches!(self, LogColumn::ClassId)
    }

    /// Header written for new files
    pub fn header(&self) -> &'static str {
        match self {
            LogColumn::Date => "Date",
            LogColumn::Time => "Time",
            LogColumn::HeartRate => "HR (BPM)",
            LogColumn::SpO2 => "SpO2 (%)",
            LogColumn::Hrv => "HRV (ms)",
            LogColumn::Status => "Status",
            LogColumn::Accel => "Accel (g)",
            LogColumn::ClassId => "Class",
        }
    }

    /// Normalized aliases, highest priority first
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            LogColumn::Date => &["date", "day", "ngay"],
            LogColumn::Time => &["time", "clock", "gio"],
            LogColumn::HeartRate => &["hrbpm", "hr", "heartrate", "heartratebpm", "bpm", "nhiptim"],
            LogColumn::SpO2 => &["spo2", "spo2percent", "oxygen", "oxy"],
            LogColumn::Hrv => &["hrvms", "hrv", "rmssd"],
            LogColumn::Status => &["status", "label", "state", "trangthai"],
            LogColumn::Accel => &["accelg", "accel", "acc", "acceleration", "acceltotalg"],
            LogColumn::ClassId => &["class", "classid", "rawclassid", "prediction"],
        }
    }
}

/// Lowercase and keep only ASCII alphanumerics: `"HR (BPM)"` -> `"hrbpm"`
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Resolved mapping from log fields to header positions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    positions: HashMap<LogColumn, usize>,
    width: usize,
}

impl ColumnMap {
    /// Canonical layout for a fresh file
    pub fn canonical() -> Self {
        Self {
            positions: LogColumn::ALL.iter().enumerate().map(|(i, c)| (*c, i)).collect(),
            width: LogColumn::ALL.len(),
        }
    }

    /// Resolve a header row. Fields are resolved in `LogColumn::ALL` order and
    /// each header position is claimed at most once.
    pub fn resolve<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let normalized: Vec<String> = headers.into_iter().map(normalize_header).collect();
        let mut positions = HashMap::new();
        let mut claimed = vec![false; normalized.len()];

        for column in LogColumn::ALL {
            let hit = column.aliases().iter().find_map(|alias| {
                normalized
                    .iter()
                    .enumerate()
                    .find(|(i, h)| !claimed[*i] && h.as_str() == *alias)
                    .map(|(i, _)| i)
            });
            if let Some(i) = hit {
                claimed[i] = true;
                positions.insert(column, i);
            }
        }

        Self {
            positions,
            width: normalized.len(),
        }
    }

    pub fn position(&self, column: LogColumn) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    /// Number of header positions in the file
    pub fn width(&self) -> usize {
        self.width
    }

    /// Required columns the layout has no position for
    pub fn missing_required(&self) -> Vec<LogColumn> {
        LogColumn::ALL
            .into_iter()
            .filter(|c| c.is_required() && !self.positions.contains_key(c))
            .collect()
    }

    /// Column stored at a header position, if any
    pub fn column_at(&self, position: usize) -> Option<LogColumn> {
        self.positions
            .iter()
            .find(|(_, &p)| p == position)
            .map(|(c, _)| *c)
    }
}
