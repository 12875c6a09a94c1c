//! Day log history loader
//!
//! Reads back persisted day logs, including files written by older tools with
//! different header spellings or column orders. Columns are resolved once per
//! file through the alias table in [`super::columns`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use super::columns::{ColumnMap, LogColumn};
use super::daily_log::LOG_EXTENSION;
use super::persistence::Partition;

/// Error type for history operations
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("no log for {0}")]
    NotFound(NaiveDate),
    #[error("log {path} has no heart rate column")]
    MissingHeartRate { path: PathBuf },
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One row read back from a day log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub heart_rate_bpm: f64,
    pub spo2_percent: Option<f64>,
    pub hrv_ms: Option<f64>,
    pub status: Option<String>,
    pub accel_g: Option<f64>,
    pub class_id: Option<u32>,
}

/// A day log available on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayLog {
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// Path of the log for `date` under `root`
pub fn day_path(root: &Path, date: NaiveDate) -> PathBuf {
    let partition = Partition::for_date(date);
    root.join(partition.month_dir())
        .join(format!("{}.{}", partition.day_stem(), LOG_EXTENSION))
}

fn parse_number(field: Option<&str>) -> Option<f64> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_time(field: Option<&str>) -> Option<NaiveTime> {
    let s = field?.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn parse_date(field: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(field?.trim(), "%Y-%m-%d").ok()
}

/// Load every readable row of the log for `date`.
///
/// Rows whose heart rate cannot be read are skipped. Missing optional columns
/// become `None`; a missing date column falls back to `date`.
pub fn load_day(root: &Path, date: NaiveDate) -> Result<Vec<HistoryRow>, HistoryError> {
    let path = day_path(root, date);
    if !path.is_file() {
        return Err(HistoryError::NotFound(date));
    }
    load_file(&path, date)
}

/// Load rows from an arbitrary log file
pub fn load_file(path: &Path, default_date: NaiveDate) -> Result<Vec<HistoryRow>, HistoryError> {
    let csv_err = |source: csv::Error| HistoryError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let map = ColumnMap::resolve(reader.headers().map_err(csv_err)?.iter());
    let Some(hr_pos) = map.position(LogColumn::HeartRate) else {
        return Err(HistoryError::MissingHeartRate {
            path: path.to_path_buf(),
        });
    };

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable row");
                skipped += 1;
                continue;
            }
        };
        let get = |column: LogColumn| map.position(column).and_then(|i| record.get(i));

        let Some(heart_rate_bpm) = parse_number(record.get(hr_pos)) else {
            skipped += 1;
            continue;
        };

        rows.push(HistoryRow {
            date: parse_date(get(LogColumn::Date)).unwrap_or(default_date),
            time: parse_time(get(LogColumn::Time)),
            heart_rate_bpm,
            spo2_percent: parse_number(get(LogColumn::SpO2)),
            hrv_ms: parse_number(get(LogColumn::Hrv)),
            status: get(LogColumn::Status)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            accel_g: parse_number(get(LogColumn::Accel)),
            class_id: get(LogColumn::ClassId).and_then(|s| s.trim().parse().ok()),
        });
    }

    if skipped > 0 {
        tracing::debug!(path = %path.display(), skipped, "Skipped rows without a heart rate");
    }
    Ok(rows)
}

/// List day logs under `root`, newest first
pub fn list_days(root: &Path) -> Result<Vec<DayLog>, HistoryError> {
    let io_err = |path: &Path, source: std::io::Error| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    };

    let months = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(root, e)),
    };

    let mut days = Vec::new();
    for month in months {
        let month = month.map_err(|e| io_err(root, e))?;
        let month_path = month.path();
        if !month_path.is_dir() {
            continue;
        }
        let entries = fs::read_dir(&month_path).map_err(|e| io_err(&month_path, e))?;
        for entry in entries {
            let path = entry.map_err(|e| io_err(&month_path, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            let date = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            if let Some(date) = date {
                days.push(DayLog { date, path });
            }
        }
    }

    days.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_day(root: &Path, date: NaiveDate, contents: &str) -> PathBuf {
        let path = day_path(root, date);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, contents).expect("write");
        path
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).expect("date")
    }

    #[test]
    fn test_load_canonical_log() {
        let dir = tempdir().expect("tempdir");
        write_day(
            dir.path(),
            date(20),
            "Date,Time,HR (BPM),SpO2 (%),HRV (ms),Status,Accel (g),Class\n\
             2024-05-20,10:00:01,72,98.1,45.0,Normal,1.01,0\n",
        );

        let rows = load_day(dir.path(), date(20)).expect("load");
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.heart_rate_bpm, 72.0);
        assert_eq!(row.spo2_percent, Some(98.1));
        assert_eq!(row.status.as_deref(), Some("Normal"));
        assert_eq!(row.class_id, Some(0));
        assert_eq!(row.time, NaiveTime::from_hms_opt(10, 0, 1));
    }

    #[test]
    fn test_load_legacy_layout_with_aliases() {
        let dir = tempdir().expect("tempdir");
        write_day(
            dir.path(),
            date(21),
            "Time,Timestamp,Status,HR,SpO2,HRV,Acc\n\
             08:30:00,1716280200.0,Moving,95,97.2,30.5,2.40\n\
             08:30:01,1716280201.0,Normal,,97.0,31.0,1.00\n",
        );

        let rows = load_day(dir.path(), date(21)).expect("load");
        assert_eq!(rows.len(), 1, "row without HR is skipped");
        let row = &rows[0];
        assert_eq!(row.date, date(21));
        assert_eq!(row.heart_rate_bpm, 95.0);
        assert_eq!(row.accel_g, Some(2.4));
        assert_eq!(row.class_id, None);
    }

    #[test]
    fn test_missing_day_and_missing_hr_column() {
        let dir = tempdir().expect("tempdir");
        assert!(matches!(
            load_day(dir.path(), date(1)),
            Err(HistoryError::NotFound(_))
        ));

        write_day(dir.path(), date(2), "Time,Status\n10:00:00,Normal\n");
        assert!(matches!(
            load_day(dir.path(), date(2)),
            Err(HistoryError::MissingHeartRate { .. })
        ));
    }

    #[test]
    fn test_list_days_newest_first() {
        let dir = tempdir().expect("tempdir");
        write_day(dir.path(), date(3), "HR\n70\n");
        write_day(dir.path(), date(9), "HR\n70\n");
        let april = NaiveDate::from_ymd_opt(2024, 4, 30).expect("date");
        write_day(dir.path(), april, "HR\n70\n");
        fs::write(dir.path().join("2024-05").join("notes.txt"), "x").expect("write");

        let days: Vec<NaiveDate> = list_days(dir.path())
            .expect("list")
            .into_iter()
            .map(|d| d.date)
            .collect();
        assert_eq!(days, vec![date(9), date(3), april]);
    }

    #[test]
    fn test_list_days_missing_root_is_empty() {
        let dir = tempdir().expect("tempdir");
        let days = list_days(&dir.path().join("absent")).expect("list");
        assert!(days.is_empty());
    }
}
