//! Daily CSV log: `<root>/<YYYY-MM>/<YYYY-MM-DD>.csv`
//!
//! Appends never rewrite earlier rows. A file that already has a header keeps
//! its column order; new rows are laid out to match it.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::columns::{ColumnMap, LogColumn};
use super::persistence::{Partition, PersistenceError, RecordSink};
use crate::types::TelemetryRecord;

/// Day log file extension
pub const LOG_EXTENSION: &str = "csv";

/// CSV-per-day record sink
#[derive(Debug, Clone)]
pub struct DailyCsvLog {
    root: PathBuf,
}

impl DailyCsvLog {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for a partition
    pub fn path_for(&self, partition: &Partition) -> PathBuf {
        self.root
            .join(partition.month_dir())
            .join(format!("{}.{}", partition.day_stem(), LOG_EXTENSION))
    }

    /// Header layout of an existing non-empty file, or `None` for a new one
    fn existing_layout(path: &Path) -> Result<Option<ColumnMap>, PersistenceError> {
        let len = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if len == 0 {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|source| PersistenceError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        let headers = reader.headers().map_err(|source| PersistenceError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        if headers.iter().all(|h| h.trim().is_empty()) {
            return Ok(None);
        }
        Ok(Some(ColumnMap::resolve(headers.iter())))
    }

    /// True when the file is non-empty and its last byte is not a newline
    fn missing_trailing_newline(path: &Path) -> std::io::Result<bool> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] != b'\n')
    }
}

/// Append handle that restores the file's original length unless committed.
///
/// A batch lands whole or not at all.
struct AppendGuard {
    file: File,
    path: PathBuf,
    original_len: u64,
    committed: bool,
}

impl AppendGuard {
    fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let original_len = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            original_len,
            committed: false,
        })
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for AppendGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match self.file.set_len(self.original_len) {
            Ok(()) => tracing::debug!(
                path = %self.path.display(),
                len = self.original_len,
                "Rolled back partial append"
            ),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to roll back partial append, log may hold duplicate rows after retry"
            ),
        }
    }
}

/// Render one field of a record
fn field_value(record: &TelemetryRecord, column: LogColumn) -> String {
    let reading = &record.reading;
    match column {
        LogColumn::Date => reading.captured_at.format("%Y-%m-%d").to_string(),
        LogColumn::Time => reading.captured_at.format("%H:%M:%S").to_string(),
        LogColumn::HeartRate => reading.heart_rate_bpm.to_string(),
        LogColumn::SpO2 => format!("{:.1}", reading.spo2_percent),
        LogColumn::Hrv => format!("{:.1}", reading.hrv_ms),
        LogColumn::Status => record.status.text.clone(),
        LogColumn::Accel => format!("{:.2}", reading.accel_g),
        LogColumn::ClassId => reading.class_id.to_string(),
    }
}

/// Lay out a record to match a file's header; unmapped positions are empty
fn row_for(record: &TelemetryRecord, layout: &ColumnMap) -> Vec<String> {
    (0..layout.width())
        .map(|i| {
            layout
                .column_at(i)
                .map(|c| field_value(record, c))
                .unwrap_or_default()
        })
        .collect()
}

impl RecordSink for DailyCsvLog {
    fn append_batch(
        &mut self,
        partition: &Partition,
        records: &[TelemetryRecord],
    ) -> Result<PathBuf, PersistenceError> {
        let path = self.path_for(partition);
        let io_err = |source: std::io::Error| PersistenceError::Io {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }

        let existing = Self::existing_layout(&path)?;
        if let Some(ref layout) = existing {
            let missing = layout.missing_required();
            if !missing.is_empty() {
                return Err(PersistenceError::IncompatibleLayout {
                    path: path.clone(),
                    missing: missing
                        .iter()
                        .map(|c| c.header())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }
        let needs_newline = existing.is_some() && Self::missing_trailing_newline(&path).map_err(io_err)?;

        // Any early return below truncates the file back to its prior length
        let mut guard = AppendGuard::open(&path).map_err(io_err)?;
        if needs_newline {
            guard.file.write_all(b"\n").map_err(io_err)?;
        }

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_writer(&mut guard.file);
            let csv_err = |source: csv::Error| PersistenceError::Csv {
                path: path.clone(),
                source,
            };

            let layout = match existing {
                Some(layout) => layout,
                None => {
                    writer
                        .write_record(LogColumn::ALL.iter().map(|c| c.header()))
                        .map_err(csv_err)?;
                    ColumnMap::canonical()
                }
            };

            for record in records {
                writer.write_record(row_for(record, &layout)).map_err(csv_err)?;
            }
            writer.flush().map_err(io_err)?;
        }

        guard.file.sync_data().map_err(io_err)?;
        guard.commit();

        tracing::debug!(
            path = %path.display(),
            records = records.len(),
            "Appended batch to daily log"
        );
        Ok(path)
    }

    fn backend_name(&self) -> &'static str {
        "DailyCsv"
    }
}
