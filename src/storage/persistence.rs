//! RecordSink trait: pluggable destination for flushed telemetry batches
//!
//! - `DailyCsvLog`: one CSV per calendar day under per-month directories
//! - `MemorySink`: in-memory store with failure injection for tests

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate};

use crate::types::TelemetryRecord;

/// Destination partition: one logical log per calendar day, grouped by month
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub date: NaiveDate,
}

impl Partition {
    pub fn for_date(date: NaiveDate) -> Self {
        Self { date }
    }

    /// Month directory name, e.g. `2024-05`
    pub fn month_dir(&self) -> String {
        format!("{:04}-{:02}", self.date.year(), self.date.month())
    }

    /// Day file stem, e.g. `2024-05-20`
    pub fn day_stem(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Trait for flush destinations.
///
/// `append_batch` must either write every record in order and return the
/// destination, or fail; callers keep the batch pending on failure.
pub trait RecordSink: Send + Sync {
    fn append_batch(
        &mut self,
        partition: &Partition,
        records: &[TelemetryRecord],
    ) -> Result<PathBuf, PersistenceError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn append_batch(
        &mut self,
        partition: &Partition,
        records: &[TelemetryRecord],
    ) -> Result<PathBuf, PersistenceError> {
        (**self).append_batch(partition, records)
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
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
    /// An existing log's header has no place for some fields
    #[error("log at {path} has no column for {missing}; move it aside to start a fresh log")]
    IncompatibleLayout { path: PathBuf, missing: String },
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Default)]
struct MemoryInner {
    batches: Vec<(Partition, Vec<TelemetryRecord>)>,
    fail_next: usize,
}

/// In-memory sink. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` appends fail
    pub fn fail_next(&self, n: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_next = n;
        }
    }

    /// Every successful batch, in write order
    pub fn batches(&self) -> Vec<(Partition, Vec<TelemetryRecord>)> {
        self.inner
            .lock()
            .map(|inner| inner.batches.clone())
            .unwrap_or_default()
    }

    /// Total records written
    pub fn record_count(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.batches.iter().map(|(_, b)| b.len()).sum())
            .unwrap_or(0)
    }
}

impl RecordSink for MemorySink {
    fn append_batch(
        &mut self,
        partition: &Partition,
        records: &[TelemetryRecord],
    ) -> Result<PathBuf, PersistenceError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;

        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(PersistenceError::Storage("injected failure".to_string()));
        }

        inner.batches.push((partition.clone(), records.to_vec()));
        Ok(PathBuf::from(format!(
            "memory://{}/{}",
            partition.month_dir(),
            partition.day_stem()
        )))
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
