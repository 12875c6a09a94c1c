//! Persistence batcher: time-triggered flushes with at-least-once delivery
//!
//! Pending records are cleared and the flush timer reset only after the sink
//! confirms the write. A failed flush leaves both untouched, so the next
//! `maybe_flush` retries the same batch.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Local};
use serde::Serialize;

use super::persistence::{Partition, PersistenceError, RecordSink};
use crate::config::defaults;
use crate::types::TelemetryRecord;

/// Result of a successful flush
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlushReport {
    pub records: usize,
    pub destination: PathBuf,
    pub flushed_at: DateTime<Local>,
}

/// Outcome of a flush attempt that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    Flushed(FlushReport),
    /// Nothing pending, or interval not yet elapsed
    NoOp,
}

pub struct PersistenceBatcher<S: RecordSink> {
    sink: S,
    pending: VecDeque<TelemetryRecord>,
    interval: Duration,
    last_flush: DateTime<Local>,
    max_pending: usize,
    dropped: u64,
}

impl<S: RecordSink> PersistenceBatcher<S> {
    /// Create a batcher whose flush timer starts at `started_at`
    pub fn new(sink: S, interval: Duration, started_at: DateTime<Local>) -> Self {
        Self {
            sink,
            pending: VecDeque::new(),
            interval,
            last_flush: started_at,
            max_pending: defaults::MAX_PENDING_RECORDS,
            dropped: 0,
        }
    }

    /// Cap the pending set; the oldest records are dropped beyond it
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }

    /// Queue a record. O(1); at the cap the oldest pending record is dropped.
    pub fn append(&mut self, record: TelemetryRecord) {
        if self.pending.len() >= self.max_pending {
            self.pending.pop_front();
            self.dropped += 1;
            if self.dropped == 1 || self.dropped % 1000 == 0 {
                tracing::warn!(
                    dropped = self.dropped,
                    max_pending = self.max_pending,
                    "Pending batch at capacity, dropping oldest records"
                );
            }
        }
        self.pending.push_back(record);
    }

    /// Flush if the interval has elapsed since the last successful flush
    pub fn maybe_flush(&mut self, now: DateTime<Local>) -> Result<FlushOutcome, PersistenceError> {
        if self.pending.is_empty() || now - self.last_flush < self.interval {
            return Ok(FlushOutcome::NoOp);
        }
        self.flush_at(now)
    }

    /// Flush now, partitioning by the date of `now`
    pub fn flush_at(&mut self, now: DateTime<Local>) -> Result<FlushOutcome, PersistenceError> {
        if self.pending.is_empty() {
            return Ok(FlushOutcome::NoOp);
        }

        let partition = Partition::for_date(now.date_naive());
        let batch = self.pending.make_contiguous();

        match self.sink.append_batch(&partition, batch) {
            Ok(destination) => {
                let records = self.pending.len();
                self.pending.clear();
                self.last_flush = now;
                tracing::info!(
                    records,
                    destination = %destination.display(),
                    backend = self.sink.backend_name(),
                    "Flushed telemetry batch"
                );
                Ok(FlushOutcome::Flushed(FlushReport {
                    records,
                    destination,
                    flushed_at: now,
                }))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    pending = self.pending.len(),
                    "Flush failed, batch kept for retry"
                );
                Err(e)
            }
        }
    }

    pub fn flush(&mut self) -> Result<FlushOutcome, PersistenceError> {
        self.flush_at(Local::now())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Records lost to the pending cap since start
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn last_flush(&self) -> DateTime<Local> {
        self.last_flush
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
