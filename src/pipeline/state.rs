//! Monitor state and diagnostics
//!
//! Shared state for the ingestion pipeline, read by the control surface and
//! API handlers. The ingestion task is the only writer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::types::ClassifiedStatus;

// ============================================================================
// Connection state
// ============================================================================

/// Transport connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Streaming,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Streaming => write!(f, "STREAMING"),
        }
    }
}

// ============================================================================
// Monitor state
// ============================================================================

/// Counters and latest values, wrapped in `Arc<RwLock<>>` for sharing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorState {
    pub connection: ConnectionState,

    /// Port or source name while connected
    pub port: Option<String>,

    /// Monitor start time; the status endpoint reports it as `uptime_secs`
    #[serde(skip, default = "Instant::now")]
    pub started: Instant,

    /// Non-blank lines received
    pub lines_received: u64,

    /// Lines that parsed into readings
    pub readings: u64,

    /// Lines forwarded as diagnostics
    pub diagnostic_lines: u64,

    pub flushes: u64,
    pub flush_failures: u64,
    pub records_persisted: u64,

    /// Records dropped by the pending-batch cap
    pub records_dropped: u64,

    /// Records waiting for the next flush
    pub pending_records: usize,

    pub last_status: Option<ClassifiedStatus>,
    pub last_reading_at: Option<DateTime<Local>>,
    pub last_flush_at: Option<DateTime<Local>>,
    pub last_error: Option<String>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            port: None,
            started: Instant::now(),
            lines_received: 0,
            readings: 0,
            diagnostic_lines: 0,
            flushes: 0,
            flush_failures: 0,
            records_persisted: 0,
            records_dropped: 0,
            pending_records: 0,
            last_status: None,
            last_reading_at: None,
            last_flush_at: None,
            last_error: None,
        }
    }
}

impl MonitorState {
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

pub type SharedState = Arc<RwLock<MonitorState>>;

// ============================================================================
// Diagnostic log
// ============================================================================

/// A raw line that was not a reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticLine {
    pub line: String,
    pub at: DateTime<Local>,
}

/// Bounded log of recent diagnostic lines; the oldest are dropped and counted.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    entries: VecDeque<DiagnosticLine>,
    capacity: usize,
    dropped: u64,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, line: DiagnosticLine) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(line);
    }

    /// The most recent `limit` lines, oldest first
    pub fn recent(&self, limit: usize) -> Vec<DiagnosticLine> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lines evicted since start
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Diagnostic log shared with readers
#[derive(Debug, Clone)]
pub struct SharedDiagnostics {
    inner: Arc<Mutex<DiagnosticLog>>,
}

impl SharedDiagnostics {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DiagnosticLog::new(capacity))),
        }
    }

    pub fn push(&self, line: DiagnosticLine) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    /// Recent lines and the dropped count
    pub fn recent(&self, limit: usize) -> (Vec<DiagnosticLine>, u64) {
        let log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        (log.recent(limit), log.dropped())
    }
}
