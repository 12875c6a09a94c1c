//! Control surface: commands into the monitor, events out of it
//!
//! Mutating requests travel over an mpsc channel to the ingestion task with
//! oneshot replies. Reads (buffer snapshot, status, alarm config, diagnostics)
//! go straight to the shared views and never wait on ingestion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::rolling_buffer::{DisplayRange, SharedBuffer};
use super::state::{ConnectionState, DiagnosticLine, MonitorState, SharedDiagnostics, SharedState};
use crate::storage::FlushReport;
use crate::types::{AlarmConfig, ClassifiedStatus, Reading, TelemetryRecord};

// ============================================================================
// Events
// ============================================================================

/// State-update notification broadcast to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    Reading {
        reading: Reading,
        status: ClassifiedStatus,
    },
    /// A line that was not a reading
    RawLine {
        line: String,
        at: DateTime<Local>,
    },
    ConnectionChanged {
        state: ConnectionState,
        port: Option<String>,
    },
    Flushed {
        records: usize,
        destination: PathBuf,
    },
    FlushFailed {
        error: String,
        pending: usize,
    },
    TransportError {
        message: String,
    },
    ThresholdChanged {
        threshold_bpm: u32,
    },
    BufferCleared,
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("monitor is not running")]
    MonitorStopped,
    #[error("alarm threshold {0} bpm is outside {min}-{max} bpm", min = AlarmConfig::MIN_THRESHOLD_BPM, max = AlarmConfig::MAX_THRESHOLD_BPM)]
    InvalidThreshold(u32),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Commands handled by the ingestion task
#[derive(Debug)]
pub enum ControlCommand {
    /// Open the transport; replies with the port name
    Connect {
        response_tx: oneshot::Sender<Result<String, ControlError>>,
    },
    /// Flush pending records and close the transport
    Disconnect {
        response_tx: oneshot::Sender<Result<(), ControlError>>,
    },
    SetAlarmThreshold {
        threshold_bpm: u32,
        response_tx: oneshot::Sender<Result<AlarmConfig, ControlError>>,
    },
    ClearBuffer {
        response_tx: oneshot::Sender<()>,
    },
    /// Flush regardless of the interval; `None` when nothing was pending
    FlushNow {
        response_tx: oneshot::Sender<Result<Option<FlushReport>, ControlError>>,
    },
    SetVisibleWindow {
        window: usize,
        response_tx: oneshot::Sender<usize>,
    },
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable handle to a running monitor
#[derive(Clone)]
pub struct ControlHandle {
    pub(crate) tx: mpsc::Sender<ControlCommand>,
    pub(crate) events: broadcast::Sender<MonitorEvent>,
    pub(crate) buffer: SharedBuffer<TelemetryRecord>,
    pub(crate) state: SharedState,
    pub(crate) alarm: Arc<ArcSwap<AlarmConfig>>,
    pub(crate) diagnostics: SharedDiagnostics,
    pub(crate) data_dir: Option<PathBuf>,
}

impl ControlHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ControlCommand,
    ) -> Result<T, ControlError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(make(response_tx))
            .await
            .map_err(|_| ControlError::MonitorStopped)?;
        response_rx.await.map_err(|_| ControlError::MonitorStopped)
    }

    /// Connect the transport. Returns the port name; already-connected is not an error.
    pub async fn connect(&self) -> Result<String, ControlError> {
        self.request(|response_tx| ControlCommand::Connect { response_tx })
            .await?
    }

    pub async fn disconnect(&self) -> Result<(), ControlError> {
        self.request(|response_tx| ControlCommand::Disconnect { response_tx })
            .await?
    }

    pub async fn set_alarm_threshold(&self, threshold_bpm: u32) -> Result<AlarmConfig, ControlError> {
        if !AlarmConfig::is_valid_threshold(threshold_bpm) {
            return Err(ControlError::InvalidThreshold(threshold_bpm));
        }
        self.request(|response_tx| ControlCommand::SetAlarmThreshold {
            threshold_bpm,
            response_tx,
        })
        .await?
    }

    pub async fn clear_buffer(&self) -> Result<(), ControlError> {
        self.request(|response_tx| ControlCommand::ClearBuffer { response_tx })
            .await
    }

    pub async fn flush_now(&self) -> Result<Option<FlushReport>, ControlError> {
        self.request(|response_tx| ControlCommand::FlushNow { response_tx })
            .await?
    }

    /// Set the display window; returns the value applied after clamping.
    pub async fn set_visible_window(&self, window: usize) -> Result<usize, ControlError> {
        self.request(|response_tx| ControlCommand::SetVisibleWindow {
            window,
            response_tx,
        })
        .await
    }

    /// Buffered records, oldest first
    pub fn snapshot_buffer(&self) -> Vec<TelemetryRecord> {
        self.buffer.snapshot()
    }

    /// Capacity and visible window of the rolling buffer
    pub fn buffer_dimensions(&self) -> (usize, usize) {
        let buffer = self.buffer.lock();
        (buffer.capacity(), buffer.visible_window())
    }

    pub fn display_range(&self) -> Option<DisplayRange> {
        self.buffer.lock().heart_rate_display_range()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> MonitorState {
        self.state.read().await.clone()
    }

    pub fn alarm_config(&self) -> AlarmConfig {
        **self.alarm.load()
    }

    /// Recent diagnostic lines and how many have been dropped
    pub fn diagnostics(&self, limit: usize) -> (Vec<DiagnosticLine>, u64) {
        self.diagnostics.recent(limit)
    }

    /// Root of the day logs, when persisting to disk
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// False once the monitor task has exited
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
