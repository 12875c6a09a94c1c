//! API request handlers
//!
//! Every handler works through the [`ControlHandle`]; none touch ingestion
//! state directly.

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::pipeline::{ControlError, ControlHandle, DiagnosticLine, DisplayRange, MonitorState};
use crate::storage::{self, HistoryError};
use crate::types::{AlarmConfig, TelemetryRecord};

const DEFAULT_DIAGNOSTIC_LIMIT: usize = 100;

/// Map control failures onto the error envelope
fn control_error(e: ControlError) -> Response {
    match e {
        ControlError::InvalidThreshold(_) => ApiErrorResponse::bad_request(e.to_string()),
        ControlError::Transport(_) | ControlError::MonitorStopped => {
            ApiErrorResponse::service_unavailable(e.to_string())
        }
        ControlError::Persistence(_) => ApiErrorResponse::internal(e.to_string()),
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub state: MonitorState,
    pub uptime_secs: u64,
    pub alarm: AlarmConfig,
    pub buffer_len: usize,
    pub buffer_capacity: usize,
    pub visible_window: usize,
    /// Display colour of the latest status, if any
    pub status_color: Option<&'static str>,
}

/// GET /status
pub async fn get_status(State(handle): State<ControlHandle>) -> Response {
    let state = handle.status().await;
    let (buffer_capacity, visible_window) = handle.buffer_dimensions();
    let status_color = state.last_status.as_ref().map(|s| s.severity.color());
    ApiResponse::ok(StatusResponse {
        uptime_secs: state.uptime_secs(),
        status_color,
        state,
        alarm: handle.alarm_config(),
        buffer_len: handle.snapshot_buffer().len(),
        buffer_capacity,
        visible_window,
    })
}

// ============================================================================
// Buffer
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BufferQuery {
    /// Only the most recent `limit` records
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct BufferResponse {
    pub records: Vec<TelemetryRecord>,
    pub capacity: usize,
    pub visible_window: usize,
    pub display_range: Option<DisplayRange>,
}

/// GET /buffer
pub async fn get_buffer(
    State(handle): State<ControlHandle>,
    Query(query): Query<BufferQuery>,
) -> Response {
    let mut records = handle.snapshot_buffer();
    if let Some(limit) = query.limit {
        let skip = records.len().saturating_sub(limit);
        records.drain(..skip);
    }
    let (capacity, visible_window) = handle.buffer_dimensions();
    ApiResponse::ok(BufferResponse {
        records,
        capacity,
        visible_window,
        display_range: handle.display_range(),
    })
}

/// POST /buffer/clear
pub async fn clear_buffer(State(handle): State<ControlHandle>) -> Response {
    match handle.clear_buffer().await {
        Ok(()) => ApiResponse::ok(serde_json::json!({ "cleared": true })),
        Err(e) => control_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct WindowRequest {
    pub visible_window: usize,
}

/// PUT /buffer/window
pub async fn set_visible_window(
    State(handle): State<ControlHandle>,
    Json(req): Json<WindowRequest>,
) -> Response {
    match handle.set_visible_window(req.visible_window).await {
        Ok(applied) => ApiResponse::ok(serde_json::json!({ "visible_window": applied })),
        Err(e) => control_error(e),
    }
}

// ============================================================================
// Alarm
// ============================================================================

/// GET /alarm
pub async fn get_alarm(State(handle): State<ControlHandle>) -> Response {
    ApiResponse::ok(handle.alarm_config())
}

#[derive(Debug, Deserialize)]
pub struct AlarmRequest {
    pub threshold_bpm: u32,
}

/// PUT /alarm
pub async fn set_alarm(
    State(handle): State<ControlHandle>,
    Json(req): Json<AlarmRequest>,
) -> Response {
    match handle.set_alarm_threshold(req.threshold_bpm).await {
        Ok(config) => ApiResponse::ok(config),
        Err(e) => control_error(e),
    }
}

// ============================================================================
// Connection & persistence
// ============================================================================

/// POST /connect
pub async fn connect(State(handle): State<ControlHandle>) -> Response {
    match handle.connect().await {
        Ok(port) => ApiResponse::ok(serde_json::json!({ "port": port })),
        Err(e) => control_error(e),
    }
}

/// POST /disconnect
pub async fn disconnect(State(handle): State<ControlHandle>) -> Response {
    match handle.disconnect().await {
        Ok(()) => ApiResponse::ok(serde_json::json!({ "disconnected": true })),
        Err(e) => control_error(e),
    }
}

/// POST /flush
pub async fn flush(State(handle): State<ControlHandle>) -> Response {
    match handle.flush_now().await {
        Ok(report) => ApiResponse::ok(serde_json::json!({ "flushed": report })),
        Err(e) => control_error(e),
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DiagnosticsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub lines: Vec<DiagnosticLine>,
    pub dropped: u64,
}

/// GET /diagnostics
pub async fn get_diagnostics(
    State(handle): State<ControlHandle>,
    Query(query): Query<DiagnosticsQuery>,
) -> Response {
    let (lines, dropped) = handle.diagnostics(query.limit.unwrap_or(DEFAULT_DIAGNOSTIC_LIMIT));
    ApiResponse::ok(DiagnosticsResponse { lines, dropped })
}

// ============================================================================
// History
// ============================================================================

/// GET /history
pub async fn list_history(State(handle): State<ControlHandle>) -> Response {
    let Some(root) = handle.data_dir().map(|p| p.to_path_buf()) else {
        return ApiErrorResponse::not_found("No on-disk history for this monitor");
    };
    match tokio::task::spawn_blocking(move || storage::list_days(&root)).await {
        Ok(Ok(days)) => ApiResponse::ok(days),
        Ok(Err(e)) => ApiErrorResponse::internal(e.to_string()),
        Err(e) => ApiErrorResponse::internal(format!("History task failed: {e}")),
    }
}

/// GET /history/:date
pub async fn get_history_day(
    State(handle): State<ControlHandle>,
    Path(date): Path<String>,
) -> Response {
    let Ok(date) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
        return ApiErrorResponse::bad_request(format!("Invalid date '{date}', expected YYYY-MM-DD"));
    };
    let Some(root) = handle.data_dir().map(|p| p.to_path_buf()) else {
        return ApiErrorResponse::not_found("No on-disk history for this monitor");
    };
    match tokio::task::spawn_blocking(move || storage::load_day(&root, date)).await {
        Ok(Ok(rows)) => ApiResponse::ok(rows),
        Ok(Err(e @ HistoryError::NotFound(_))) => ApiErrorResponse::not_found(e.to_string()),
        Ok(Err(e)) => ApiErrorResponse::internal(e.to_string()),
        Err(e) => ApiErrorResponse::internal(format!("History task failed: {e}")),
    }
}
