//! Ingestion loop
//!
//! One task owns the transport, the persistence batcher and the only writers
//! to the rolling buffer, diagnostics and monitor state:
//!
//! ```text
//! line -> LineParser -> validate -> classify -> { RollingBuffer, PersistenceBatcher, MonitorEvent }
//!      \-> (not a reading) -> DiagnosticLog + RawLine event
//! ```
//!
//! A transport error or end of stream returns the loop to Disconnected; it
//! never reconnects on its own. Flushes run inline on this task, so a slow
//! disk stalls line processing for the duration of one batch write.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Local;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::control::{ControlCommand, ControlError, ControlHandle, MonitorEvent};
use super::rolling_buffer::SharedBuffer;
use super::source::{Connector, LineEvent, LineSource};
use super::state::{ConnectionState, DiagnosticLine, MonitorState, SharedDiagnostics, SharedState};
use crate::acquisition::{parse_reading, LineParser, TransportError};
use crate::classification::classify;
use crate::config::{defaults, MonitorConfig};
use crate::storage::{FlushOutcome, FlushReport, PersistenceBatcher, PersistenceError, RecordSink};
use crate::types::{AlarmConfig, TelemetryRecord};

/// Monitor tuning, usually derived from [`MonitorConfig`]
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub buffer_capacity: usize,
    pub visible_window: usize,
    pub diagnostic_capacity: usize,
    pub flush_interval: chrono::Duration,
    pub max_pending: usize,
    pub alarm: AlarmConfig,
    pub auto_connect: bool,
    pub event_capacity: usize,
    /// Day log root reported to the control surface for history browsing
    pub data_dir: Option<PathBuf>,
}

impl MonitorSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            buffer_capacity: config.buffer.capacity,
            visible_window: config.buffer.visible_window,
            diagnostic_capacity: config.buffer.diagnostic_capacity,
            flush_interval: config.persistence.flush_interval(),
            max_pending: config.persistence.max_pending,
            alarm: config.alarm,
            auto_connect: config.monitor.auto_connect,
            event_capacity: config.monitor.event_capacity,
            data_dir: Some(config.persistence.data_dir.clone()),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

pub struct Monitor {
    connector: Box<dyn Connector>,
    source: Option<Box<dyn LineSource>>,
    parser: LineParser,
    batcher: PersistenceBatcher<Box<dyn RecordSink>>,
    buffer: SharedBuffer<TelemetryRecord>,
    diagnostics: SharedDiagnostics,
    state: SharedState,
    alarm: Arc<ArcSwap<AlarmConfig>>,
    events: broadcast::Sender<MonitorEvent>,
    rx: mpsc::Receiver<ControlCommand>,
    auto_connect: bool,
}

impl Monitor {
    /// Create the monitor and its control handle
    pub fn new(
        settings: MonitorSettings,
        connector: Box<dyn Connector>,
        sink: Box<dyn RecordSink>,
    ) -> (Self, ControlHandle) {
        let (tx, rx) = mpsc::channel(defaults::COMMAND_CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));

        let buffer = SharedBuffer::new(settings.buffer_capacity, settings.visible_window);
        let diagnostics = SharedDiagnostics::new(settings.diagnostic_capacity);
        let state: SharedState = Arc::new(tokio::sync::RwLock::new(MonitorState::default()));
        let alarm = Arc::new(ArcSwap::from_pointee(settings.alarm));

        let batcher = PersistenceBatcher::new(sink, settings.flush_interval, Local::now())
            .with_max_pending(settings.max_pending);

        let handle = ControlHandle {
            tx,
            events: events.clone(),
            buffer: buffer.clone(),
            state: Arc::clone(&state),
            alarm: Arc::clone(&alarm),
            diagnostics: diagnostics.clone(),
            data_dir: settings.data_dir.clone(),
        };

        let monitor = Self {
            connector,
            source: None,
            parser: LineParser::new(),
            batcher,
            buffer,
            diagnostics,
            state,
            alarm,
            events,
            rx,
            auto_connect: settings.auto_connect,
        };

        (monitor, handle)
    }

    /// Run until cancelled or every handle is dropped.
    ///
    /// Pending records get a final flush and the transport is closed on exit.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(transport = self.connector.kind(), "Monitor starting");

        if self.auto_connect {
            if let Err(e) = self.connect().await {
                warn!(error = %e, "Auto-connect failed, waiting for operator");
            }
        }

        loop {
            match self.source.as_mut() {
                Some(source) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        cmd = self.rx.recv() => match cmd {
                            Some(cmd) => self.handle_command(cmd).await,
                            None => break,
                        },
                        event = source.next_line() => self.handle_line_event(event).await,
                    }
                }
                None => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        cmd = self.rx.recv() => match cmd {
                            Some(cmd) => self.handle_command(cmd).await,
                            None => break,
                        },
                    }
                }
            }
        }

        self.close_transport("shutdown").await;
        info!("Monitor stopped");
    }

    // ========================================================================
    // Transport lifecycle
    // ========================================================================

    async fn connect(&mut self) -> Result<String, ControlError> {
        if let Some(source) = &self.source {
            return Ok(source.source_name().to_string());
        }

        self.set_connection(ConnectionState::Connecting, None).await;

        match self.connector.connect().await {
            Ok(source) => {
                let port = source.source_name().to_string();
                info!(port = %port, transport = self.connector.kind(), "Transport connected");
                self.source = Some(source);
                self.state.write().await.last_error = None;
                self.set_connection(ConnectionState::Streaming, Some(port.clone())).await;
                Ok(port)
            }
            Err(e) => {
                warn!(error = %e, "Transport unavailable");
                self.report_transport_error(&e).await;
                self.set_connection(ConnectionState::Disconnected, None).await;
                Err(ControlError::Transport(e.to_string()))
            }
        }
    }

    /// Final best-effort flush, then drop the source.
    async fn close_transport(&mut self, reason: &str) {
        if self.batcher.pending_len() > 0 {
            match self.batcher.flush() {
                Ok(outcome) => {
                    self.record_flush(outcome).await;
                }
                Err(e) => {
                    warn!(reason, error = %e, "Final flush failed, records stay pending");
                    self.record_flush_failure(&e).await;
                }
            }
        }

        if let Some(source) = self.source.take() {
            info!(port = %source.source_name(), reason, "Transport closed");
            self.set_connection(ConnectionState::Disconnected, None).await;
        }
    }

    async fn set_connection(&self, connection: ConnectionState, port: Option<String>) {
        {
            let mut state = self.state.write().await;
            state.connection = connection;
            state.port = port.clone();
        }
        self.emit(MonitorEvent::ConnectionChanged {
            state: connection,
            port,
        });
    }

    async fn report_transport_error(&self, e: &TransportError) {
        self.state.write().await.last_error = Some(e.to_string());
        self.emit(MonitorEvent::TransportError {
            message: e.to_string(),
        });
    }

    // ========================================================================
    // Lines
    // ========================================================================

    async fn handle_line_event(&mut self, event: Result<LineEvent, TransportError>) {
        match event {
            Ok(LineEvent::Line(line)) => {
                self.process_line(line).await;
                self.maybe_flush().await;
            }
            Ok(LineEvent::Idle) => self.maybe_flush().await,
            Ok(LineEvent::Closed) => {
                info!("Transport reached end of stream");
                self.close_transport("end of stream").await;
            }
            Err(e) => {
                error!(error = %e, "Transport read failed, disconnecting");
                self.report_transport_error(&e).await;
                self.close_transport("read failure").await;
            }
        }
    }

    async fn process_line(&mut self, line: String) {
        let now = Local::now();

        let Some(reading) = parse_reading(&self.parser, &line, now) else {
            if LineParser::contains_marker(&line) {
                debug!(line = %line, "Malformed prediction line");
            }
            self.diagnostics.push(DiagnosticLine {
                line: line.clone(),
                at: now,
            });
            {
                let mut state = self.state.write().await;
                state.lines_received += 1;
                state.diagnostic_lines += 1;
            }
            self.emit(MonitorEvent::RawLine { line, at: now });
            return;
        };

        let alarm = **self.alarm.load();
        let status = classify(&reading, &alarm);

        if status.severity.is_alarmed() {
            debug!(
                hr = reading.heart_rate_bpm,
                status = %status.text,
                severity = %status.severity,
                "Alarmed reading"
            );
        }

        let record = TelemetryRecord::new(reading.clone(), status.clone());
        self.buffer.push(record.clone());
        self.batcher.append(record);

        {
            let mut state = self.state.write().await;
            state.lines_received += 1;
            state.readings += 1;
            state.last_status = Some(status.clone());
            state.last_reading_at = Some(now);
            state.pending_records = self.batcher.pending_len();
            state.records_dropped = self.batcher.dropped();
        }

        self.emit(MonitorEvent::Reading { reading, status });
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    async fn maybe_flush(&mut self) {
        match self.batcher.maybe_flush(Local::now()) {
            Ok(outcome) => {
                self.record_flush(outcome).await;
            }
            Err(e) => self.record_flush_failure(&e).await,
        }
    }

    async fn record_flush(&self, outcome: FlushOutcome) -> Option<FlushReport> {
        let FlushOutcome::Flushed(report) = outcome else {
            return None;
        };
        {
            let mut state = self.state.write().await;
            state.flushes += 1;
            state.records_persisted += report.records as u64;
            state.pending_records = self.batcher.pending_len();
            state.last_flush_at = Some(report.flushed_at);
        }
        self.emit(MonitorEvent::Flushed {
            records: report.records,
            destination: report.destination.clone(),
        });
        Some(report)
    }

    async fn record_flush_failure(&self, e: &PersistenceError) {
        let pending = self.batcher.pending_len();
        {
            let mut state = self.state.write().await;
            state.flush_failures += 1;
            state.pending_records = pending;
            state.last_error = Some(e.to_string());
        }
        self.emit(MonitorEvent::FlushFailed {
            error: e.to_string(),
            pending,
        });
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn handle_command(&mut self, cmd: ControlCommand) {
        match cmd {
            ControlCommand::Connect { response_tx } => {
                let result = self.connect().await;
                let _ = response_tx.send(result);
            }
            ControlCommand::Disconnect { response_tx } => {
                self.close_transport("operator disconnect").await;
                let _ = response_tx.send(Ok(()));
            }
            ControlCommand::SetAlarmThreshold {
                threshold_bpm,
                response_tx,
            } => {
                let result = if AlarmConfig::is_valid_threshold(threshold_bpm) {
                    let config = AlarmConfig::new(threshold_bpm);
                    self.alarm.store(Arc::new(config));
                    info!(threshold_bpm, "Alarm threshold updated");
                    self.emit(MonitorEvent::ThresholdChanged { threshold_bpm });
                    Ok(config)
                } else {
                    Err(ControlError::InvalidThreshold(threshold_bpm))
                };
                let _ = response_tx.send(result);
            }
            ControlCommand::ClearBuffer { response_tx } => {
                self.buffer.clear();
                debug!("Rolling buffer cleared");
                self.emit(MonitorEvent::BufferCleared);
                let _ = response_tx.send(());
            }
            ControlCommand::FlushNow { response_tx } => {
                let result = match self.batcher.flush() {
                    Ok(outcome) => Ok(self.record_flush(outcome).await),
                    Err(e) => {
                        self.record_flush_failure(&e).await;
                        Err(ControlError::Persistence(e.to_string()))
                    }
                };
                let _ = response_tx.send(result);
            }
            ControlCommand::SetVisibleWindow {
                window,
                response_tx,
            } => {
                let applied = self.buffer.set_visible_window(window);
                let _ = response_tx.send(applied);
            }
        }
    }

    /// Broadcast to observers; having none is not an error
    fn emit(&self, event: MonitorEvent) {
        let _ = self.events.send(event);
    }
}
