//! Ingestion Pipeline Tests
//!
//! Drives a real `Monitor` over scripted replay lines and checks what comes
//! out the other end: events, buffer contents and persisted batches.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use vitals_monitor::pipeline::{ConnectionState, ReplayConnector};
use vitals_monitor::storage::{list_days, load_file, DailyCsvLog, MemorySink, RecordSink};
use vitals_monitor::{ControlHandle, Monitor, MonitorEvent, MonitorSettings, Severity, StatusLabel};

const STRESS_HIGH_BPM: &str =
    "12:00:01.123 -> | ML PREDICTION: Class 1 (Stress/Risk) | Inputs: HR=130, SpO2=97.0, HRV=25.0, Acc=1.05";
const SATURATED_SPO2: &str =
    "| ML PREDICTION: Class 0 (Normal) | Inputs: HR=72, SpO2=101.2, HRV=60.0, Acc=0.98 |";
const ARRHYTHMIA: &str =
    "| ML PREDICTION: Class 4 (Arrhythmia!) | Inputs: HR=182, SpO2=96.4, HRV=9.5, Acc=1.01 |";

fn settings() -> MonitorSettings {
    MonitorSettings {
        auto_connect: false,
        // Long enough that only end-of-stream or explicit flushes persist
        flush_interval: chrono::Duration::hours(1),
        data_dir: None,
        ..MonitorSettings::default()
    }
}

fn start(lines: &[&str], sink: Box<dyn RecordSink>) -> (ControlHandle, CancellationToken, tokio::task::JoinHandle<()>) {
    let connector = ReplayConnector::from_lines(lines.iter().copied(), Duration::ZERO);
    let (monitor, handle) = Monitor::new(settings(), Box::new(connector), sink);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(monitor.run(cancel.clone()));
    (handle, cancel, task)
}

/// Collect events until the transport reports Disconnected
async fn until_disconnected(rx: &mut broadcast::Receiver<MonitorEvent>) -> Vec<MonitorEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event before timeout")
            .expect("event channel open");
        let done = matches!(
            event,
            MonitorEvent::ConnectionChanged {
                state: ConnectionState::Disconnected,
                ..
            }
        );
        events.push(event);
        if done {
            return events;
        }
    }
}

fn readings(events: &[MonitorEvent]) -> Vec<(vitals_monitor::Reading, vitals_monitor::ClassifiedStatus)> {
    events
        .iter()
        .filter_map(|e| match e {
            MonitorEvent::Reading { reading, status } => Some((reading.clone(), status.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_stress_line_above_threshold_becomes_high_bpm_alert() {
    let sink = MemorySink::new();
    let (handle, cancel, task) = start(&[STRESS_HIGH_BPM], Box::new(sink.clone()));
    let mut rx = handle.subscribe();

    handle.connect().await.expect("connect");
    let events = until_disconnected(&mut rx).await;

    let seen = readings(&events);
    assert_eq!(seen.len(), 1);
    let (reading, status) = &seen[0];
    assert_eq!(reading.heart_rate_bpm, 130);
    assert_eq!(reading.spo2_percent, 97.0);
    assert_eq!(reading.hrv_ms, 25.0);
    assert_eq!(reading.accel_g, 1.05);
    assert_eq!(status.text, "Stress/Risk (HIGH BPM!)");
    assert_eq!(status.severity, Severity::Alert);

    cancel.cancel();
    task.await.expect("monitor task");
}

#[tokio::test]
async fn test_saturated_spo2_is_clamped_before_display_and_storage() {
    let sink = MemorySink::new();
    let (handle, cancel, task) = start(&[SATURATED_SPO2], Box::new(sink.clone()));
    let mut rx = handle.subscribe();

    handle.connect().await.expect("connect");
    let events = until_disconnected(&mut rx).await;

    let seen = readings(&events);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.spo2_percent, 99.9);
    assert!(seen[0].0.tags.spo2_clamped);
    assert_eq!(seen[0].1.severity, Severity::Safe);

    let buffered = handle.snapshot_buffer();
    assert_eq!(buffered[0].reading.spo2_percent, 99.9);

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].1[0].reading.spo2_percent, 99.9);

    cancel.cancel();
    task.await.expect("monitor task");
}

#[tokio::test]
async fn test_diagnostic_text_is_forwarded_not_buffered() {
    let lines = [
        "rst:0x1 (POWERON_RESET),boot:0x13",
        "| ML PREDICTION: Class 1 (Stress/Risk) | Inputs: HR=abc, SpO2=97.0, HRV=25.0, Acc=1.05 |",
        SATURATED_SPO2,
        "| WARNING: Low signal quality (Corr: 0.31). Temp:31.50.",
    ];
    let (handle, cancel, task) = start(&lines, Box::new(MemorySink::new()));
    let mut rx = handle.subscribe();

    handle.connect().await.expect("connect");
    let events = until_disconnected(&mut rx).await;

    let raw: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            MonitorEvent::RawLine { line, .. } => Some(line.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(raw, vec![lines[0], lines[1], lines[3]]);
    assert_eq!(handle.snapshot_buffer().len(), 1);

    let (recent, dropped) = handle.diagnostics(10);
    assert_eq!(recent.len(), 3);
    assert_eq!(dropped, 0);

    let state = handle.status().await;
    assert_eq!(state.lines_received, 4);
    assert_eq!(state.readings, 1);
    assert_eq!(state.diagnostic_lines, 3);

    cancel.cancel();
    task.await.expect("monitor task");
}

#[tokio::test]
async fn test_failed_final_flush_is_retried_by_flush_now() {
    let sink = MemorySink::new();
    sink.fail_next(1);
    let (handle, cancel, task) = start(&[STRESS_HIGH_BPM, ARRHYTHMIA], Box::new(sink.clone()));
    let mut rx = handle.subscribe();

    handle.connect().await.expect("connect");
    let events = until_disconnected(&mut rx).await;

    assert!(events
        .iter()
        .any(|e| matches!(e, MonitorEvent::FlushFailed { pending: 2, .. })));
    assert_eq!(sink.record_count(), 0);
    assert_eq!(handle.status().await.pending_records, 2);

    let report = handle
        .flush_now()
        .await
        .expect("retry succeeds")
        .expect("records were pending");
    assert_eq!(report.records, 2);

    // One batch, both records, arrival order, no duplicates
    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    let hrs: Vec<u32> = batches[0].1.iter().map(|r| r.reading.heart_rate_bpm).collect();
    assert_eq!(hrs, vec![130, 182]);

    // Nothing left to flush
    assert!(handle.flush_now().await.expect("flush").is_none());

    let state = handle.status().await;
    assert_eq!(state.flush_failures, 1);
    assert_eq!(state.records_persisted, 2);
    assert_eq!(state.pending_records, 0);

    cancel.cancel();
    task.await.expect("monitor task");
}

#[tokio::test]
async fn test_threshold_change_applies_to_later_readings() {
    let (handle, cancel, task) = start(&[STRESS_HIGH_BPM], Box::new(MemorySink::new()));
    let mut rx = handle.subscribe();

    handle.set_alarm_threshold(150).await.expect("threshold");
    handle.connect().await.expect("connect");
    let events = until_disconnected(&mut rx).await;

    assert!(events
        .iter()
        .any(|e| matches!(e, MonitorEvent::ThresholdChanged { threshold_bpm: 150 })));
    let seen = readings(&events);
    assert_eq!(seen[0].1.text, "Stress/Risk");
    assert_eq!(seen[0].1.label, StatusLabel::StressRisk);
    assert_eq!(seen[0].1.severity, Severity::Warning);
    assert!(!seen[0].1.high_bpm_override);

    cancel.cancel();
    task.await.expect("monitor task");
}

#[tokio::test]
async fn test_clear_buffer_empties_snapshot() {
    let (handle, cancel, task) = start(&[SATURATED_SPO2, ARRHYTHMIA], Box::new(MemorySink::new()));
    let mut rx = handle.subscribe();

    handle.connect().await.expect("connect");
    until_disconnected(&mut rx).await;
    assert_eq!(handle.snapshot_buffer().len(), 2);
    assert!(handle.display_range().is_some());

    handle.clear_buffer().await.expect("clear");
    assert!(handle.snapshot_buffer().is_empty());
    assert!(handle.display_range().is_none());

    cancel.cancel();
    task.await.expect("monitor task");
}

#[tokio::test]
async fn test_replayed_session_lands_in_daily_csv() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sink = DailyCsvLog::new(dir.path());
    let (handle, cancel, task) = start(&["boot", STRESS_HIGH_BPM, ARRHYTHMIA], Box::new(sink));
    let mut rx = handle.subscribe();

    handle.connect().await.expect("connect");
    until_disconnected(&mut rx).await;
    cancel.cancel();
    task.await.expect("monitor task");

    let days = list_days(dir.path()).expect("list days");
    assert_eq!(days.len(), 1);
    let rows = load_file(&days[0].path, days[0].date).expect("load day");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].heart_rate_bpm, 130.0);
    assert_eq!(rows[0].status.as_deref(), Some("Stress/Risk (HIGH BPM!)"));
    assert_eq!(rows[1].heart_rate_bpm, 182.0);
    assert_eq!(rows[1].status.as_deref(), Some("Arrhythmia! (HIGH BPM!)"));
    assert_eq!(rows[1].class_id, Some(4));
}

#[tokio::test]
async fn test_operator_disconnect_flushes_and_allows_reconnect() {
    let sink = MemorySink::new();
    // A slow replay keeps the transport open long enough to disconnect it
    let connector = ReplayConnector::from_lines([SATURATED_SPO2, ARRHYTHMIA], Duration::from_secs(30));
    let (monitor, handle) = Monitor::new(settings(), Box::new(connector), Box::new(sink.clone()));
    let cancel = CancellationToken::new();
    let task = tokio::spawn(monitor.run(cancel.clone()));
    let mut rx = handle.subscribe();

    handle.connect().await.expect("connect");
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event before timeout")
            .expect("event channel open");
        if matches!(event, MonitorEvent::Reading { .. }) {
            break;
        }
    }
    assert_eq!(handle.status().await.connection, ConnectionState::Streaming);

    handle.disconnect().await.expect("disconnect");
    assert_eq!(handle.status().await.connection, ConnectionState::Disconnected);
    assert_eq!(sink.record_count(), 1);

    // Disconnected is not terminal
    assert_eq!(handle.connect().await.expect("reconnect"), "replay");
    assert_eq!(handle.status().await.connection, ConnectionState::Streaming);

    cancel.cancel();
    task.await.expect("monitor task");
}
