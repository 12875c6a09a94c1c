//! API Regression Tests
//!
//! Full router (`create_app`) over a monitor writing to a temporary data
//! directory: connect over HTTP, let a replay finish, then read the
//! persisted day back through the history endpoints.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use vitals_monitor::api::create_app;
use vitals_monitor::pipeline::{ConnectionState, ReplayConnector};
use vitals_monitor::storage::DailyCsvLog;
use vitals_monitor::{Monitor, MonitorEvent, MonitorSettings};

const LINES: [&str; 3] = [
    "MAX30102 initialized",
    "| ML PREDICTION: Class 3 (Low SpO2!) | Inputs: HR=96, SpO2=89.5, HRV=41.0, Acc=1.00 |",
    "| ML PREDICTION: Class 2 (Moving) | Inputs: HR=112, SpO2=98.0, HRV=52.5, Acc=3.40 |",
];

async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
}

#[tokio::test]
async fn test_replayed_session_is_browsable_over_http() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = MonitorSettings {
        auto_connect: false,
        flush_interval: chrono::Duration::hours(1),
        data_dir: Some(dir.path().to_path_buf()),
        ..MonitorSettings::default()
    };
    let (monitor, handle) = Monitor::new(
        settings,
        Box::new(ReplayConnector::from_lines(LINES, Duration::ZERO)),
        Box::new(DailyCsvLog::new(dir.path())),
    );
    let cancel = CancellationToken::new();
    let task = tokio::spawn(monitor.run(cancel.clone()));
    let app = create_app(handle.clone());
    let mut events = handle.subscribe();

    let (status, json) = call(&app, "POST", "/api/v1/connect").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["meta"]["timestamp"].is_string());

    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event before timeout")
            .expect("event channel open");
        if matches!(
            event,
            MonitorEvent::ConnectionChanged {
                state: ConnectionState::Disconnected,
                ..
            }
        ) {
            break;
        }
    }

    let (status, json) = call(&app, "GET", "/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["readings"], 2);
    assert_eq!(json["data"]["records_persisted"], 2);
    // Latest reading is Moving at 112 bpm: informational, under the threshold
    assert_eq!(json["data"]["status_color"], "blue");
    assert!(json["data"]["uptime_secs"].is_u64());

    let (status, json) = call(&app, "GET", "/api/v1/diagnostics?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["lines"][0]["line"], "MAX30102 initialized");

    let (status, json) = call(&app, "GET", "/api/v1/history").await;
    assert_eq!(status, StatusCode::OK);
    let days = json["data"].as_array().expect("day list");
    assert_eq!(days.len(), 1);
    let date = days[0]["date"].as_str().expect("date string").to_string();

    let (status, json) = call(&app, "GET", &format!("/api/v1/history/{date}")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = json["data"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["status"], "Low SpO2!");
    assert_eq!(rows[0]["spo2_percent"], 89.5);
    assert_eq!(rows[1]["status"], "Moving");

    let (status, json) = call(&app, "GET", "/api/v1/history/1999-01-01").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");

    cancel.cancel();
    task.await.expect("monitor task");
}
