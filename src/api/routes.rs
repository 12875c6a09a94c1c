//! API route definitions
//!
//! - /api/v1/status - connection state, counters, alarm config
//! - /api/v1/buffer - rolling buffer snapshot and display range
//! - /api/v1/alarm - get/set the high-BPM threshold
//! - /api/v1/connect, /disconnect, /flush - transport and persistence control
//! - /api/v1/diagnostics - recent non-reading lines
//! - /api/v1/history - persisted day logs
//! - /api/v1/ws - live event stream

use axum::{
    routing::{get, post, put},
    Router,
};

use super::{handlers, websocket};
use crate::pipeline::ControlHandle;

pub fn api_routes(handle: ControlHandle) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/buffer", get(handlers::get_buffer))
        .route("/buffer/clear", post(handlers::clear_buffer))
        .route("/buffer/window", put(handlers::set_visible_window))
        .route("/alarm", get(handlers::get_alarm).put(handlers::set_alarm))
        .route("/connect", post(handlers::connect))
        .route("/disconnect", post(handlers::disconnect))
        .route("/flush", post(handlers::flush))
        .route("/diagnostics", get(handlers::get_diagnostics))
        .route("/history", get(handlers::list_history))
        .route("/history/:date", get(handlers::get_history_day))
        .route("/ws", get(websocket::ws_handler))
        .with_state(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Monitor, MonitorSettings, ReplayConnector};
    use crate::storage::MemorySink;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn spawn_monitor() -> (ControlHandle, CancellationToken) {
        let settings = MonitorSettings {
            auto_connect: false,
            data_dir: None,
            ..MonitorSettings::default()
        };
        let (monitor, handle) = Monitor::new(
            settings,
            Box::new(ReplayConnector::from_lines(Vec::<String>::new(), Duration::ZERO)),
            Box::new(MemorySink::new()),
        );
        let cancel = CancellationToken::new();
        tokio::spawn(monitor.run(cancel.clone()));
        (handle, cancel)
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_status_reports_disconnected() {
        let (handle, cancel) = spawn_monitor();
        let (status, json) = send(api_routes(handle), "GET", "/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["connection"], "disconnected");
        assert_eq!(json["data"]["alarm"]["threshold_bpm"], 120);
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_set_alarm_threshold() {
        let (handle, cancel) = spawn_monitor();

        let (status, json) =
            send(api_routes(handle.clone()), "PUT", "/alarm", Some(r#"{"threshold_bpm":135}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["threshold_bpm"], 135);

        let (status, json) = send(api_routes(handle.clone()), "GET", "/alarm", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["threshold_bpm"], 135);

        let (status, json) =
            send(api_routes(handle), "PUT", "/alarm", Some(r#"{"threshold_bpm":0}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_buffer_and_window() {
        let (handle, cancel) = spawn_monitor();

        let (status, json) = send(api_routes(handle.clone()), "GET", "/buffer", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["records"].as_array().map(Vec::len), Some(0));
        assert!(json["data"]["display_range"].is_null());

        let (status, json) = send(
            api_routes(handle.clone()),
            "PUT",
            "/buffer/window",
            Some(r#"{"visible_window":50}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["visible_window"], 50);

        let (status, _) = send(api_routes(handle), "POST", "/buffer/clear", None).await;
        assert_eq!(status, StatusCode::OK);
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_flush_with_nothing_pending() {
        let (handle, cancel) = spawn_monitor();
        let (status, json) = send(api_routes(handle), "POST", "/flush", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["data"]["flushed"].is_null());
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_history_without_data_dir() {
        let (handle, cancel) = spawn_monitor();
        let (status, _) = send(api_routes(handle.clone()), "GET", "/history", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, json) = send(api_routes(handle), "GET", "/history/not-a-date", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_stopped_monitor_is_unavailable() {
        let (handle, cancel) = spawn_monitor();
        cancel.cancel();
        while handle.is_running() {
            tokio::task::yield_now().await;
        }
        let (status, _) = send(api_routes(handle), "POST", "/connect", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
