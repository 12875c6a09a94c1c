//! WebSocket stream of monitor events.
//!
//! Clients connect to `/api/v1/ws` and receive every [`MonitorEvent`] as a
//! JSON text message tagged by `type`. A client that falls behind is sent a
//! `lagged` notice with the number of events it missed.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::pipeline::ControlHandle;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub async fn ws_handler(State(handle): State<ControlHandle>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, handle))
}

async fn handle_socket(socket: WebSocket, handle: ControlHandle) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = handle.subscribe();
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;

    tracing::debug!("WebSocket client connected");

    loop {
        tokio::select! {
            result = events.recv() => {
                let text = match result {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to serialize monitor event");
                            continue;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WebSocket client lagged, events dropped");
                        serde_json::json!({ "type": "lagged", "skipped": skipped }).to_string()
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("WebSocket client disconnected");
}
