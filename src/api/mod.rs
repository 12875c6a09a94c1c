//! HTTP/WebSocket adapter over the monitor's control surface
//!
//! Exposes status, the rolling buffer, alarm configuration, transport and
//! flush control, diagnostics, persisted history and a live event stream to a
//! browser or desktop front-end.

pub mod envelope;
pub mod handlers;
mod routes;
pub mod websocket;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::ControlHandle;

pub use routes::api_routes;

/// Environment variable listing allowed cross-origin front-ends
pub const CORS_ENV_VAR: &str = "VITALS_CORS_ORIGINS";

/// Same-origin unless `VITALS_CORS_ORIGINS` lists allowed origins
/// (comma-separated, e.g. `http://localhost:5173`).
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var(CORS_ENV_VAR) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the application router.
pub fn create_app(handle: ControlHandle) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(handle))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
