//! HTTP handlers.

pub mod auth;
pub mod notes;
pub mod uploads;

use axum::response::IntoResponse;
use axum::Json;

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
