use axum::response::{IntoResponse, Json, Redirect};
use serde_json::json;

/// Health check (GET /health)
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Redirect (GET /) to the dashboard
pub async fn root() -> Redirect {
    Redirect::to("/visualization")
}
