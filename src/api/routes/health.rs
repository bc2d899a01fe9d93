//! Health Routes

use axum::{response::IntoResponse, Json};

/// GET /api/health
///
/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "presale-admin-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
