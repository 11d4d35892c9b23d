use crate::app_state::AppState;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// GET /health - Health check with component status
pub async fn health_check(State(state): State<AppState>) -> Response {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "operational",
        Err(_) => "unavailable",
    };

    let health = json!({
        "status": if database == "operational" { "healthy" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "components": {
            "database": database,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (StatusCode::OK, Json(health)).into_response()
}

/// GET /live - Liveness probe (is the process alive?)
pub async fn liveness_check() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// GET /ready - Readiness probe (ready to accept traffic?)
pub async fn readiness_check(State(state): State<AppState>) -> Response {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, "Ready").into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready").into_response(),
    }
}
