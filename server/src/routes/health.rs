use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Readiness: the database answers and the bed/reservation invariants
/// hold. Violations are reported but (outside startup) do not stop serving;
/// a load balancer backing off is the right pressure valve.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    if sqlx::query("SELECT 1")
        .execute(state.service.pool())
        .await
        .is_err()
    {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "detail": "database unreachable" })),
        );
    }

    match state.service.verify_coherence().await {
        Ok(violations) if violations.is_empty() => {
            (StatusCode::OK, Json(json!({ "status": "ready" })))
        }
        Ok(violations) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "detail": violations })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "detail": e.to_string() })),
        ),
    }
}
