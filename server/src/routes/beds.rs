use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use common::time::now_ms;

use crate::dto::{AssignBody, CheckinQuery, HoldBody, ReservationCreatedResponse};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn summary(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let counts = state.service.bed_counts().await?;
    Ok(Json(counts))
}

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let beds = state.service.bed_snapshot().await?;
    Ok(Json(beds))
}

/// Manual front-desk hold on a specific bed. Creates a shadow reservation
/// whose code staff can use to cancel or check in later.
pub async fn hold(
    State(state): State<AppState>,
    Path(bed_id): Path<u16>,
    body: Option<Json<HoldBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let note = body.map(|Json(b)| b.note).unwrap_or_default();
    let allocated = state.service.hold(bed_id, &note, now_ms()).await?;
    Ok(Json(ReservationCreatedResponse::from(allocated)))
}

pub async fn checkin(
    State(state): State<AppState>,
    Path(bed_id): Path<u16>,
    Query(query): Query<CheckinQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .check_in(&query.reservation_id, bed_id, now_ms())
        .await?;
    Ok(Json(serde_json::json!({ "bed_id": bed_id, "status": "occupied" })))
}

pub async fn checkout(
    State(state): State<AppState>,
    Path(bed_id): Path<u16>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.check_out(bed_id, now_ms()).await?;
    Ok(Json(serde_json::json!({ "bed_id": bed_id, "status": "available" })))
}

pub async fn assign(
    State(state): State<AppState>,
    Path(bed_id): Path<u16>,
    Json(body): Json<AssignBody>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.assign_guest(bed_id, &body.guest_id).await?;
    Ok(Json(serde_json::json!({ "bed_id": bed_id, "guest_id": body.guest_id })))
}
