use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use common::time::now_ms;
use engine::allocation::AllocationRequest;

use crate::dto::{CreateReservationBody, ReservationCreatedResponse};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let reservations = state.service.list_active(now_ms()).await?;
    Ok(Json(serde_json::json!({ "reservations": reservations })))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateReservationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let req = AllocationRequest {
        caller_name: body.caller_name,
        situation: body.situation,
        needs: body.needs,
        language: body.language.unwrap_or_else(|| "en".to_string()),
    };

    let allocated = state.service.create(&req, now_ms()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ReservationCreatedResponse::from(allocated)),
    ))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.cancel(&code, now_ms()).await?;
    Ok(Json(serde_json::json!({ "code": code, "status": "cancelled" })))
}
