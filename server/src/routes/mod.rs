pub mod beds;
pub mod chat_ws;
pub mod health;
pub mod reservations;
pub mod voice_ws;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/beds/", get(beds::summary))
        .route("/api/beds/list", get(beds::list))
        .route("/api/beds/{id}/hold", post(beds::hold))
        .route("/api/beds/{id}/checkin", post(beds::checkin))
        .route("/api/beds/{id}/checkout", post(beds::checkout))
        .route("/api/beds/{id}/assign", post(beds::assign))
        .route("/api/reservations/", get(reservations::list).post(reservations::create))
        .route("/api/reservations/{code}/cancel", post(reservations::cancel))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/api/chat/ws", get(chat_ws::upgrade))
        .route("/api/voice/ws", get(voice_ws::upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
