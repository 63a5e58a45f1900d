use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use engine::error::EngineError;

/// HTTP-facing wrapper over the engine's closed error-kind set.
/// Every error body is `{"detail": <string>}`.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Expired(_) => StatusCode::GONE,
            EngineError::NoCapacity => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error surfaced to client");
        }

        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: EngineError) -> StatusCode {
        ApiError(e).into_response().status()
    }

    #[test]
    fn kinds_map_to_the_documented_status_codes() {
        assert_eq!(status_of(EngineError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(EngineError::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(EngineError::conflict("x")), StatusCode::CONFLICT);
        assert_eq!(status_of(EngineError::Expired("x".into())), StatusCode::GONE);
        assert_eq!(status_of(EngineError::NoCapacity), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(EngineError::Timeout("x".into())),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(EngineError::internal("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
