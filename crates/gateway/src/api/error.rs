//! HTTP-boundary error translation, the single outermost layer where the
//! investigation-runtime error taxonomy becomes a status code and a JSON
//! body. The SSE stream itself never carries an HTTP error status mid
//! stream — once headers are sent, failures are expressed only as the
//! `error` SSEEvent.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use inv_domain::Error;
use serde_json::json;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::CapacityExceeded { .. } => StatusCode::CONFLICT,
            Error::ScenarioUnknown(_) => StatusCode::NOT_FOUND,
            Error::InvalidQuery(_) | Error::UnsupportedOperation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
