//! Error types for the relay HTTP layer.
//!
//! [`ObserverError`] unifies request-level failures into a single enum
//! that converts into an Axum response with a `{"error": ..}` body via
//! its [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_types::ValidationError;

/// Errors that can occur while handling one request.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The submission was malformed or incomplete.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = ObserverError::from(ValidationError::MissingField { field: "rep" });
        assert_eq!(err.to_string(), "missing required field 'rep'");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_maps_to_server_error() {
        let resp = ObserverError::Internal(String::from("boom")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
