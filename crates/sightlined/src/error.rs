use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced to HTTP clients as `{"error": "<message>"}`.
///
/// Internal failures carry a fixed public message; details go to the log,
/// never to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A required field is absent or empty.
    #[error("{0}")]
    InputMissing(&'static str),

    /// The request body is not the expected JSON.
    #[error("Invalid request body")]
    InvalidBody,

    #[error("No face detected in image")]
    NoFaceDetected,

    /// Operation failed after the input was accepted.
    #[error("{0}")]
    Internal(&'static str),

    #[error("Not found")]
    NotFound,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InputMissing(_) | ApiError::InvalidBody | ApiError::NoFaceDetected => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
