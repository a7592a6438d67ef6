use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// JSON envelope shared by every response body: `{"message": ..., "data": ...}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T = serde_json::Value> {
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            message: message.to_string(),
            data: Some(data),
        }
    }

    /// Render with the given status.
    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl ApiResponse {
    /// Error body with `data: null`. An empty message is replaced by the
    /// default text for `status`.
    pub fn error(status: StatusCode, message: &str) -> Response {
        let message = if message.is_empty() {
            default_error_message(status)
        } else {
            message
        };

        Self {
            message: message.to_string(),
            data: None,
        }
        .into_response_with(status)
    }
}

pub fn default_error_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "Not found",
        StatusCode::BAD_REQUEST => "Bad request",
        StatusCode::UNAUTHORIZED => "Unauthorized",
        StatusCode::FORBIDDEN => "Forbidden",
        StatusCode::INTERNAL_SERVER_ERROR => "Internal server error",
        _ => "Error",
    }
}
