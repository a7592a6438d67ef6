use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ThrottlerError {
    /// The client used up its quota for the current window.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ThrottlerResult<T> = Result<T, ThrottlerError>;

impl ThrottlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ThrottlerError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ThrottlerError::Configuration(_) | ThrottlerError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<envconfig::Error> for ThrottlerError {
    fn from(err: envconfig::Error) -> Self {
        ThrottlerError::Configuration(err.to_string())
    }
}

impl IntoResponse for ThrottlerError {
    fn into_response(self) -> Response {
        ApiResponse::error(self.status_code(), &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_exceeded_maps_to_429() {
        let response = ThrottlerError::RateLimitExceeded.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_configuration_error_message() {
        let err = ThrottlerError::Configuration("RATE_WINDOW must be greater than zero".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.to_string(),
            "Configuration error: RATE_WINDOW must be greater than zero"
        );
    }
}
