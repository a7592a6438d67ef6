use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::health::HealthChecker;
use crate::rate_limiter::RateLimiter;
use crate::response::ApiResponse;

/// Application state shared with route handlers
#[derive(Clone)]
pub struct AppState {
    pub rate_limiter: RateLimiter,
}

pub async fn index() -> impl IntoResponse {
    ApiResponse::success("Ok", json!({ "service": env!("CARGO_PKG_NAME") }))
        .into_response_with(StatusCode::OK)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let checker = HealthChecker::new(state.rate_limiter.clone());
    Json(checker.check_health())
}

/// Unmatched routes, rendered with the shared envelope
pub async fn not_found() -> impl IntoResponse {
    ApiResponse::error(StatusCode::NOT_FOUND, "")
}
