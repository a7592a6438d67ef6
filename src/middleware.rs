use axum::extract::{Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{info, trace, warn};
use uuid::Uuid;

use crate::client_ip::{client_identity, peer_address};
use crate::error::ThrottlerError;
use crate::rate_limiter::{Decision, RateLimiter};

pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Per-client throttling middleware, mounted with
/// `axum::middleware::from_fn_with_state(limiter, throttle)`.
///
/// Admitted requests are forwarded unchanged and the rate limit headers are
/// added to the downstream response. Rejected requests get a 429 with a
/// `Retry-After` hint and never reach the inner service. The limiter lock is
/// only held inside [`RateLimiter::check`], never across the inner call.
pub async fn throttle(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let peer = peer_address(request.extensions());
    let identity = client_identity(request.headers(), &peer);
    let decision = limiter.check(&identity);

    if !decision.allowed {
        warn!(
            target: "ip_throttler::middleware",
            client = %identity,
            limit = decision.limit,
            retry_after = decision.retry_after.unwrap_or(0),
            "Rate limit exceeded"
        );
        let mut response = ThrottlerError::RateLimitExceeded.into_response();
        apply_headers(response.headers_mut(), &decision);
        return response;
    }

    trace!(
        target: "ip_throttler::middleware",
        client = %identity,
        remaining = decision.remaining,
        "Request admitted"
    );

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}

/// Write the `X-RateLimit-*` headers, plus `Retry-After` on rejection.
pub fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(decision.reset_at));
    if let Some(retry_after) = decision.retry_after {
        headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
    }
}

/// Logging middleware for request/response tracking
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client = client_identity(request.headers(), &peer_address(request.extensions()));

    info!(
        target: "ip_throttler::middleware",
        %request_id,
        method = %method,
        uri = %uri,
        client = %client,
        "Incoming request"
    );

    let response = next.run(request).await;

    info!(
        target: "ip_throttler::middleware",
        %request_id,
        method = %method,
        uri = %uri,
        status = %response.status(),
        "Request completed"
    );

    response
}
