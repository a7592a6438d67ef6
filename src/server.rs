use crate::config::Config;
use crate::error::ThrottlerResult;
use crate::handlers::{health_check, index, not_found, AppState};
use crate::middleware::{logging_middleware, throttle};
use crate::rate_limiter::RateLimiter;
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router with the throttle wrapped around every route.
///
/// Layer order, outermost first: tracing, CORS, request logging, throttle.
/// CORS answers preflight requests before they reach the throttle.
pub fn create_app(rate_limiter: RateLimiter) -> Router {
    let state = AppState {
        rate_limiter: rate_limiter.clone(),
    };

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware))
                .layer(middleware::from_fn_with_state(rate_limiter, throttle)),
        )
}

pub struct Server {
    config: Config,
    rate_limiter: RateLimiter,
}

impl Server {
    /// Validate the configuration and start the rate limiter.
    pub fn new(config: Config) -> ThrottlerResult<Self> {
        config.validate()?;
        let rate_limiter = RateLimiter::new(config.rate_limit_settings());

        Ok(Self {
            config,
            rate_limiter,
        })
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Serve until Ctrl+C or SIGTERM, then stop the rate limiter.
    pub async fn run(self) -> ThrottlerResult<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!("Throttler server listening on {}", listener.local_addr()?);
        tracing::info!(
            "Rate limit: {} requests per {} per client",
            self.config.rate_limit,
            self.config.rate_window
        );

        let app = create_app(self.rate_limiter.clone());
        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        self.rate_limiter.stop().await;
        served?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
