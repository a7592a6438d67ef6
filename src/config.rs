use envconfig::Envconfig;
use std::net::SocketAddr;

use crate::error::{ThrottlerError, ThrottlerResult};
use crate::rate_limiter::RateLimitSettings;

#[derive(Debug, Envconfig, Clone)]
pub struct Config {
    /// Server bind address
    #[envconfig(from = "BIND_ADDR", default = "127.0.0.1:3000")]
    pub bind_addr: SocketAddr,

    /// Requests admitted per client per window
    #[envconfig(from = "RATE_LIMIT", default = "15")]
    pub rate_limit: u32,

    /// Window length, e.g. "120s" or "2m"
    #[envconfig(from = "RATE_WINDOW", default = "120s")]
    pub rate_window: humantime::Duration,

    /// Distinct clients tracked before a reset clears every counter
    #[envconfig(from = "MAX_VISITORS", default = "1000")]
    pub max_visitors: usize,

    /// Default log filter when RUST_LOG is unset
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    /// Reject values the limiter cannot run with.
    ///
    /// A zero rate limit is allowed: every request is then rejected.
    pub fn validate(&self) -> ThrottlerResult<()> {
        if self.rate_window.is_zero() {
            return Err(ThrottlerError::Configuration(
                "RATE_WINDOW must be greater than zero".to_string(),
            ));
        }

        if self.max_visitors == 0 {
            return Err(ThrottlerError::Configuration(
                "MAX_VISITORS must be greater than zero".to_string(),
            ));
        }

        if self.rate_limit == 0 {
            tracing::warn!("RATE_LIMIT is 0, every request will be rejected");
        }

        Ok(())
    }

    pub fn rate_limit_settings(&self) -> RateLimitSettings {
        RateLimitSettings::new(self.rate_limit, *self.rate_window)
            .with_max_visitors(self.max_visitors)
    }
}
