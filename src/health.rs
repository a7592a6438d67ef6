use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::rate_limiter::{LimiterStats, RateLimiter};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub rate_limiter: LimiterStats,
}

static START_TIME: std::sync::LazyLock<SystemTime> = std::sync::LazyLock::new(SystemTime::now);

pub struct HealthChecker {
    rate_limiter: RateLimiter,
}

impl HealthChecker {
    pub fn new(rate_limiter: RateLimiter) -> Self {
        Self { rate_limiter }
    }

    /// Reports "degraded" once the resetter is no longer running, since
    /// exhausted clients then stay blocked.
    pub fn check_health(&self) -> HealthStatus {
        let now = SystemTime::now();
        let uptime = now.duration_since(*START_TIME).unwrap_or_default().as_secs();

        let rate_limiter = self.rate_limiter.stats();
        let status = if rate_limiter.resetter_running {
            "healthy"
        } else {
            "degraded"
        };

        HealthStatus {
            status: status.to_string(),
            timestamp: now.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
            rate_limiter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::RateLimitSettings;
    use std::time::Duration;

    #[tokio::test]
    async fn test_health_reflects_resetter_state() {
        let limiter = RateLimiter::new(RateLimitSettings::new(5, Duration::from_secs(60)));
        limiter.check("192.0.2.1");
        let checker = HealthChecker::new(limiter.clone());

        let health = checker.check_health();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.rate_limiter.limit, 5);
        assert_eq!(health.rate_limiter.window_seconds, 60);
        assert_eq!(health.rate_limiter.tracked_clients, 1);

        limiter.stop().await;
        assert_eq!(checker.check_health().status, "degraded");
    }
}
