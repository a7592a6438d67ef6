pub mod client_ip;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod rate_limiter;
pub mod resetter;
pub mod response;
pub mod server;

pub use config::Config;
pub use error::{ThrottlerError, ThrottlerResult};
pub use rate_limiter::{Decision, RateLimitSettings, RateLimiter};
pub use response::ApiResponse;
pub use server::create_app;
