use anyhow::Result;
use clap::Parser;
use ip_throttler::config::Config;
use ip_throttler::server::Server;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line overrides for values otherwise read from the environment
#[derive(Debug, Parser)]
#[command(name = "ip-throttler", version, about = "Per-client fixed-window request throttling")]
struct Cli {
    /// Server bind address (BIND_ADDR)
    #[arg(long)]
    bind_addr: Option<SocketAddr>,

    /// Requests admitted per client per window (RATE_LIMIT)
    #[arg(long)]
    rate_limit: Option<u32>,

    /// Window length, e.g. "120s" (RATE_WINDOW)
    #[arg(long)]
    rate_window: Option<humantime::Duration>,

    /// Distinct clients tracked before a full reset (MAX_VISITORS)
    #[arg(long)]
    max_visitors: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    if let Some(bind_addr) = cli.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(rate_limit) = cli.rate_limit {
        config.rate_limit = rate_limit;
    }
    if let Some(rate_window) = cli.rate_window {
        config.rate_window = rate_window;
    }
    if let Some(max_visitors) = cli.max_visitors {
        config.max_visitors = max_visitors;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ip_throttler={},tower_http=debug", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ip-throttler service");
    tracing::info!(
        "Configuration: bind_addr={}, rate_limit={}, rate_window={}, max_visitors={}",
        config.bind_addr,
        config.rate_limit,
        config.rate_window,
        config.max_visitors
    );

    let server = Server::new(config)
        .map_err(|e| anyhow::anyhow!("Failed to create server: {}", e))?;

    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
