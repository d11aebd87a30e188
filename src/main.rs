use std::net::IpAddr;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tiergate::cache::TtlCache;
use tiergate::config::TierGateConfig;
use tiergate::http::{AppState, HttpServer};
use tiergate::ratelimit::{CounterRecord, RateLimiterRegistry};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Tiered rate limiting gate for an RPC API.
#[derive(Debug, Parser)]
#[command(name = "tiergate", version, about)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind address
    #[arg(long)]
    host: Option<IpAddr>,

    /// Override the HTTP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    info!("Starting Tiergate Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = TierGateConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    info!(
        addr = %config.server.addr(),
        cors_origin = %config.server.cors_origin,
        environment = ?config.environment,
        "Configuration loaded"
    );

    // One cache shared by every tier
    let cache: Arc<TtlCache<CounterRecord>> =
        Arc::new(TtlCache::new(config.cache.to_cache_config()));
    let sweeper = cache.spawn_sweeper();

    let registry = Arc::new(RateLimiterRegistry::new(cache, config.rate_limiting));
    let state = AppState::new(registry, config.environment, config.server.cors_origin.clone());

    let server = HttpServer::new(config.server.addr(), state);
    server.serve_with_shutdown(shutdown_signal()).await?;

    if let Some(sweeper) = sweeper {
        sweeper.shutdown();
    }

    info!("Tiergate Rate Limiting Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
