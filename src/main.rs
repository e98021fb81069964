use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bouncer::config::{BouncerConfig, LoggingConfig};
use bouncer::http::{HttpServer, RateLimitService};
use bouncer::ratelimit::{RateLimiter, RuleSet};
use bouncer::tasks;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "bouncer")]
#[command(about = "Fixed-window rate limiting for edge function handlers")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to serve on, overriding the configuration file
    #[arg(long)]
    http_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BouncerConfig::from_file(path)?,
        None => BouncerConfig::default(),
    };
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }

    init_tracing(&config.logging);

    info!("Starting Bouncer Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(http_addr = %config.server.http_addr, "Configuration loaded");

    let rules = match &config.rate_limiting.rules_path {
        Some(path) => RuleSet::from_file(path)?,
        None => RuleSet::new(),
    };
    info!(
        default_window_ms = rules.default.window_ms(),
        default_max_requests = rules.default.max_requests(),
        overrides = rules.functions.len(),
        "Rate limit rules loaded"
    );

    let limiter = Arc::new(RateLimiter::new());
    let service = RateLimitService::new(
        Arc::clone(&limiter),
        rules,
        config.server.allowed_origins.clone(),
    );

    if let Some(secs) = config.rate_limiting.sweep_interval_secs.filter(|s| *s > 0) {
        tasks::spawn_sweeper(Arc::clone(&limiter), Duration::from_secs(secs));
    }
    if let (Some(path), Some(secs)) = (
        &config.rate_limiting.rules_path,
        config.rate_limiting.rules_reload_interval_secs.filter(|s| *s > 0),
    ) {
        tasks::spawn_rules_reloader(service.clone(), PathBuf::from(path), Duration::from_secs(secs));
    }

    let server = HttpServer::new(config.server.http_addr, service);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Bouncer Rate Limiting Service stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }
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
