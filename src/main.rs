//! Briefly gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                    GATEWAY                            │
//!   request        │  ┌───────────┐   ┌───────────┐   ┌────────────────┐  │
//!   ───────────────┼─▶│ tower     │──▶│ gating    │──▶│ protected      │  │
//!                  │  │ layers    │   │ middleware│   │ wrapper        │  │
//!                  │  └───────────┘   └─────┬─────┘   └───────┬────────┘  │
//!                  │                        │                 ▼           │
//!                  │                  ┌─────▼─────┐   ┌────────────────┐  │
//!                  │                  │ identity  │   │ handlers       │  │
//!                  │                  │ resolver  │   │ usage, billing │  │
//!                  │                  └───────────┘   │ tickets, admin │  │
//!   response       │                                  └───────┬────────┘  │
//!   ◀──────────────┼──── envelope + security headers + CORS ◀──┘           │
//!                  │                                                       │
//!                  │  config (watch + swap) · observability · lifecycle    │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use briefly_gateway::config::validation::validate_config;
use briefly_gateway::config::{load_config, ConfigError, ConfigWatcher, GatewayConfig};
use briefly_gateway::http::{build_state, HttpServer};
use briefly_gateway::lifecycle::{wait_for_shutdown, Shutdown};
use briefly_gateway::observability::{init_logging, init_metrics};

#[derive(Parser)]
#[command(name = "briefly-gateway", version, about = "Auth gating gateway for Briefly Cloud")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "BRIEFLY_CONFIG")]
    config: Option<PathBuf>,
}

fn load(path: Option<&PathBuf>) -> Result<GatewayConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = GatewayConfig::default();
            config.apply_env();
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(cli.config.as_ref())?;

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "briefly-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        production = config.deployment.production,
        identity = ?config.identity.backend,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let (state, memory) = build_state(config)?;
    let shutdown = Shutdown::new(Duration::from_secs(state.config.timeouts.request_secs));

    // Hot reload of gate settings. The watcher handle must outlive the server.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            let state = state.clone();
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(next) = updates.recv() => state.reload_gate(&next),
                        _ = stop.recv() => break,
                    }
                }
            });
            Some(handle)
        }
        None => None,
    };

    // Idle rate-limit windows are dropped once they can no longer limit anyone.
    {
        let rate_limits = memory.rate_limits.clone();
        let max_idle = Duration::from_secs(state.config.rate_limit.duration_secs.max(60) * 2);
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(max_idle);
            loop {
                tokio::select! {
                    _ = ticker.tick() => rate_limits.prune(max_idle),
                    _ = stop.recv() => break,
                }
            }
        });
    }

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_shutdown().await;
            shutdown.trigger();
        });
    }

    HttpServer::new(state).run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
