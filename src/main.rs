//! Rebalance: a self-registering HTTP reverse proxy.
//!
//! Services announce themselves through `/rebalance/join` (or the sidecar),
//! and every other request is spread across them round robin.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌─────────────────────────────────────────────────────────┐
//!                              │                       REBALANCE                         │
//!                              │                                                         │
//!     Client Request           │  ┌─────────┐    ┌─────────┐    ┌──────────────┐         │
//!     ─────────────────────────┼─▶│   net   │───▶│  http   │───▶│   routing    │         │
//!                              │  │listener │    │ server  │    │retry/failover│         │
//!                              │  └─────────┘    └────┬────┘    └──────┬───────┘         │
//!                              │                      │                │                 │
//!     Join Request             │                      ▼                ▼                 │
//!     ─────────────────────────┼─────────────▶ ┌──────────────┐  ┌──────────────┐         │
//!                              │               │  http::join  │─▶│load_balancer │         │
//!                              │               └──────────────┘  │ pool + rr    │         │
//!                              │                                 └──────┬───────┘         │
//!                              │                                        │                 │
//!     Client Response          │                                        ▼                 │
//!     ◀────────────────────────┼──────────────────────────────── ┌──────────────┐        │
//!                              │                                 │   service    │◀───────┼──── Service
//!                              │                                 │  forwarder   │        │
//!                              │                                 └──────────────┘        │
//!                              │  ┌────────────────────────────────────────────────────┐ │
//!                              │  │  config │ health monitor │ observability │ lifecycle│ │
//!                              │  └────────────────────────────────────────────────────┘ │
//!                              └─────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use rebalance::config::loader::load_config;
use rebalance::lifecycle::{signals, startup, Shutdown};
use rebalance::observability::{logging, metrics};
use rebalance::{HttpServer, ProxyConfig, ServicePool};

#[derive(Parser)]
#[command(name = "rebalance")]
#[command(about = "Self-registering HTTP reverse proxy", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Hosts file joined at startup (overrides `join.hosts_file`)
    #[arg(long)]
    hosts_file: Option<PathBuf>,

    /// Listen address (overrides `listener.bind_address`)
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    if args.debug {
        config.observability.log_level = "debug".to_string();
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("rebalance v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        health_interval_secs = config.health_check.interval_secs,
        max_retries = config.retries.max_retries,
        max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pool = Arc::new(ServicePool::new(&config));
    let hosts_file = args
        .hosts_file
        .unwrap_or_else(|| PathBuf::from(&config.join.hosts_file));
    let joined = startup::preload_hosts(&pool, &hosts_file).await?;
    if joined > 0 {
        tracing::info!(services = joined, "Startup join complete");
    }

    let listener = rebalance::net::bind(&config.listener).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_signal(shutdown.clone()));

    let server = HttpServer::with_pool(config, pool);
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
