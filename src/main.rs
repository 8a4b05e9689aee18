//! Sentinel tunnel
//!
//! Exposes each configured Redis replication group on a local port and
//! forwards every client connection to the group's current master, as
//! reported by the configured Sentinel services.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentinel_relay::TunnelRunner;
use sentinel_resolver::Resolver;

mod config;

use config::TunnelConfig;

/// TCP tunnel to the current master of each configured Redis replication
/// group, discovered through Sentinel
#[derive(Parser, Debug)]
#[command(name = "sentinel-tunnel")]
#[command(about = "Tunnel local ports to Redis masters discovered via Sentinel", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SENTINEL_TUNNEL_LOG")]
    log_level: String,
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting sentinel tunnel"
    );

    let config = TunnelConfig::load(&cli.config)?;

    let resolver = Resolver::new(config.sentinels_addresses_list).await?;
    info!("done initializing tunnelling");

    let runner = TunnelRunner::new(config.databases, resolver);

    tokio::select! {
        result = runner.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}
