//! Artiforge Daemon
//!
//! Background service that owns the backend storage and exposes the
//! `config/admin` path over a local JSON-RPC socket.
//!
//! # Running
//!
//! ```bash
//! cargo run -p artiforge-daemon
//! # or after install:
//! artiforged
//! ```

use anyhow::Result;
use artiforge_daemon::{load_config, start_server, ApiState, DaemonConfig};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(&config.log_level);

    info!("Starting Artiforge daemon...");
    info!("Loaded configuration from {:?}", config.config_path);

    run_daemon(config).await
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_daemon(config: DaemonConfig) -> Result<()> {
    info!("Daemon starting on {:?}", config.socket_path);
    info!("Storage at {:?}", config.storage_dir());

    let state = ApiState::new(&config)?;

    let server_handle = start_server(&config.socket_path, state).await?;

    info!("Daemon running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping server...");

    server_handle.stop().await?;

    info!("Daemon stopped");
    Ok(())
}
