//! # stationd - Forecourt Station Bridge Daemon
//!
//! Boots the station context and runs the polling loop until interrupted.
//!
//! ## Usage
//! ```text
//! stationd [CONFIG_PATH]
//!
//! CONFIG_PATH   optional path to station.toml; defaults to the platform
//!               config directory
//! ```
//!
//! Logging is controlled via `RUST_LOG` (e.g. `RUST_LOG=forecourt_sync=debug`).

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use forecourt_sync::{StationConfig, StationContext, SyncWorker};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "stationd failed");
        std::process::exit(1);
    }
}

async fn run() -> forecourt_sync::SyncResult<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = StationConfig::load(config_path)?;

    info!(
        address = %config.device.address,
        protocol_version = config.device.protocol_version,
        "Starting station bridge"
    );

    let context: Arc<StationContext> = StationContext::initialize(config).await?;

    let (worker, handle) = SyncWorker::new(context);
    let worker_task = tokio::spawn(worker.run());

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| forecourt_sync::SyncError::Reconcile(format!("signal handler: {e}")))?;
    info!("Interrupt received, shutting down");

    let _ = handle.shutdown().await;
    let _ = worker_task.await;

    Ok(())
}
