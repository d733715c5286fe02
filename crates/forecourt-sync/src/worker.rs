//! # Sync Worker
//!
//! The polling loop: one reconciliation cycle per tick, forever.
//!
//! ## Loop Behavior
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Worker Loop                              │
//! │                                                                 │
//! │  every poll_interval:                                           │
//! │      run_cycle()                                                │
//! │        ├── Ok  ──► wait for next tick                           │
//! │        └── Err ──► log, wait for next tick (no backoff,         │
//! │                    no retry, no crash)                          │
//! │                                                                 │
//! │  shutdown signal ──► break, loop exits cleanly                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed cycle leaves no partial lock behind: the admission gate lives
//! inside `run_cycle` and is released by guard drop on every path.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::context::StationContext;
use crate::error::{SyncError, SyncResult};

/// Background polling worker over a [`StationContext`].
pub struct SyncWorker {
    context: Arc<StationContext>,
    poll_interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping the worker.
#[derive(Clone)]
pub struct SyncWorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SyncWorkerHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::Reconcile("worker already stopped".into()))
    }
}

impl SyncWorker {
    /// Creates a worker and its control handle.
    pub fn new(context: Arc<StationContext>) -> (Self, SyncWorkerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let poll_interval = context.config().poll_interval();

        let worker = SyncWorker { context, poll_interval, shutdown_rx };
        let handle = SyncWorkerHandle { shutdown_tx };

        (worker, handle)
    }

    /// Runs the polling loop. Spawn this as a background task.
    pub async fn run(mut self) {
        info!(interval = ?self.poll_interval, "Sync worker starting");

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.context.run_cycle().await {
                        error!(error = %e, "Cycle failed, waiting for next tick");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Sync worker shutting down");
                    break;
                }
            }
        }

        info!("Sync worker stopped");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
