//! # Station Context
//!
//! The one shared handle tying the bridge together: config, device client,
//! topology, store, and the admission gate.
//!
//! ## Admission Gate
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Single Admission Gate                       │
//! │                                                                 │
//! │  worker tick ──┐                                                │
//! │  manual cycle ─┼──► gate.lock().await ──► cycle steps ──► drop  │
//! │  close trigger ┘                                                │
//! │                                                                 │
//! │  The controller handles exactly one conversation at a time, so  │
//! │  every entry point serializes through the same mutex. The lock  │
//! │  is a guard: any exit path, error included, releases it.        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The topology is loaded exactly once here and never refreshed; changing
//! the physical station layout requires a daemon restart.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use forecourt_core::StationTopology;
use forecourt_db::{Database, DbConfig};

use crate::channel::{DeviceChannel, TcpChannel};
use crate::client::DeviceClient;
use crate::config::StationConfig;
use crate::dialect::OpcodeTable;
use crate::error::{SyncError, SyncResult};
use crate::reconciler::Reconciler;
use crate::sink::DebugSink;

/// Shared state for the station bridge.
pub struct StationContext {
    config: StationConfig,
    reconciler: Reconciler,
    topology: Arc<StationTopology>,
    db: Database,
    gate: Mutex<()>,
}

impl StationContext {
    /// Builds the context over a live TCP channel: opens the store, checks
    /// the link, loads the topology.
    pub async fn initialize(config: StationConfig) -> SyncResult<Arc<Self>> {
        let channel = Arc::new(TcpChannel::new(
            config.device.address.clone(),
            config.response_timeout(),
        ));
        Self::initialize_with_channel(config, channel).await
    }

    /// Same as [`initialize`](Self::initialize) but over an arbitrary
    /// channel (tests drive this with a scripted one).
    pub async fn initialize_with_channel(
        config: StationConfig,
        channel: Arc<dyn DeviceChannel>,
    ) -> SyncResult<Arc<Self>> {
        let db = Database::new(DbConfig::new(&config.sync.database_path)).await?;

        let ops = OpcodeTable::for_protocol_version(config.device.protocol_version);
        let client = Arc::new(DeviceClient::new(channel, ops));

        if !client.check_connection().await? {
            return Err(SyncError::Reconcile(
                "controller reachable but link check was refused".into(),
            ));
        }

        let topology = Arc::new(client.fetch_topology().await?);
        info!(
            pumps = topology.pump_count(),
            tanks = topology.tank_count(),
            protocol_version = config.device.protocol_version,
            "Station context initialized"
        );

        let sink = config.debug.sink_path.clone().map(DebugSink::new);
        let reconciler = Reconciler::new(client, topology.clone(), db.clone(), sink);

        Ok(Arc::new(StationContext {
            config,
            reconciler,
            topology,
            db,
            gate: Mutex::new(()),
        }))
    }

    /// Runs one full cycle under the gate. This is what the worker calls on
    /// every tick and what a manual trigger calls on demand; overlapping
    /// callers queue on the gate instead of interleaving device exchanges.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> SyncResult<()> {
        let _guard = self.gate.lock().await;

        self.reconciler.record_all_dispatches().await?;
        self.reconciler.sync_tanks().await?;
        self.reconciler
            .sweep_invoicing(self.config.invoicing.cutoff_secs)
            .await?;
        self.reconciler.handle_close_request().await?;

        Ok(())
    }

    /// Raises the shift-close flag. The close itself happens inside the
    /// next cycle, under the gate, between the same steps as always.
    pub async fn request_shift_close(&self) -> SyncResult<()> {
        self.db.closures().request_close().await?;
        Ok(())
    }

    /// Reads the running shift totals without closing. Manual entry point;
    /// takes the gate like every other device conversation.
    pub async fn current_shift(&self) -> SyncResult<forecourt_core::ShiftClosure> {
        let _guard = self.gate.lock().await;
        self.reconciler_client().fetch_current_shift().await
    }

    /// Link check against the controller, under the gate.
    pub async fn check_connection(&self) -> SyncResult<bool> {
        let _guard = self.gate.lock().await;
        self.reconciler_client().check_connection().await
    }

    /// Records a single pump's dispatch report on demand, under the gate
    /// (1-based pump number as the device counts them).
    pub async fn record_pump(&self, pump: u8) -> SyncResult<()> {
        if pump == 0 || pump as usize > self.topology.pump_count() {
            return Err(SyncError::Reconcile(format!("pump {pump} is not configured")));
        }

        let _guard = self.gate.lock().await;
        self.reconciler.record_pump(pump).await
    }

    /// Station layout as loaded at startup.
    pub fn topology(&self) -> &StationTopology {
        &self.topology
    }

    /// Store handle (for status queries alongside the loop).
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Active configuration.
    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    fn reconciler_client(&self) -> &DeviceClient {
        self.reconciler.client()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::MockChannel;
    use forecourt_core::frame::SEPARATOR;
    use std::path::PathBuf;

    fn frame(fields: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        for f in fields {
            buf.extend_from_slice(f.as_bytes());
            buf.push(SEPARATOR);
        }
        buf.extend(std::iter::repeat(0u8).take(16));
        buf
    }

    fn startup_replies(channel: &MockChannel) {
        channel.push_reply(vec![0x00, SEPARATOR]); // link check
        channel.push_reply(frame(&[
            "0", "1", "9", "1", "1", // conf, pumps, reserved, tanks, products
            "1", "1", "1", // pump 1: tier, one hose, product 1
            "1", // tank 1 product
            "101", "2.00", // product 1
        ]));
    }

    fn test_config() -> StationConfig {
        let mut config = StationConfig::default();
        config.sync.database_path = PathBuf::from(":memory:");
        config
    }

    #[tokio::test]
    async fn test_initialize_loads_topology_once() {
        let channel = Arc::new(MockChannel::new());
        startup_replies(&channel);

        let ctx = StationContext::initialize_with_channel(test_config(), channel.clone())
            .await
            .unwrap();

        assert_eq!(ctx.topology().pump_count(), 1);
        // Exactly two exchanges: link check and topology.
        assert_eq!(channel.sent_commands().len(), 2);
    }

    #[tokio::test]
    async fn test_refused_link_check_fails_startup() {
        let channel = Arc::new(MockChannel::new());
        channel.push_reply(vec![0xFF, SEPARATOR]);

        let result = StationContext::initialize_with_channel(test_config(), channel).await;
        assert!(matches!(result.err(), Some(SyncError::Reconcile(_))));
    }

    #[tokio::test]
    async fn test_overlapping_cycles_serialize_on_the_gate() {
        let channel = Arc::new(MockChannel::new());
        startup_replies(&channel);
        // Two full cycles: dispatch + tanks each (no close request pending).
        for _ in 0..2 {
            channel.push_reply(frame(&[
                "0",
                "4", "77", "1", "10.00", "5.00", "2.00", "0", "A00001",
                "4", "0", "1", "0.00", "0.00", "0.00", "0", "   ",
            ]));
            channel.push_reply(frame(&["0", "100", "0", "0", "0", "900", "0", "1000", "0"]));
        }

        let ctx = StationContext::initialize_with_channel(test_config(), channel)
            .await
            .unwrap();

        // Launched concurrently, the gate forces them to run back to back;
        // each consumes its own replies in order.
        let (a, b) = tokio::join!(ctx.run_cycle(), ctx.run_cycle());
        a.unwrap();
        b.unwrap();

        assert_eq!(ctx.db().dispatches().list_for_pump(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_single_pump_record() {
        let channel = Arc::new(MockChannel::new());
        startup_replies(&channel);
        channel.push_reply(frame(&[
            "0",
            "4", "77", "1", "10.00", "5.00", "2.00", "0", "A00007",
            "4", "0", "1", "0.00", "0.00", "0.00", "0", "   ",
        ]));

        let ctx = StationContext::initialize_with_channel(test_config(), channel.clone())
            .await
            .unwrap();

        // Out-of-range pump is rejected before the device is contacted.
        assert!(ctx.record_pump(9).await.is_err());
        assert_eq!(ctx.topology().pump_count(), 1);

        ctx.record_pump(1).await.unwrap();
        assert!(ctx.db().dispatches().exists(1, 7).await.unwrap());
    }

    #[tokio::test]
    async fn test_cycle_error_releases_the_gate() {
        let channel = Arc::new(MockChannel::new());
        startup_replies(&channel);
        // First cycle: device error on the dispatch poll.
        channel.push_error(crate::error::DeviceError::ConnectionFailed("down".into()));
        // Second cycle: healthy replies.
        channel.push_reply(frame(&[
            "0",
            "4", "77", "1", "10.00", "5.00", "2.00", "0", "A00001",
            "4", "0", "1", "0.00", "0.00", "0.00", "0", "   ",
        ]));
        channel.push_reply(frame(&["0", "100", "0", "0", "0", "900", "0", "1000", "0"]));

        let ctx = StationContext::initialize_with_channel(test_config(), channel)
            .await
            .unwrap();

        assert!(ctx.run_cycle().await.is_err());
        // The failed cycle did not poison the gate.
        ctx.run_cycle().await.unwrap();
        assert!(ctx.db().dispatches().exists(1, 1).await.unwrap());
    }
}
