//! # Reconciler
//!
//! One cycle's worth of work: pull the controller's state and fold it into
//! the store.
//!
//! ## Cycle Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Reconciliation Cycle                       │
//! │                                                                 │
//! │  1. DISPATCHES   per pump, ascending:                           │
//! │       fetch ──► current slot ──► previous slot                  │
//! │       skip non-final snapshots (dispensing / sale 0 / key 0)    │
//! │       conditional insert; duplicate key = already recorded      │
//! │                                                                 │
//! │  2. TANKS        fetch all, upsert latest reading per tank      │
//! │                                                                 │
//! │  3. INVOICING    bulk-mark dispatches older than the cutoff     │
//! │                                                                 │
//! │  4. SHIFT CLOSE  consume a pending request, close on device,    │
//! │                  persist the closure report                     │
//! │                                                                 │
//! │  Any error aborts the REST of the cycle only; the next tick     │
//! │  starts fresh. No backoff, no crash.                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Re-polling is the normal case: the same final sale is seen on every
//! cycle until the device displaces it, so the duplicate-key conflict from
//! the store is swallowed as "already recorded".

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use forecourt_core::{DispatchSnapshot, StationTopology};
use forecourt_db::{Database, NewDispatch};

use crate::client::DeviceClient;
use crate::error::SyncResult;
use crate::sink::DebugSink;

/// Folds device state into the store, one cycle at a time.
pub struct Reconciler {
    client: Arc<DeviceClient>,
    topology: Arc<StationTopology>,
    db: Database,
    sink: Option<DebugSink>,
}

impl Reconciler {
    pub fn new(
        client: Arc<DeviceClient>,
        topology: Arc<StationTopology>,
        db: Database,
        sink: Option<DebugSink>,
    ) -> Self {
        Reconciler { client, topology, db, sink }
    }

    /// The underlying device client (for manual read-only commands).
    pub fn client(&self) -> &DeviceClient {
        &self.client
    }

    /// Step 1: records every pump's dispatch report, pumps in ascending
    /// order, current slot before previous slot.
    #[instrument(skip(self))]
    pub async fn record_all_dispatches(&self) -> SyncResult<()> {
        for pump in 1..=self.topology.pump_count() {
            self.record_pump(pump as u8).await?;
        }
        Ok(())
    }

    /// Records one pump's current and previous slots.
    pub(crate) async fn record_pump(&self, pump: u8) -> SyncResult<()> {
        let dispatch = self.client.fetch_dispatch(pump).await?;

        self.persist_snapshot(pump, &dispatch.current, false).await?;

        if let Some(previous) = &dispatch.previous {
            self.persist_snapshot(pump, previous, true).await?;
        }

        Ok(())
    }

    /// Persists one snapshot if it is final and not yet recorded.
    ///
    /// The previous slot is best-effort backfill: a record id there that
    /// cannot be parsed is stale device memory, not a fault, so it is
    /// dropped silently instead of aborting the cycle.
    async fn persist_snapshot(
        &self,
        pump: u8,
        snapshot: &DispatchSnapshot,
        is_previous: bool,
    ) -> SyncResult<()> {
        let key = match snapshot.final_record_key() {
            Ok(Some(key)) => key,
            Ok(None) => return Ok(()),
            Err(e) if is_previous => {
                debug!(pump, record_id = %snapshot.record_id, error = %e, "Skipping stale previous slot");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(sink) = &self.sink {
            sink.record(pump, snapshot);
        }

        // Resolve the device product code. An unknown code still gets
        // persisted under its raw value, flagged so it stands out later.
        let (product_id, price_mismatch) = match self.topology.resolve_product(snapshot.product_code)
        {
            Some(product) => (product.id, product.price != snapshot.unit_price),
            None => {
                warn!(
                    pump,
                    code = snapshot.product_code,
                    "Product code has no topology entry, persisting raw"
                );
                (snapshot.product_code, true)
            }
        };

        let row = NewDispatch {
            pump_id: i64::from(pump),
            record_id: key,
            sale_id: snapshot.sale_id,
            product_id,
            amount: snapshot.amount.to_string(),
            volume: snapshot.volume.to_string(),
            unit_price: snapshot.unit_price.to_string(),
            price_mismatch,
            invoiced: snapshot.invoiced,
        };

        match self.db.dispatches().insert_if_absent(&row).await {
            Ok(()) => {
                info!(pump, record_id = key, sale = snapshot.sale_id, "Dispatch recorded");
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                debug!(pump, record_id = key, "Dispatch already recorded");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Step 2: refreshes every tank's stored reading.
    #[instrument(skip(self))]
    pub async fn sync_tanks(&self) -> SyncResult<()> {
        let count = self.topology.tank_count();
        if count == 0 {
            return Ok(());
        }

        let tanks = self.client.fetch_tanks(count).await?;
        for (idx, tank) in tanks.iter().enumerate() {
            let tank_id = idx as i64 + 1;
            self.db
                .tanks()
                .upsert(
                    tank_id,
                    &tank.product_volume.to_string(),
                    &tank.total().to_string(),
                )
                .await?;
        }

        Ok(())
    }

    /// Step 3: bulk-marks old dispatches invoiced. A cutoff of zero or less
    /// disables the sweep.
    #[instrument(skip(self))]
    pub async fn sweep_invoicing(&self, cutoff_secs: i64) -> SyncResult<u64> {
        if cutoff_secs <= 0 {
            return Ok(0);
        }

        let cutoff = Utc::now() - Duration::seconds(cutoff_secs);
        let flipped = self.db.dispatches().mark_invoiced_before(cutoff).await?;
        if flipped > 0 {
            info!(rows = flipped, "Invoicing sweep marked dispatches");
        }
        Ok(flipped)
    }

    /// Step 4: if a close was requested, performs it on the device and
    /// persists the final report. The request flag is consumed before the
    /// device call; a failure after that point is logged by the caller and
    /// the shift is simply closed without a stored report being retried,
    /// since the device cannot replay a closed shift.
    #[instrument(skip(self))]
    pub async fn handle_close_request(&self) -> SyncResult<bool> {
        if !self.db.closures().take_close_request().await? {
            return Ok(false);
        }

        info!("Performing requested shift close");
        let closure = self.client.close_shift().await?;
        let closure_id = self.db.closures().insert_closure(&closure).await?;
        info!(closure_id, "Shift closure persisted");

        if let Some(sink) = &self.sink {
            sink.record_closure(closure_id, &closure);
        }

        Ok(true)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
