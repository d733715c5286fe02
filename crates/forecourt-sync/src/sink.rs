//! # Debug Sink
//!
//! Optional flat-file dump of every dispatch the reconciler sees, enabled
//! via `[debug] sink_path` in the config. Strictly a field-technician aid;
//! sink failures are logged and never fail a cycle.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

use forecourt_core::{DispatchSnapshot, ShiftClosure};

/// Appends one line per observed dispatch snapshot to a file.
pub struct DebugSink {
    path: PathBuf,
    // Serializes appends from overlapping manual triggers.
    lock: Mutex<()>,
}

impl DebugSink {
    pub fn new(path: PathBuf) -> Self {
        DebugSink { path, lock: Mutex::new(()) }
    }

    /// Records one snapshot. Never propagates I/O errors.
    pub fn record(&self, pump: u8, snapshot: &DispatchSnapshot) {
        let line = format!(
            "pump={} record_id={} sale={} state={:?} product={} amount={} volume={} price={}\n",
            pump,
            snapshot.record_id.trim(),
            snapshot.sale_id,
            snapshot.state,
            snapshot.product_code,
            snapshot.amount,
            snapshot.volume,
            snapshot.unit_price,
        );

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Debug sink write failed");
        }
    }

    /// Records a shift closure summary line.
    pub fn record_closure(&self, closure_id: i64, closure: &ShiftClosure) {
        let line = format!(
            "closure={} payments={} products={} pumps={} tanks={}\n",
            closure_id,
            closure.payment_totals.len(),
            closure.product_totals.len(),
            closure.hose_totals.len(),
            closure.tanks.len(),
        );

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Debug sink write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_core::{DeviceDecimal, DispatchState};

    #[test]
    fn test_sink_appends_lines() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("forecourt-sink-test-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let sink = DebugSink::new(path.clone());
        let snapshot = DispatchSnapshot {
            state: DispatchState::SaleCompleteUnpaid,
            sale_id: 7,
            product_code: 2,
            amount: DeviceDecimal::from_hundredths(15000),
            volume: DeviceDecimal::from_hundredths(4250),
            unit_price: DeviceDecimal::from_hundredths(353),
            invoiced: false,
            record_id: "A00123".to_string(),
        };

        sink.record(3, &snapshot);
        sink.record(3, &snapshot);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("pump=3 record_id=A00123"));

        let _ = std::fs::remove_file(&path);
    }
}
