//! # Domain Types
//!
//! Everything the station controller reports, as typed records.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Controller Reports                        │
//! │                                                                 │
//! │  Dispatch ──────────── one fuel sale at one pump                │
//! │    ├── current: DispatchSnapshot                                │
//! │    └── previous: Option<DispatchSnapshot>   (one sale lookback) │
//! │                                                                 │
//! │  TankLevel ─────────── per-tank fill snapshot, every cycle      │
//! │  ShiftClosure ──────── end-of-shift aggregate, once per close   │
//! │  StationTopology ───── pump/hose/tank/product layout, at start  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Finality Rule
//! A dispatch snapshot is persisted only once it is final: a snapshot that
//! is still dispensing, has sale id 0, or has record-id digit suffix 0 is
//! an in-flight or empty slot and must never reach the store.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::units::DeviceDecimal;

// =============================================================================
// Dispatch State
// =============================================================================

/// The state of a pump's dispatch slot as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Pump idle, no sale in the slot.
    Available,
    /// A sale has been requested at the pump.
    Requesting,
    /// Fuel is flowing. Never persisted.
    Dispensing,
    /// Sale authorized, waiting for the nozzle.
    Authorized,
    /// Sale finished but not yet paid.
    SaleCompleteUnpaid,
    /// Pump reported a fault.
    Faulted,
    /// Sale cancelled.
    Cancelled,
    /// Pump stopped by an operator.
    Stopped,
}

impl DispatchState {
    /// Maps the wire state code to a state.
    pub fn from_code(code: u8) -> CoreResult<Self> {
        Ok(match code {
            0 => DispatchState::Available,
            1 => DispatchState::Requesting,
            2 => DispatchState::Dispensing,
            3 => DispatchState::Authorized,
            4 => DispatchState::SaleCompleteUnpaid,
            5 => DispatchState::Faulted,
            6 => DispatchState::Cancelled,
            7 => DispatchState::Stopped,
            other => return Err(CoreError::UnknownState(other)),
        })
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// One sale slot (current or previous) at a single pump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSnapshot {
    pub state: DispatchState,

    /// Device-local sale sequence. Zero means "no sale in this slot".
    pub sale_id: i64,

    /// Raw device product code (resolved against topology at persist time).
    pub product_code: i64,

    /// Sale amount in currency units.
    pub amount: DeviceDecimal,

    /// Dispensed volume in liters.
    pub volume: DeviceDecimal,

    /// Unit price at sale time.
    pub unit_price: DeviceDecimal,

    /// Whether the device already marked the sale invoiced.
    pub invoiced: bool,

    /// Device-issued record identifier: one tag byte followed by digits
    /// (e.g. `"A00123"`). The digit suffix is the persisted record key.
    pub record_id: String,
}

impl DispatchSnapshot {
    /// Derives the numeric record key: strip the leading tag byte, parse
    /// the remaining digits.
    pub fn record_key(&self) -> CoreResult<i64> {
        let trimmed = self.record_id.trim();
        let mut chars = trimmed.chars();
        let malformed = || CoreError::MalformedRecordId(self.record_id.clone());

        chars.next().ok_or_else(malformed)?;
        let digits = chars.as_str();
        if digits.is_empty() {
            return Err(malformed());
        }
        digits.parse().map_err(|_| malformed())
    }

    /// Returns `Ok(Some(key))` when the snapshot is final and carries a
    /// persistable record key, `Ok(None)` when the snapshot must be skipped
    /// (still dispensing, empty slot, or zero key), and an error when the
    /// record id cannot be parsed at all.
    pub fn final_record_key(&self) -> CoreResult<Option<i64>> {
        if self.state == DispatchState::Dispensing || self.sale_id == 0 {
            return Ok(None);
        }
        let key = self.record_key()?;
        Ok(if key == 0 { None } else { Some(key) })
    }
}

/// A pump's dispatch report: the current sale slot plus at most one sale of
/// lookback. The device never buffers more history than that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    pub current: DispatchSnapshot,

    /// The sale displaced by the current one, if the device still had it.
    /// `None` when the previous slot's record id came back blank.
    pub previous: Option<DispatchSnapshot>,
}

// =============================================================================
// Tank Level
// =============================================================================

/// Per-tank fill snapshot, refreshed every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankLevel {
    pub product_volume: DeviceDecimal,
    pub water_volume: DeviceDecimal,
    pub empty_space: DeviceDecimal,
    pub capacity: DeviceDecimal,
}

impl TankLevel {
    /// Derived total level: product plus water.
    #[inline]
    pub fn total(&self) -> DeviceDecimal {
        self.product_volume.saturating_add(self.water_volume)
    }
}

// =============================================================================
// Shift Closure
// =============================================================================

/// Amount/volume pair used throughout the closure report.
///
/// Closure fields stay raw device strings: this client does not interpret
/// them, only mirrors them into the append-only closure record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Total {
    pub amount: String,
    pub volume: String,
}

/// Per-product totals inside a closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTotal {
    pub amount: String,
    pub volume: String,
    pub price: String,
}

/// Per-hose totals for one pump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoseTotals {
    pub pump_id: i64,
    pub totals: Vec<Total>,
}

/// Tank snapshot captured at close time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankSnapshot {
    pub product_volume: String,
    pub water_volume: String,
    pub empty_space: String,
    pub capacity: String,
}

/// Product-level snapshot captured at close time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: String,
    pub price: String,
    pub volume: String,
    pub water_volume: String,
    pub empty_space: String,
    pub capacity: String,
}

/// End-of-shift aggregate snapshot. One-shot and append-only: once a close
/// is performed the record is written and never mutated.
///
/// Slots the client did not decode stay `None`/empty so an absent reading
/// is never confused with a legitimate zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftClosure {
    /// Totals per payment method, in device slot order.
    pub payment_totals: Vec<Total>,

    /// First tax slot, if decoded.
    pub tax1: Option<String>,

    /// Second tax slot, if decoded.
    pub tax2: Option<String>,

    pub product_totals: Vec<ProductTotal>,

    /// Per-hose totals grouped by pump.
    pub hose_totals: Vec<HoseTotals>,

    /// Per-hose totals with tracking disabled.
    pub untracked_hose_totals: Vec<HoseTotals>,

    /// Per-hose test-dispense totals.
    pub test_hose_totals: Vec<HoseTotals>,

    /// Tank levels captured at close time.
    pub tanks: Vec<TankSnapshot>,

    /// Product levels captured at close time.
    pub products: Vec<ProductSnapshot>,
}

// =============================================================================
// Station Topology
// =============================================================================

/// One pump's configuration: its price tier and the product each hose
/// dispenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpConfig {
    pub price_tier: i64,
    pub product_by_hose: Vec<i64>,
}

/// One product as the station configures it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    /// Station-wide product id (the persisted, normalized id).
    pub id: i64,

    /// Reference price for the product.
    pub price: DeviceDecimal,
}

/// Station-wide layout, loaded exactly once at startup and read-only
/// thereafter. A topology change on the physical device requires a process
/// restart to be observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationTopology {
    pub pumps: Vec<PumpConfig>,

    /// Device product code configured for each tank, by tank index.
    pub product_by_tank: Vec<i64>,

    /// Products by device product code (code N is `products[N - 1]`).
    pub products: Vec<ProductRef>,
}

impl StationTopology {
    #[inline]
    pub fn pump_count(&self) -> usize {
        self.pumps.len()
    }

    #[inline]
    pub fn tank_count(&self) -> usize {
        self.product_by_tank.len()
    }

    /// Product code for a hose on a pump. Pumps and hoses are 1-based as
    /// the device numbers them.
    pub fn product_for_hose(&self, pump: usize, hose: usize) -> Option<i64> {
        self.pumps
            .get(pump.checked_sub(1)?)?
            .product_by_hose
            .get(hose.checked_sub(1)?)
            .copied()
    }

    /// Product code configured for a tank (0-based tank index).
    pub fn product_for_tank(&self, tank: usize) -> Option<i64> {
        self.product_by_tank.get(tank).copied()
    }

    /// Looks up a product by device product code.
    pub fn resolve_product(&self, device_code: i64) -> Option<&ProductRef> {
        let idx = usize::try_from(device_code).ok()?.checked_sub(1)?;
        self.products.get(idx)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: DispatchState, sale_id: i64, record_id: &str) -> DispatchSnapshot {
        DispatchSnapshot {
            state,
            sale_id,
            product_code: 1,
            amount: DeviceDecimal::from_hundredths(100_00),
            volume: DeviceDecimal::from_hundredths(50_00),
            unit_price: DeviceDecimal::from_hundredths(2_00),
            invoiced: false,
            record_id: record_id.to_string(),
        }
    }

    #[test]
    fn test_record_key_strips_tag_byte() {
        let snap = snapshot(DispatchState::SaleCompleteUnpaid, 7, "A00123");
        assert_eq!(snap.record_key().unwrap(), 123);
    }

    #[test]
    fn test_record_key_trims_padding() {
        let snap = snapshot(DispatchState::SaleCompleteUnpaid, 7, "  A00042 ");
        assert_eq!(snap.record_key().unwrap(), 42);
    }

    #[test]
    fn test_record_key_rejects_garbage() {
        assert!(snapshot(DispatchState::Available, 1, "").record_key().is_err());
        assert!(snapshot(DispatchState::Available, 1, "A").record_key().is_err());
        assert!(snapshot(DispatchState::Available, 1, "A12x").record_key().is_err());
    }

    #[test]
    fn test_dispensing_is_never_final() {
        let snap = snapshot(DispatchState::Dispensing, 7, "A00123");
        assert_eq!(snap.final_record_key().unwrap(), None);
    }

    #[test]
    fn test_zero_sale_and_zero_key_are_not_final() {
        assert_eq!(
            snapshot(DispatchState::SaleCompleteUnpaid, 0, "A00123")
                .final_record_key()
                .unwrap(),
            None
        );
        assert_eq!(
            snapshot(DispatchState::SaleCompleteUnpaid, 7, "A00000")
                .final_record_key()
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_final_snapshot_yields_key() {
        let snap = snapshot(DispatchState::SaleCompleteUnpaid, 7, "A00123");
        assert_eq!(snap.final_record_key().unwrap(), Some(123));
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(DispatchState::from_code(2).unwrap(), DispatchState::Dispensing);
        assert_eq!(
            DispatchState::from_code(4).unwrap(),
            DispatchState::SaleCompleteUnpaid
        );
        assert!(DispatchState::from_code(8).is_err());
    }

    #[test]
    fn test_tank_total_is_product_plus_water() {
        let tank = TankLevel {
            product_volume: DeviceDecimal::parse("1000.50").unwrap(),
            water_volume: DeviceDecimal::parse("12.25").unwrap(),
            empty_space: DeviceDecimal::parse("987.25").unwrap(),
            capacity: DeviceDecimal::parse("2000.00").unwrap(),
        };
        assert_eq!(tank.total().to_string(), "1012.75");
    }

    #[test]
    fn test_topology_lookups() {
        let topo = StationTopology {
            pumps: vec![
                PumpConfig { price_tier: 1, product_by_hose: vec![1, 2] },
                PumpConfig { price_tier: 2, product_by_hose: vec![2] },
            ],
            product_by_tank: vec![1, 2, 2],
            products: vec![
                ProductRef { id: 101, price: DeviceDecimal::parse("2.00").unwrap() },
                ProductRef { id: 102, price: DeviceDecimal::parse("3.10").unwrap() },
            ],
        };

        assert_eq!(topo.pump_count(), 2);
        assert_eq!(topo.tank_count(), 3);
        assert_eq!(topo.product_for_hose(1, 2), Some(2));
        assert_eq!(topo.product_for_hose(2, 1), Some(2));
        assert_eq!(topo.product_for_hose(3, 1), None);
        assert_eq!(topo.product_for_tank(2), Some(2));
        assert_eq!(topo.resolve_product(1).unwrap().id, 101);
        assert!(topo.resolve_product(9).is_none());
        assert!(topo.resolve_product(0).is_none());
    }
}
