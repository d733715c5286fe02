//! # Device Client
//!
//! Typed conversation with the station controller: builds command frames
//! from the active opcode table, runs them over a [`DeviceChannel`], and
//! decodes the reply buffers into domain types.
//!
//! ## Reply Layouts
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  dispatch (per pump)                                            │
//! │    conf | current: status sale product amount volume price      │
//! │         |          invoiced record_id                           │
//! │         | previous: same eight fields (blank record_id = none)  │
//! │                                                                 │
//! │  station config                                                 │
//! │    conf | pumps | (reserved) | tanks | products                 │
//! │    then per pump:  price_tier hose_count hose_product...        │
//! │    then per tank:  product_code                                 │
//! │    then per prod:  station_id price                             │
//! │                                                                 │
//! │  tank levels                                                    │
//! │    conf | per tank: product w/f, water w/f, empty w/f, cap w/f  │
//! │         (w/f = whole part and hundredths part, two fields)      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every reply buffer is fixed-size per command; decoding stops at the last
//! meaningful field and never inspects the padding.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use forecourt_core::frame::{decode_field, encode_command, encode_command_with_arg, skip_field};
use forecourt_core::{
    CoreError, DeviceDecimal, Dispatch, DispatchSnapshot, DispatchState, HoseTotals, ProductRef,
    ProductSnapshot, ProductTotal, PumpConfig, ShiftClosure, StationTopology, TankLevel,
    TankSnapshot, Total,
};

use crate::channel::DeviceChannel;
use crate::dialect::OpcodeTable;
use crate::error::{SyncError, SyncResult};

// Fixed reply buffer sizes, per command. The link check answers with a
// single status byte; everything else is a padded field buffer.
const RESP_LINK_CHECK: usize = 1;
const RESP_DISPATCH: usize = 512;
const RESP_STATION_CONFIG: usize = 1024;
const RESP_TANK_LEVELS: usize = 1024;
const RESP_SHIFT: usize = 4096;

/// Typed client over the raw device channel.
pub struct DeviceClient {
    channel: Arc<dyn DeviceChannel>,
    ops: OpcodeTable,
}

impl DeviceClient {
    /// Creates a client bound to a channel and an opcode dialect.
    pub fn new(channel: Arc<dyn DeviceChannel>, ops: OpcodeTable) -> Self {
        DeviceClient { channel, ops }
    }

    /// Returns the active opcode table.
    pub fn opcodes(&self) -> &OpcodeTable {
        &self.ops
    }

    /// Link check: `Ok(true)` when the controller echoed the check opcode,
    /// `Ok(false)` when it answered something else, `Err` when the channel
    /// itself failed.
    pub async fn check_connection(&self) -> SyncResult<bool> {
        let reply = self
            .channel
            .transact(&encode_command(self.ops.link_check), RESP_LINK_CHECK)
            .await?;

        Ok(reply.first() == Some(&self.ops.link_check))
    }

    /// Polls the dispatch report for one pump (1-based pump number).
    #[instrument(skip(self))]
    pub async fn fetch_dispatch(&self, pump: u8) -> SyncResult<Dispatch> {
        let command = encode_command_with_arg(self.ops.dispatch, pump);
        let reply = self.channel.transact(&command, RESP_DISPATCH).await?;

        let mut pos = 0;
        skip_field(&reply, &mut pos)?; // confirmation

        let current = decode_snapshot(&reply, &mut pos)?
            .ok_or_else(|| SyncError::Reconcile(format!("pump {pump}: blank current slot")))?;
        let previous = decode_snapshot(&reply, &mut pos)?;

        debug!(pump, sale = current.sale_id, state = ?current.state, "Dispatch fetched");
        Ok(Dispatch { current, previous })
    }

    /// Loads the station topology. Called once at startup.
    #[instrument(skip(self))]
    pub async fn fetch_topology(&self) -> SyncResult<StationTopology> {
        let command = encode_command(self.ops.station_config);
        let reply = self.channel.transact(&command, RESP_STATION_CONFIG).await?;

        let mut pos = 0;
        skip_field(&reply, &mut pos)?; // confirmation
        let pump_count = decode_i64(&reply, &mut pos, "pump count")?;
        skip_field(&reply, &mut pos)?; // reserved slot, not used by this client
        let tank_count = decode_i64(&reply, &mut pos, "tank count")?;
        let product_count = decode_i64(&reply, &mut pos, "product count")?;

        let mut pumps = Vec::with_capacity(pump_count as usize);
        for _ in 0..pump_count {
            let price_tier = decode_i64(&reply, &mut pos, "price tier")?;
            let hose_count = decode_i64(&reply, &mut pos, "hose count")?;
            let mut product_by_hose = Vec::with_capacity(hose_count as usize);
            for _ in 0..hose_count {
                product_by_hose.push(decode_i64(&reply, &mut pos, "hose product")?);
            }
            pumps.push(PumpConfig { price_tier, product_by_hose });
        }

        let mut product_by_tank = Vec::with_capacity(tank_count as usize);
        for _ in 0..tank_count {
            product_by_tank.push(decode_i64(&reply, &mut pos, "tank product")?);
        }

        let mut products = Vec::with_capacity(product_count as usize);
        for _ in 0..product_count {
            let id = decode_i64(&reply, &mut pos, "product id")?;
            let price = decode_decimal(&reply, &mut pos)?;
            products.push(ProductRef { id, price });
        }

        debug!(
            pumps = pumps.len(),
            tanks = product_by_tank.len(),
            products = products.len(),
            "Topology loaded"
        );
        Ok(StationTopology { pumps, product_by_tank, products })
    }

    /// Polls the current level of every tank. `count` comes from the
    /// topology; the reply carries exactly that many tank blocks.
    #[instrument(skip(self))]
    pub async fn fetch_tanks(&self, count: usize) -> SyncResult<Vec<TankLevel>> {
        let command = encode_command(self.ops.tank_levels);
        let reply = self.channel.transact(&command, RESP_TANK_LEVELS).await?;

        let mut pos = 0;
        skip_field(&reply, &mut pos)?; // confirmation

        let mut tanks = Vec::with_capacity(count);
        for _ in 0..count {
            tanks.push(TankLevel {
                product_volume: decode_split_decimal(&reply, &mut pos)?,
                water_volume: decode_split_decimal(&reply, &mut pos)?,
                empty_space: decode_split_decimal(&reply, &mut pos)?,
                capacity: decode_split_decimal(&reply, &mut pos)?,
            });
        }

        Ok(tanks)
    }

    /// Fetches the running shift totals without closing the shift.
    #[instrument(skip(self))]
    pub async fn fetch_current_shift(&self) -> SyncResult<ShiftClosure> {
        let command = encode_command(self.ops.current_shift);
        let reply = self.channel.transact(&command, RESP_SHIFT).await?;
        decode_closure(&reply)
    }

    /// Closes the shift on the device and returns the final closure report.
    /// The device resets its running totals as a side effect; there is no
    /// way to re-read a closed shift, so the caller must persist the result.
    #[instrument(skip(self))]
    pub async fn close_shift(&self) -> SyncResult<ShiftClosure> {
        let command = encode_command(self.ops.close_shift);
        let reply = self.channel.transact(&command, RESP_SHIFT).await?;
        let closure = decode_closure(&reply)?;
        warn!("Shift closed on device");
        Ok(closure)
    }
}

// =============================================================================
// Field Decoders
// =============================================================================

fn decode_i64(buffer: &[u8], pos: &mut usize, field: &'static str) -> SyncResult<i64> {
    let raw = decode_field(buffer, pos)?;
    raw.trim()
        .parse()
        .map_err(|_| SyncError::Domain(CoreError::BadNumber { field, value: raw }))
}

fn decode_decimal(buffer: &[u8], pos: &mut usize) -> SyncResult<DeviceDecimal> {
    let raw = decode_field(buffer, pos)?;
    Ok(DeviceDecimal::parse(&raw)?)
}

fn decode_split_decimal(buffer: &[u8], pos: &mut usize) -> SyncResult<DeviceDecimal> {
    let whole = decode_field(buffer, pos)?;
    let frac = decode_field(buffer, pos)?;
    Ok(DeviceDecimal::from_split_fields(&whole, &frac)?)
}

/// Decodes one eight-field dispatch snapshot. A blank record id means the
/// slot is empty (the device had nothing to report there); every other field
/// of an empty slot is padding and is still consumed.
fn decode_snapshot(buffer: &[u8], pos: &mut usize) -> SyncResult<Option<DispatchSnapshot>> {
    let status_raw = decode_i64(buffer, pos, "dispatch status")?;
    let sale_id = decode_i64(buffer, pos, "sale id")?;
    let product_code = decode_i64(buffer, pos, "product code")?;
    let amount = decode_decimal(buffer, pos)?;
    let volume = decode_decimal(buffer, pos)?;
    let unit_price = decode_decimal(buffer, pos)?;
    let invoiced = decode_i64(buffer, pos, "invoiced flag")? != 0;
    let record_id = decode_field(buffer, pos)?;

    if record_id.trim().is_empty() {
        return Ok(None);
    }

    let state = DispatchState::from_code(
        u8::try_from(status_raw)
            .map_err(|_| CoreError::BadNumber { field: "dispatch status", value: status_raw.to_string() })?,
    )?;

    Ok(Some(DispatchSnapshot {
        state,
        sale_id,
        product_code,
        amount,
        volume,
        unit_price,
        invoiced,
        record_id,
    }))
}

fn decode_total(buffer: &[u8], pos: &mut usize) -> SyncResult<Total> {
    Ok(Total {
        amount: decode_field(buffer, pos)?,
        volume: decode_field(buffer, pos)?,
    })
}

fn decode_hose_groups(buffer: &[u8], pos: &mut usize) -> SyncResult<Vec<HoseTotals>> {
    let pump_count = decode_i64(buffer, pos, "pump count")?;
    let mut groups = Vec::with_capacity(pump_count as usize);
    for pump_id in 1..=pump_count {
        let hose_count = decode_i64(buffer, pos, "hose count")?;
        let mut totals = Vec::with_capacity(hose_count as usize);
        for _ in 0..hose_count {
            totals.push(decode_total(buffer, pos)?);
        }
        groups.push(HoseTotals { pump_id, totals });
    }
    Ok(groups)
}

/// Decodes a full shift report (shared by the read-only and the closing
/// commands; both replies carry the same shape).
fn decode_closure(buffer: &[u8]) -> SyncResult<ShiftClosure> {
    let mut pos = 0;
    skip_field(buffer, &mut pos)?; // confirmation

    let payment_count = decode_i64(buffer, &mut pos, "payment slot count")?;
    let mut payment_totals = Vec::with_capacity(payment_count as usize);
    for _ in 0..payment_count {
        payment_totals.push(decode_total(buffer, &mut pos)?);
    }

    let tax1 = non_blank(decode_field(buffer, &mut pos)?);
    let tax2 = non_blank(decode_field(buffer, &mut pos)?);

    let product_count = decode_i64(buffer, &mut pos, "product total count")?;
    let mut product_totals = Vec::with_capacity(product_count as usize);
    for _ in 0..product_count {
        product_totals.push(ProductTotal {
            amount: decode_field(buffer, &mut pos)?,
            volume: decode_field(buffer, &mut pos)?,
            price: decode_field(buffer, &mut pos)?,
        });
    }

    let hose_totals = decode_hose_groups(buffer, &mut pos)?;
    let untracked_hose_totals = decode_hose_groups(buffer, &mut pos)?;
    let test_hose_totals = decode_hose_groups(buffer, &mut pos)?;

    let tank_count = decode_i64(buffer, &mut pos, "tank count")?;
    let mut tanks = Vec::with_capacity(tank_count as usize);
    for _ in 0..tank_count {
        tanks.push(TankSnapshot {
            product_volume: decode_field(buffer, &mut pos)?,
            water_volume: decode_field(buffer, &mut pos)?,
            empty_space: decode_field(buffer, &mut pos)?,
            capacity: decode_field(buffer, &mut pos)?,
        });
    }

    let snapshot_count = decode_i64(buffer, &mut pos, "product snapshot count")?;
    let mut products = Vec::with_capacity(snapshot_count as usize);
    for _ in 0..snapshot_count {
        products.push(ProductSnapshot {
            product_id: decode_field(buffer, &mut pos)?,
            price: decode_field(buffer, &mut pos)?,
            volume: decode_field(buffer, &mut pos)?,
            water_volume: decode_field(buffer, &mut pos)?,
            empty_space: decode_field(buffer, &mut pos)?,
            capacity: decode_field(buffer, &mut pos)?,
        });
    }

    Ok(ShiftClosure {
        payment_totals,
        tax1,
        tax2,
        product_totals,
        hose_totals,
        untracked_hose_totals,
        test_hose_totals,
        tanks,
        products,
    })
}

fn non_blank(field: String) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::MockChannel;
    use crate::dialect::Dialect;
    use forecourt_core::frame::SEPARATOR;

    fn frame(fields: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        for f in fields {
            buf.extend_from_slice(f.as_bytes());
            buf.push(SEPARATOR);
        }
        buf.extend(std::iter::repeat(0u8).take(16));
        buf
    }

    fn client(channel: Arc<MockChannel>, dialect: Dialect) -> DeviceClient {
        DeviceClient::new(channel, OpcodeTable::for_dialect(dialect))
    }

    fn dispatch_reply(prev_record_id: &str) -> Vec<u8> {
        frame(&[
            "0", // conf
            "4", "77", "2", "150.00", "42.50", "3.53", "0", "A00123", // current
            "4", "76", "2", "99.10", "28.07", "3.53", "1", prev_record_id, // previous
        ])
    }

    #[tokio::test]
    async fn test_fetch_dispatch_decodes_both_slots() {
        let channel = Arc::new(MockChannel::new());
        channel.push_reply(dispatch_reply("A00122"));

        let dispatch = client(channel.clone(), Dialect::Modern).fetch_dispatch(3).await.unwrap();

        assert_eq!(dispatch.current.sale_id, 77);
        assert_eq!(dispatch.current.state, DispatchState::SaleCompleteUnpaid);
        assert_eq!(dispatch.current.amount.to_string(), "150.00");
        assert_eq!(dispatch.current.record_id, "A00123");

        let prev = dispatch.previous.unwrap();
        assert_eq!(prev.sale_id, 76);
        assert!(prev.invoiced);

        // Command carried the dispatch opcode and the pump number.
        assert_eq!(channel.sent_commands(), vec![vec![0x70, 3]]);
    }

    #[tokio::test]
    async fn test_blank_previous_slot_is_none() {
        let channel = Arc::new(MockChannel::new());
        channel.push_reply(dispatch_reply("   "));

        let dispatch = client(channel, Dialect::Modern).fetch_dispatch(1).await.unwrap();
        assert!(dispatch.previous.is_none());
    }

    #[tokio::test]
    async fn test_legacy_dialect_sends_legacy_opcode() {
        let channel = Arc::new(MockChannel::new());
        channel.push_reply(dispatch_reply("A00001"));

        client(channel.clone(), Dialect::Legacy).fetch_dispatch(2).await.unwrap();
        assert_eq!(channel.sent_commands(), vec![vec![0xC0, 2]]);
    }

    #[tokio::test]
    async fn test_truncated_reply_is_a_frame_error() {
        let channel = Arc::new(MockChannel::new());
        // Separator missing after the last field: device restarted mid-reply.
        let mut bad = Vec::new();
        bad.extend_from_slice(b"0");
        bad.push(SEPARATOR);
        bad.extend_from_slice(b"4");

        channel.push_reply(bad);

        let err = client(channel, Dialect::Modern).fetch_dispatch(1).await.unwrap_err();
        assert!(matches!(err, SyncError::Frame(_)));
    }

    #[tokio::test]
    async fn test_link_check_completes_against_single_byte_reply() {
        use crate::channel::TcpChannel;
        use std::time::Duration;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        // A controller that answers the check with exactly one byte; the
        // client must not wait for more before deciding.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut command = [0u8; 1];
            socket.read_exact(&mut command).await.unwrap();
            assert_eq!(command[0], 0x00);
            socket.write_all(&[0x00]).await.unwrap();
        });

        let channel = Arc::new(TcpChannel::new(addr.to_string(), Duration::from_secs(2)));
        let client = DeviceClient::new(channel, OpcodeTable::for_dialect(Dialect::Modern));
        assert!(client.check_connection().await.unwrap());
    }

    #[tokio::test]
    async fn test_check_connection_trichotomy() {
        let channel = Arc::new(MockChannel::new());
        channel.push_reply(vec![0x00, SEPARATOR]);
        channel.push_reply(vec![0xFF, SEPARATOR]);
        channel.push_error(crate::error::DeviceError::ConnectionFailed("down".into()));

        let client = client(channel, Dialect::Modern);
        assert!(client.check_connection().await.unwrap());
        assert!(!client.check_connection().await.unwrap());
        assert!(client.check_connection().await.is_err());
    }

    #[tokio::test]
    async fn test_topology_uses_the_config_opcode_not_the_dispatch_one() {
        let channel = Arc::new(MockChannel::new());
        channel.push_reply(frame(&["0", "0", "9", "0", "0"]));
        channel.push_reply(frame(&["0", "0", "9", "0", "0"]));

        client(channel.clone(), Dialect::Modern).fetch_topology().await.unwrap();
        client(channel.clone(), Dialect::Legacy).fetch_topology().await.unwrap();
        assert_eq!(channel.sent_commands(), vec![vec![0x65], vec![0xB5]]);
    }

    #[tokio::test]
    async fn test_fetch_topology() {
        let channel = Arc::new(MockChannel::new());
        channel.push_reply(frame(&[
            "0",        // conf
            "2",        // pumps
            "9",        // reserved
            "2",        // tanks
            "2",        // products
            "1", "2", "1", "2", // pump 1: tier 1, two hoses, products 1 and 2
            "2", "1", "2", // pump 2: tier 2, one hose, product 2
            "1", "2", // tank products
            "101", "2.00", // product 1
            "102", "3.10", // product 2
        ]));

        let topo = client(channel, Dialect::Modern).fetch_topology().await.unwrap();
        assert_eq!(topo.pump_count(), 2);
        assert_eq!(topo.tank_count(), 2);
        assert_eq!(topo.pumps[0].product_by_hose, vec![1, 2]);
        assert_eq!(topo.resolve_product(2).unwrap().id, 102);
    }

    #[tokio::test]
    async fn test_fetch_tanks_normalizes_split_fields() {
        let channel = Arc::new(MockChannel::new());
        channel.push_reply(frame(&[
            "0", // conf
            "1000", "50", "12", "25", "987", "25", "2000", "0", // tank 1
            "800", "0", "0", "0", "1200", "0", "2000", "0", // tank 2
        ]));

        let tanks = client(channel, Dialect::Modern).fetch_tanks(2).await.unwrap();
        assert_eq!(tanks.len(), 2);
        assert_eq!(tanks[0].product_volume.to_string(), "1000.50");
        assert_eq!(tanks[0].total().to_string(), "1012.75");
        assert_eq!(tanks[1].total().to_string(), "800.00");
    }

    #[tokio::test]
    async fn test_close_shift_decodes_report() {
        let channel = Arc::new(MockChannel::new());
        channel.push_reply(frame(&[
            "0",                  // conf
            "2",                  // payment slots
            "1200.00", "340.10",  // slot 0
            "0.00", "0.00",       // slot 1
            "21.00", "",          // tax1 set, tax2 blank
            "1",                  // product totals
            "1200.00", "340.10", "3.53",
            "1", "1", "600.00", "170.05", // tracked: 1 pump, 1 hose
            "0",                  // untracked: no pumps
            "0",                  // test: no pumps
            "1",                  // tanks
            "900.00", "2.00", "1098.00", "2000.00",
            "0",                  // product snapshots
        ]));

        let closure = client(channel, Dialect::Modern).close_shift().await.unwrap();
        assert_eq!(closure.payment_totals.len(), 2);
        assert_eq!(closure.tax1.as_deref(), Some("21.00"));
        assert!(closure.tax2.is_none());
        assert_eq!(closure.hose_totals.len(), 1);
        assert_eq!(closure.hose_totals[0].totals[0].amount, "600.00");
        assert!(closure.untracked_hose_totals.is_empty());
        assert_eq!(closure.tanks.len(), 1);
    }
}
