//! # Opcode Dialects
//!
//! The controller family speaks two command dialects that differ only in
//! their opcode bytes. Which one applies is fixed by the configured protocol
//! version; the reply layouts are identical across dialects.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Opcode Selection by Protocol Version               │
//! │                                                                 │
//! │  command            version 16       every other version        │
//! │  ─────────────      ──────────       ───────────────────        │
//! │  station config     0x65              0xB5                      │
//! │  dispatch poll      0x70              0xC0                      │
//! │  tank levels        0x68              0xB8                      │
//! │  current shift      0x08              0x08   (shared)           │
//! │  close shift        0x01              0x01   (shared)           │
//! │  link check         0x00              0x00   (shared)           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

// Shift and link-check opcodes predate the dialect split.
const OP_CURRENT_SHIFT: u8 = 0x08;
const OP_CLOSE_SHIFT: u8 = 0x01;
const OP_LINK_CHECK: u8 = 0x00;

/// The two opcode dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Dialect spoken by protocol version 16.
    Modern,
    /// Dialect spoken by every other protocol version.
    Legacy,
}

impl Dialect {
    /// Selects the dialect for a protocol version.
    pub fn for_protocol_version(version: u32) -> Self {
        if version == 16 {
            Dialect::Modern
        } else {
            Dialect::Legacy
        }
    }
}

/// Resolved opcode set for one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeTable {
    pub dispatch: u8,
    pub station_config: u8,
    pub tank_levels: u8,
    pub current_shift: u8,
    pub close_shift: u8,
    pub link_check: u8,
}

impl OpcodeTable {
    /// Builds the opcode table for a dialect.
    pub fn for_dialect(dialect: Dialect) -> Self {
        let (station_config, dispatch, tank_levels) = match dialect {
            Dialect::Modern => (0x65, 0x70, 0x68),
            Dialect::Legacy => (0xB5, 0xC0, 0xB8),
        };

        OpcodeTable {
            dispatch,
            station_config,
            tank_levels,
            current_shift: OP_CURRENT_SHIFT,
            close_shift: OP_CLOSE_SHIFT,
            link_check: OP_LINK_CHECK,
        }
    }

    /// Builds the opcode table straight from a protocol version.
    pub fn for_protocol_version(version: u32) -> Self {
        Self::for_dialect(Dialect::for_protocol_version(version))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
