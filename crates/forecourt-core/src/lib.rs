//! # forecourt-core: Pure Domain Logic for Forecourt
//!
//! This crate is the I/O-free heart of the station bridge. It owns the wire
//! frame codec, the domain types reported by the pump controller, and the
//! fixed-point decimal representation those reports use.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Forecourt Data Flow                         │
//! │                                                                 │
//! │  Station controller (byte-framed IPC, request/response only)   │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  forecourt-sync ── DeviceClient decodes replies using ──┐      │
//! │       │                                                  │      │
//! │  ┌────▼──────────────────────────────────────────────────▼───┐ │
//! │  │              ★ forecourt-core (THIS CRATE) ★              │ │
//! │  │                                                           │ │
//! │  │   frame        types              units                   │ │
//! │  │   decode_field DispatchSnapshot   DeviceDecimal           │ │
//! │  │   skip_field   TankLevel          (integer hundredths)    │ │
//! │  │   encode_*     ShiftClosure                               │ │
//! │  │                StationTopology                            │ │
//! │  │                                                           │ │
//! │  │   NO I/O • NO DATABASE • NO CHANNEL • PURE FUNCTIONS      │ │
//! │  └───────────────────────────────────────────────────────────┘ │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  forecourt-db (SQLite persistence gateway)                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`frame`] - separator-delimited field codec over raw response buffers
//! - [`types`] - dispatches, tanks, shift closures, station topology
//! - [`units`] - device decimals as integer hundredths (no floating point!)
//! - [`error`] - frame and domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod frame;
pub mod types;
pub mod units;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, FrameError};
pub use types::*;
pub use units::DeviceDecimal;
