//! # forecourt-sync: Device Client + Synchronization Loop
//!
//! The station-facing half of the bridge: talks to the pump controller over
//! its byte-framed request/response channel and folds what it reports into
//! the SQLite store, one polling cycle at a time.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Forecourt Sync Engine                       │
//! │                                                                 │
//! │  Station controller (TCP, one exchange per connection)          │
//! │       │                                                         │
//! │  ┌────▼──────────────────────────────────────────────────────┐ │
//! │  │              ★ forecourt-sync (THIS CRATE) ★              │ │
//! │  │                                                           │ │
//! │  │   channel    DeviceChannel seam, TCP implementation       │ │
//! │  │   dialect    opcode tables per protocol version           │ │
//! │  │   client     typed commands + reply decoding              │ │
//! │  │   reconciler one cycle's worth of persistence             │ │
//! │  │   context    shared handle + single admission gate        │ │
//! │  │   worker     the polling loop                             │ │
//! │  │   config     station.toml + env overrides                 │ │
//! │  │   sink       optional flat-file frame dump                │ │
//! │  └────┬──────────────────────────────────────────────────────┘ │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  forecourt-db (SQLite persistence gateway)                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod channel;
pub mod client;
pub mod config;
pub mod context;
pub mod dialect;
pub mod error;
pub mod reconciler;
pub mod sink;
pub mod worker;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use channel::{DeviceChannel, TcpChannel};
pub use client::DeviceClient;
pub use config::StationConfig;
pub use context::StationContext;
pub use dialect::{Dialect, OpcodeTable};
pub use error::{DeviceError, SyncError, SyncResult};
pub use reconciler::Reconciler;
pub use worker::{SyncWorker, SyncWorkerHandle};
