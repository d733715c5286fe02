//! # forecourt-db: Persistence Gateway for Forecourt
//!
//! All SQLite access for the station bridge lives in this crate. The
//! synchronization loop and manual entry points talk to repositories; SQL
//! never leaks upward.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Forecourt Persistence                      │
//! │                                                                 │
//! │  forecourt-sync (reconciler, worker loop)                      │
//! │       │                                                         │
//! │  ┌────▼──────────────────────────────────────────────────────┐ │
//! │  │               ★ forecourt-db (THIS CRATE) ★               │ │
//! │  │                                                           │ │
//! │  │   pool          repository          migrations            │ │
//! │  │   Database      DispatchRepository  embedded SQL          │ │
//! │  │   DbConfig      TankRepository                            │ │
//! │  │                 ClosureRepository                         │ │
//! │  └────┬──────────────────────────────────────────────────────┘ │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  SQLite (WAL mode, foreign keys on)                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Disciplines
//!
//! - Dispatches: conditional insert only; duplicates come back as
//!   [`DbError::DuplicateRecord`] and callers decide whether that is fine.
//! - Tanks: upsert, latest reading wins.
//! - Closures: append-only, one transaction per close.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{
    ClosureRepository, DispatchRepository, NewDispatch, PersistedDispatch, PersistedTank,
    TankRepository,
};
