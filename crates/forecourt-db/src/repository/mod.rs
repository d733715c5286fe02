//! # Repository Layer
//!
//! One repository per aggregate. All SQL lives here; callers never touch the
//! pool directly.
//!
//! - [`dispatch`] - immutable per-pump sale history (conditional insert)
//! - [`tank`] - current tank readings (upsert)
//! - [`closure`] - shift close requests and append-only closure records

pub mod closure;
pub mod dispatch;
pub mod tank;

pub use closure::ClosureRepository;
pub use dispatch::{DispatchRepository, NewDispatch, PersistedDispatch};
pub use tank::{PersistedTank, TankRepository};
