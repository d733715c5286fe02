//! # Sync Error Types
//!
//! Errors for the device conversation and the synchronization loop.
//!
//! A `SyncError` never crashes the daemon: the worker logs it, abandons the
//! rest of the current cycle and waits for the next tick. Only configuration
//! errors at startup are fatal.

use thiserror::Error;

use forecourt_core::{CoreError, FrameError};
use forecourt_db::DbError;

// =============================================================================
// Device Error
// =============================================================================

/// Errors from the raw byte channel to the station controller.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Could not reach the controller endpoint.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// I/O failure mid-exchange.
    #[error("channel i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The controller did not answer within the deadline.
    #[error("device timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The reply ended before the expected byte count.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
}

// =============================================================================
// Sync Error
// =============================================================================

/// Top-level error for the synchronization engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reply frame could not be split into fields.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A decoded field had an impossible value.
    #[error("domain error: {0}")]
    Domain(#[from] CoreError),

    /// Byte channel failure.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Persistence gateway failure.
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// A cycle step saw data it could not reconcile (for example a product
    /// code with no topology entry).
    #[error("reconcile error: {0}")]
    Reconcile(String),

    /// Configuration value out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Config file could not be read or parsed.
    #[error("config load failed: {0}")]
    ConfigLoad(String),

    /// Config file could not be written.
    #[error("config save failed: {0}")]
    ConfigSave(String),
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoad(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoad(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSave(err.to_string())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = SyncError::Device(DeviceError::Timeout(Duration::from_secs(3)));
        assert!(err.to_string().contains("timed out"));

        let err = SyncError::Device(DeviceError::ShortRead { expected: 40, actual: 12 });
        assert!(err.to_string().contains("expected 40"));
    }

    #[test]
    fn test_duplicate_stays_visible_through_conversion() {
        let err: SyncError = DbError::DuplicateRecord("dispatches".into()).into();
        match err {
            SyncError::Database(db) => assert!(db.is_conflict()),
            other => panic!("unexpected variant: {other}"),
        }
    }
}
