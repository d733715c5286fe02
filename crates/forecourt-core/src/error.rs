//! # Error Types
//!
//! Domain-specific error types for forecourt-core.
//!
//! ## Error Hierarchy
//! ```text
//! forecourt-core errors (this file)
//! ├── FrameError  - malformed/truncated response buffers
//! └── CoreError   - domain value failures (record ids, decimals, states)
//!
//! forecourt-db errors (separate crate)
//! └── DbError     - persistence gateway failures
//!
//! forecourt-sync errors (separate crate)
//! ├── DeviceError - channel connect/write/read failures
//! └── SyncError   - everything a reconciliation cycle can surface
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (cursor position, raw value)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Frame Error
// =============================================================================

/// Wire framing errors.
///
/// A partial frame from a device restart must be detected, not
/// misinterpreted as a short value, so an unterminated field is always an
/// error here and never a truncated success.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer ended before the field's separator byte appeared.
    #[error("unterminated field at offset {offset} (buffer length {len})")]
    UnterminatedField { offset: usize, len: usize },

    /// The cursor already points past the end of the buffer.
    #[error("cursor {offset} out of bounds (buffer length {len})")]
    CursorOutOfBounds { offset: usize, len: usize },

    /// A field held bytes that are not valid ASCII text.
    #[error("non-ASCII byte 0x{byte:02X} in field at offset {offset}")]
    NonAscii { byte: u8, offset: usize },
}

// =============================================================================
// Core Error
// =============================================================================

/// Domain value errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A record identifier did not match the tag-byte-plus-digits shape.
    #[error("malformed record id: {0:?}")]
    MalformedRecordId(String),

    /// A numeric field from the device could not be parsed.
    #[error("unparseable numeric field {field}: {value:?}")]
    BadNumber { field: &'static str, value: String },

    /// A device decimal string did not parse.
    #[error("malformed device decimal: {0:?}")]
    MalformedDecimal(String),

    /// The device reported a dispatch state code outside the known set.
    #[error("unknown dispatch state code {0}")]
    UnknownState(u8),
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_messages() {
        let err = FrameError::UnterminatedField { offset: 12, len: 16 };
        assert_eq!(
            err.to_string(),
            "unterminated field at offset 12 (buffer length 16)"
        );
    }

    #[test]
    fn test_core_error_messages() {
        let err = CoreError::BadNumber {
            field: "sale_id",
            value: "12x".to_string(),
        };
        assert!(err.to_string().contains("sale_id"));
        assert!(err.to_string().contains("12x"));
    }
}
