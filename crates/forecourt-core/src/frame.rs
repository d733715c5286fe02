//! # Frame Codec
//!
//! Field-level codec for the controller's response buffers.
//!
//! ## Wire Shape
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  One response buffer = ASCII fields delimited by SEPARATOR 0x7E  │
//! │                                                                  │
//! │  "0" 0x7E "4" 0x7E "123" 0x7E "A00123" 0x7E ...padding...        │
//! │   │        │        │          │                                 │
//! │   conf     status   sale id    record id                         │
//! │                                                                  │
//! │  The buffer is fixed-size per command; trailing bytes past the   │
//! │  last decoded field are padding and never inspected.             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All functions here are pure buffer transforms. A field that reaches the
//! end of the buffer without its separator is a [`FrameError`], never a
//! silently truncated value: a device restart mid-reply must surface as a
//! decode failure.

use crate::error::FrameError;

/// Separator byte delimiting ASCII fields inside a response buffer.
pub const SEPARATOR: u8 = 0x7E;

/// Reads one ASCII field starting at `*cursor`, up to (not including) the
/// next separator, and advances the cursor past the separator.
pub fn decode_field(buffer: &[u8], cursor: &mut usize) -> Result<String, FrameError> {
    let start = *cursor;
    if start >= buffer.len() {
        return Err(FrameError::CursorOutOfBounds {
            offset: start,
            len: buffer.len(),
        });
    }

    let mut end = start;
    while buffer[end] != SEPARATOR {
        if !buffer[end].is_ascii() {
            return Err(FrameError::NonAscii {
                byte: buffer[end],
                offset: end,
            });
        }
        end += 1;
        if end >= buffer.len() {
            return Err(FrameError::UnterminatedField {
                offset: start,
                len: buffer.len(),
            });
        }
    }

    // Safe: every byte in start..end was checked as ASCII above.
    let value = String::from_utf8_lossy(&buffer[start..end]).into_owned();
    *cursor = end + 1;
    Ok(value)
}

/// Advances the cursor past one field and its separator without
/// materializing the value. Used to discard fields a response shape
/// carries but this client does not need.
pub fn skip_field(buffer: &[u8], cursor: &mut usize) -> Result<(), FrameError> {
    let start = *cursor;
    if start >= buffer.len() {
        return Err(FrameError::CursorOutOfBounds {
            offset: start,
            len: buffer.len(),
        });
    }

    let mut end = start;
    while buffer[end] != SEPARATOR {
        end += 1;
        if end >= buffer.len() {
            return Err(FrameError::UnterminatedField {
                offset: start,
                len: buffer.len(),
            });
        }
    }

    *cursor = end + 1;
    Ok(())
}

/// Wraps a single opcode byte into an outbound command frame.
pub fn encode_command(opcode: u8) -> Vec<u8> {
    vec![opcode]
}

/// Wraps an opcode plus one argument byte (e.g. a pump number) into an
/// outbound command frame.
pub fn encode_command_with_arg(opcode: u8, arg: u8) -> Vec<u8> {
    vec![opcode, arg]
}

// =============================================================================
// Unit Tests
// =============================================================================
