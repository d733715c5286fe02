//! # Device Decimals
//!
//! Fixed-point representation for the controller's decimal readings.
//!
//! ## Why Integer Hundredths?
//! The device reports volumes, amounts and prices as ASCII decimals with two
//! fractional digits, sometimes as a single field (`"123.45"`) and sometimes
//! as two separate fields (whole part and hundredths part). Floating point
//! would silently lose exactness on sums like tank totals, so every reading
//! is normalized to an `i64` count of hundredths and only formatted back to
//! `"123.45"` at the persistence boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A device decimal as integer hundredths.
///
/// `DeviceDecimal(12345)` is the reading `123.45`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceDecimal(i64);

impl DeviceDecimal {
    /// Creates a decimal from a raw hundredths count.
    #[inline]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        DeviceDecimal(hundredths)
    }

    /// Returns the raw hundredths count.
    #[inline]
    pub const fn hundredths(&self) -> i64 {
        self.0
    }

    /// Zero reading.
    #[inline]
    pub const fn zero() -> Self {
        DeviceDecimal(0)
    }

    /// Parses a single-field device decimal such as `"123.45"`, `"123"`
    /// or `"  7.5 "` (the device pads fields with spaces).
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::MalformedDecimal(raw.to_string()));
        }

        let malformed = || CoreError::MalformedDecimal(raw.to_string());

        let (whole_str, frac_str) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };

        let negative = whole_str.starts_with('-');
        let whole: i64 = if whole_str == "-" {
            0
        } else {
            whole_str.parse().map_err(|_| malformed())?
        };

        // Fractional part: at most two digits, right-padded ("5" means .50).
        let frac: i64 = match frac_str.len() {
            0 => 0,
            1 => frac_str.parse::<i64>().map_err(|_| malformed())? * 10,
            2 => frac_str.parse().map_err(|_| malformed())?,
            _ => return Err(malformed()),
        };
        if frac < 0 {
            return Err(malformed());
        }

        let magnitude = whole.unsigned_abs() as i64 * 100 + frac;
        Ok(DeviceDecimal(if negative { -magnitude } else { magnitude }))
    }

    /// Normalizes the two-field representation (whole part and hundredths
    /// part as separate frame fields) used by the tank-level response.
    pub fn from_split_fields(whole: &str, frac: &str) -> Result<Self, CoreError> {
        let w: i64 = whole
            .trim()
            .parse()
            .map_err(|_| CoreError::MalformedDecimal(format!("{whole}.{frac}")))?;
        let f: i64 = frac
            .trim()
            .parse()
            .map_err(|_| CoreError::MalformedDecimal(format!("{whole}.{frac}")))?;
        if !(0..100).contains(&f) {
            return Err(CoreError::MalformedDecimal(format!("{whole}.{frac}")));
        }
        Ok(DeviceDecimal(w * 100 + f))
    }

    /// Saturating sum of two readings (tank totals).
    #[inline]
    pub const fn saturating_add(self, other: Self) -> Self {
        DeviceDecimal(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for DeviceDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, magnitude / 100, magnitude % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
