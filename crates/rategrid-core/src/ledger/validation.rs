//! Cell input validation.
//!
//! Availability and rate cells follow different policies. Availability
//! input is rejected when malformed or out of range; rate input that does
//! not parse is stored as zero.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{CellValue, RowKind, MAX_AVAILABILITY, MIN_AVAILABILITY};

/// How malformed input for a row kind is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationPolicy {
    /// Malformed or out-of-domain input is refused; the ledger is untouched.
    Reject,
    /// Malformed input becomes zero and is accepted.
    CoerceToZero,
}

impl ValidationPolicy {
    pub fn for_kind(kind: RowKind) -> Self {
        match kind {
            RowKind::Availability => ValidationPolicy::Reject,
            RowKind::Rate => ValidationPolicy::CoerceToZero,
        }
    }
}

/// Whether the input is still being typed or the cell lost focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStage {
    Typing,
    Finalize,
}

/// Parse raw text for a cell of `kind`.
pub fn parse_cell_input(
    kind: RowKind,
    stage: InputStage,
    raw: &str,
) -> Result<CellValue, ValidationError> {
    match ValidationPolicy::for_kind(kind) {
        ValidationPolicy::Reject => {
            let units = match stage {
                InputStage::Typing => typed_availability(raw)?,
                InputStage::Finalize => finalized_availability(raw)?,
            };
            Ok(CellValue::Units(units))
        }
        ValidationPolicy::CoerceToZero => Ok(CellValue::Price(coerce_rate(raw))),
    }
}

/// Parse a whole base-10 number. Empty input is the explicit clear (0).
fn parse_whole_number(raw: &str) -> Result<i64, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    let not_integer = || ValidationError::NotAnInteger {
        input: raw.to_string(),
    };
    if trimmed.contains(['.', ',']) {
        return Err(not_integer());
    }
    let digits = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_integer());
    }
    // digits only at this point, so a parse failure is an overflow
    Ok(trimmed.parse::<i64>().unwrap_or(if trimmed.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    }))
}

/// Availability while typing: empty clears, anything else must be in range.
pub fn typed_availability(raw: &str) -> Result<u32, ValidationError> {
    if raw.trim().is_empty() {
        return Ok(0);
    }
    let value = parse_whole_number(raw)?;
    check_availability_value(value)
}

/// Availability on blur: below the minimum clears, above the maximum clamps.
pub fn finalized_availability(raw: &str) -> Result<u32, ValidationError> {
    let value = parse_whole_number(raw)?;
    if value < i64::from(MIN_AVAILABILITY) {
        Ok(0)
    } else if value > i64::from(MAX_AVAILABILITY) {
        Ok(MAX_AVAILABILITY)
    } else {
        Ok(value as u32)
    }
}

/// Domain check applied to availability before it may be persisted.
pub fn check_availability_value(value: i64) -> Result<u32, ValidationError> {
    if value < i64::from(MIN_AVAILABILITY) || value > i64::from(MAX_AVAILABILITY) {
        return Err(ValidationError::OutOfRange {
            value,
            min: MIN_AVAILABILITY,
            max: MAX_AVAILABILITY,
        });
    }
    Ok(value as u32)
}

/// Rate input: a non-negative finite decimal, anything else is 0.
pub fn coerce_rate(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        _ => 0.0,
    }
}
