//! Inventory data model shared by the grid, ledger, reconciler and sync layers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Backing-store identifier of an availability or rate record.
pub type RecordId = i64;

/// Reserved id for a date slot that has no backing record yet.
pub const SENTINEL_RECORD_ID: RecordId = 0;

/// Lowest availability a room type may be given on one date.
pub const MIN_AVAILABILITY: u32 = 1;

/// Highest availability a room type may be given on one date.
pub const MAX_AVAILABILITY: u32 = 12;

/// Returns true when `id` refers to a persisted record.
pub fn is_persisted(id: RecordId) -> bool {
    id > SENTINEL_RECORD_ID
}

/// Which per-date series a row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    /// Room-type availability (sellable units per date).
    Availability,
    /// Rate-plan price per date.
    Rate,
}

impl RowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowKind::Availability => "availability",
            RowKind::Rate => "rate",
        }
    }
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RowKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "availability" | "avail" => Ok(RowKind::Availability),
            "rate" | "rates" => Ok(RowKind::Rate),
            other => Err(ValidationError::InvalidValue {
                field: "kind".to_string(),
                message: format!("unknown row kind '{other}' (expected availability or rate)"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub title: String,
    /// Identifier of the property on the channel-manager side.
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: String,
    pub property_id: String,
    pub title: String,
    pub room_count: u32,
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePlan {
    pub id: String,
    pub room_type_id: String,
    pub title: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `end` before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of days in the range, both ends included.
    pub fn len_days(&self) -> usize {
        ((self.end - self.start).num_days() + 1) as usize
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every date of the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(self.len_days())
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One per-date record as returned by a record store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord<V> {
    pub record_id: RecordId,
    pub date: NaiveDate,
    pub value: V,
}

pub type AvailabilityRecord = DailyRecord<u32>;
pub type RateRecord = DailyRecord<f64>;

/// Payload for creating an availability record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAvailability {
    pub room_type_id: String,
    pub date: NaiveDate,
    pub value: u32,
}

/// Payload for creating a rate record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRate {
    pub rate_plan_id: String,
    pub date: NaiveDate,
    pub value: f64,
}

/// A cell value as held by the edit ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Units(u32),
    Price(f64),
}

impl CellValue {
    /// The cleared value for a row kind.
    pub fn zero(kind: RowKind) -> Self {
        match kind {
            RowKind::Availability => CellValue::Units(0),
            RowKind::Rate => CellValue::Price(0.0),
        }
    }

    pub fn kind(&self) -> RowKind {
        match self {
            CellValue::Units(_) => RowKind::Availability,
            CellValue::Price(_) => RowKind::Rate,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            CellValue::Units(v) => *v == 0,
            CellValue::Price(v) => *v == 0.0,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Units(v) => write!(f, "{v}"),
            CellValue::Price(v) => write!(f, "{v:.2}"),
        }
    }
}

/// Identifies one cell of the grid: (kind, owner, date).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub kind: RowKind,
    /// Room type id for availability, rate plan id for rates.
    pub owner_id: String,
    pub date: NaiveDate,
}

impl CellKey {
    pub fn new(kind: RowKind, owner_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            kind,
            owner_id: owner_id.into(),
            date,
        }
    }

    /// The row this cell belongs to.
    pub fn row(&self) -> RowKey {
        RowKey::new(self.kind, self.owner_id.clone())
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.owner_id, self.date)
    }
}

/// Identifies one row of the grid: (kind, owner).
///
/// Used both to address a series and as the dirty-row marker of the
/// sync-state tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    pub kind: RowKind,
    pub owner_id: String,
}

impl RowKey {
    pub fn new(kind: RowKind, owner_id: impl Into<String>) -> Self {
        Self {
            kind,
            owner_id: owner_id.into(),
        }
    }

    pub fn availability(room_type_id: impl Into<String>) -> Self {
        Self::new(RowKind::Availability, room_type_id)
    }

    pub fn rate(rate_plan_id: impl Into<String>) -> Self {
        Self::new(RowKind::Rate, rate_plan_id)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.owner_id)
    }
}

/// A row with unsynced local changes.
pub type DirtyRowKey = RowKey;

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn date_range_is_inclusive() {
        let range = DateRange::new(d("2024-06-01"), d("2024-06-03")).unwrap();
        assert_eq!(range.len_days(), 3);
        let days: Vec<_> = range.days().collect();
        assert_eq!(days, vec![d("2024-06-01"), d("2024-06-02"), d("2024-06-03")]);
        assert!(range.contains(d("2024-06-03")));
        assert!(!range.contains(d("2024-06-04")));
    }

    #[test]
    fn single_day_range() {
        let range = DateRange::new(d("2024-02-29"), d("2024-02-29")).unwrap();
        assert_eq!(range.days().count(), 1);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = DateRange::new(d("2024-06-03"), d("2024-06-01")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDateRange { .. }));
    }

    #[test]
    fn row_kind_parses_loosely() {
        assert_eq!("Availability".parse::<RowKind>().unwrap(), RowKind::Availability);
        assert_eq!(" rates ".parse::<RowKind>().unwrap(), RowKind::Rate);
        assert!("price".parse::<RowKind>().is_err());
    }

    #[test]
    fn sentinel_is_not_persisted() {
        assert!(!is_persisted(SENTINEL_RECORD_ID));
        assert!(is_persisted(42));
    }

    #[test]
    fn cell_value_display() {
        assert_eq!(CellValue::Units(7).to_string(), "7");
        assert_eq!(CellValue::Price(120.5).to_string(), "120.50");
        assert!(CellValue::zero(RowKind::Rate).is_zero());
    }
}
