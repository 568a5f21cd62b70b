//! Dense, date-complete inventory grid.
//!
//! Every room type carries exactly one availability cell per date of the
//! grid's range and every rate plan exactly one rate cell per date. Dates
//! without a backing record hold the sentinel record id and a zero value.

mod assembler;

pub use assembler::{GridAssembler, GridFilter};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{
    CellKey, CellValue, DailyRecord, DateRange, Property, RatePlan, RecordId, RoomType, RowKey,
    RowKind,
};

/// One slot of the grid. `record_id` is the sentinel when nothing is stored.
pub type GridCell<V> = DailyRecord<V>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePlanRow {
    pub rate_plan: RatePlan,
    pub rates: Vec<GridCell<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTypeRow {
    pub room_type: RoomType,
    pub availability: Vec<GridCell<u32>>,
    pub rate_plans: Vec<RatePlanRow>,
}

/// Borrowed view of one row's dense series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowSeries<'a> {
    Availability(&'a [GridCell<u32>]),
    Rates(&'a [GridCell<f64>]),
}

impl RowSeries<'_> {
    pub fn len(&self) -> usize {
        match self {
            RowSeries::Availability(cells) => cells.len(),
            RowSeries::Rates(cells) => cells.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when at least one date carries a non-zero value.
    pub fn has_values(&self) -> bool {
        match self {
            RowSeries::Availability(cells) => cells.iter().any(|c| c.value != 0),
            RowSeries::Rates(cells) => cells.iter().any(|c| c.value != 0.0),
        }
    }
}

/// Room-type rooted grid for one property and date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryGrid {
    pub property: Property,
    pub range: DateRange,
    pub dates: Vec<NaiveDate>,
    pub room_types: Vec<RoomTypeRow>,
}

impl InventoryGrid {
    pub fn room_type(&self, room_type_id: &str) -> Option<&RoomTypeRow> {
        self.room_types
            .iter()
            .find(|row| row.room_type.id == room_type_id)
    }

    /// A rate plan together with the room type that owns it.
    pub fn rate_plan(&self, rate_plan_id: &str) -> Option<(&RoomTypeRow, &RatePlanRow)> {
        self.room_types.iter().find_map(|room| {
            room.rate_plans
                .iter()
                .find(|plan| plan.rate_plan.id == rate_plan_id)
                .map(|plan| (room, plan))
        })
    }

    /// Every row of the grid, room type first, then its rate plans.
    pub fn rows(&self) -> Vec<RowKey> {
        let mut rows = Vec::new();
        for room in &self.room_types {
            rows.push(RowKey::availability(room.room_type.id.clone()));
            for plan in &room.rate_plans {
                rows.push(RowKey::rate(plan.rate_plan.id.clone()));
            }
        }
        rows
    }

    pub fn series(&self, row: &RowKey) -> Option<RowSeries<'_>> {
        match row.kind {
            RowKind::Availability => self
                .room_type(&row.owner_id)
                .map(|room| RowSeries::Availability(&room.availability)),
            RowKind::Rate => self
                .rate_plan(&row.owner_id)
                .map(|(_, plan)| RowSeries::Rates(&plan.rates)),
        }
    }

    fn offset(&self, date: NaiveDate) -> Option<usize> {
        if !self.range.contains(date) {
            return None;
        }
        Some((date - self.range.start).num_days() as usize)
    }

    fn cell_at<V: Copy>(cells: &[GridCell<V>], idx: usize, date: NaiveDate) -> Option<GridCell<V>> {
        cells.get(idx).copied().filter(|cell| cell.date == date)
    }

    /// Backing record id of a cell; the sentinel when nothing is stored yet.
    /// `None` when the cell is not part of the grid.
    pub fn record_id(&self, key: &CellKey) -> Option<RecordId> {
        let idx = self.offset(key.date)?;
        match self.series(&key.row())? {
            RowSeries::Availability(cells) => {
                Self::cell_at(cells, idx, key.date).map(|c| c.record_id)
            }
            RowSeries::Rates(cells) => Self::cell_at(cells, idx, key.date).map(|c| c.record_id),
        }
    }

    /// Current stored value of a cell.
    pub fn value(&self, key: &CellKey) -> Option<CellValue> {
        let idx = self.offset(key.date)?;
        match self.series(&key.row())? {
            RowSeries::Availability(cells) => {
                Self::cell_at(cells, idx, key.date).map(|c| CellValue::Units(c.value))
            }
            RowSeries::Rates(cells) => {
                Self::cell_at(cells, idx, key.date).map(|c| CellValue::Price(c.value))
            }
        }
    }

    /// Record a successful write in the grid: the cell takes the stored
    /// value and the record id the store returned. Returns false when the
    /// cell is not part of the grid or the value is of the wrong kind.
    pub fn apply_saved(&mut self, key: &CellKey, record_id: RecordId, value: CellValue) -> bool {
        let Some(idx) = self.offset(key.date) else {
            return false;
        };
        match (key.kind, value) {
            (RowKind::Availability, CellValue::Units(units)) => self
                .room_types
                .iter_mut()
                .find(|room| room.room_type.id == key.owner_id)
                .and_then(|room| room.availability.get_mut(idx))
                .filter(|cell| cell.date == key.date)
                .map(|cell| {
                    cell.record_id = record_id;
                    cell.value = units;
                })
                .is_some(),
            (RowKind::Rate, CellValue::Price(price)) => self
                .room_types
                .iter_mut()
                .flat_map(|room| room.rate_plans.iter_mut())
                .find(|plan| plan.rate_plan.id == key.owner_id)
                .and_then(|plan| plan.rates.get_mut(idx))
                .filter(|cell| cell.date == key.date)
                .map(|cell| {
                    cell.record_id = record_id;
                    cell.value = price;
                })
                .is_some(),
            _ => false,
        }
    }
}
