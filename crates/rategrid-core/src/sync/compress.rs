//! Range compression of dense per-date series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::DailyRecord;

/// A run of consecutive dates sharing one value. `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressedRange<V> {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub value: V,
}

impl<V> CompressedRange<V> {
    pub fn len_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }
}

/// Collapse a date-sorted series into maximal runs of equal values.
///
/// A range closes when the value changes or the next date is not the day
/// after the previous one. Zero values are kept like any other value.
pub fn compress<V: Copy + PartialEq>(series: &[DailyRecord<V>]) -> Vec<CompressedRange<V>> {
    let mut ranges: Vec<CompressedRange<V>> = Vec::new();
    for cell in series {
        match ranges.last_mut() {
            Some(open) if open.value == cell.value && open.end.succ_opt() == Some(cell.date) => {
                open.end = cell.date;
            }
            _ => ranges.push(CompressedRange {
                start: cell.date,
                end: cell.date,
                value: cell.value,
            }),
        }
    }
    ranges
}

/// Expand ranges back into one `(date, value)` pair per day.
pub fn expand<V: Copy>(ranges: &[CompressedRange<V>]) -> Vec<(NaiveDate, V)> {
    let mut days = Vec::new();
    for range in ranges {
        let mut next = Some(range.start);
        while let Some(date) = next.filter(|date| *date <= range.end) {
            days.push((date, range.value));
            next = date.succ_opt();
        }
    }
    days
}
