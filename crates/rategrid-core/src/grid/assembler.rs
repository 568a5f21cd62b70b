//! Builds an [`InventoryGrid`] from a record store.
//!
//! Filtering is an id-membership test applied before any series is fetched,
//! so filtered-out room types and rate plans are never loaded. Any store
//! failure aborts the whole load; callers retry with a fresh load.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::{GridCell, InventoryGrid, RatePlanRow, RoomTypeRow};
use crate::error::{GridError, ValidationError};
use crate::model::{DailyRecord, DateRange, RowKind, SENTINEL_RECORD_ID};
use crate::storage::RecordStore;

/// Default maximum number of days a grid may span.
pub const DEFAULT_MAX_RANGE_DAYS: usize = 366;

/// Optional subsets of room types and rate plans to load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridFilter {
    room_type_ids: Option<HashSet<String>>,
    rate_plan_ids: Option<HashSet<String>>,
}

impl GridFilter {
    /// Load everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only load the given room types (and their plans).
    pub fn with_room_types<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.room_type_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Only load the given rate plans. Room types stay listed.
    pub fn with_rate_plans<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.rate_plan_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn admits_room_type(&self, id: &str) -> bool {
        self.room_type_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(id))
    }

    pub fn admits_rate_plan(&self, id: &str) -> bool {
        self.rate_plan_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(id))
    }
}

/// Assembles dense grids from a [`RecordStore`].
pub struct GridAssembler<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    max_range_days: usize,
}

impl<'a, S: RecordStore + ?Sized> GridAssembler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            max_range_days: DEFAULT_MAX_RANGE_DAYS,
        }
    }

    pub fn with_max_range_days(mut self, days: usize) -> Self {
        self.max_range_days = days;
        self
    }

    /// Load the grid for `property_id` over `start..=end`.
    ///
    /// # Errors
    /// Returns [`GridError::Range`] for an unusable range and
    /// [`GridError::Fetch`] when any store call fails. No partial grid is
    /// ever returned.
    pub async fn assemble(
        &self,
        property_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        filter: &GridFilter,
    ) -> Result<InventoryGrid, GridError> {
        let range = DateRange::new(start, end)?;
        if range.len_days() > self.max_range_days {
            return Err(ValidationError::RangeTooLong {
                days: range.len_days(),
                max: self.max_range_days,
            }
            .into());
        }
        let dates: Vec<NaiveDate> = range.days().collect();

        let property = self
            .store
            .fetch_property(property_id)
            .await
            .map_err(|source| GridError::Fetch {
                what: "property",
                owner: property_id.to_string(),
                source,
            })?;

        let room_types = self
            .store
            .fetch_room_types(property_id)
            .await
            .map_err(|source| GridError::Fetch {
                what: "room types",
                owner: property_id.to_string(),
                source,
            })?;

        let mut rows = Vec::new();
        for room_type in room_types
            .into_iter()
            .filter(|rt| filter.admits_room_type(&rt.id))
        {
            let availability = self
                .store
                .fetch_availability(&room_type.id, range)
                .await
                .map_err(|source| GridError::Fetch {
                    what: "availability",
                    owner: room_type.id.clone(),
                    source,
                })?;
            let availability =
                fill_series(&dates, availability, RowKind::Availability, &room_type.id)?;

            let plans = self
                .store
                .fetch_rate_plans(&room_type.id)
                .await
                .map_err(|source| GridError::Fetch {
                    what: "rate plans",
                    owner: room_type.id.clone(),
                    source,
                })?;

            let mut rate_plans = Vec::new();
            for rate_plan in plans
                .into_iter()
                .filter(|rp| filter.admits_rate_plan(&rp.id))
            {
                let rates = self
                    .store
                    .fetch_rates(&rate_plan.id, range)
                    .await
                    .map_err(|source| GridError::Fetch {
                        what: "rates",
                        owner: rate_plan.id.clone(),
                        source,
                    })?;
                let rates = fill_series(&dates, rates, RowKind::Rate, &rate_plan.id)?;
                rate_plans.push(RatePlanRow { rate_plan, rates });
            }

            debug!(
                room_type = %room_type.id,
                rate_plans = rate_plans.len(),
                "room type assembled"
            );
            rows.push(RoomTypeRow {
                room_type,
                availability,
                rate_plans,
            });
        }

        info!(
            property = property_id,
            %range,
            room_types = rows.len(),
            "inventory grid assembled"
        );

        Ok(InventoryGrid {
            property,
            range,
            dates,
            room_types: rows,
        })
    }
}

/// Expand sparse records into one cell per date. Missing dates get the
/// sentinel id and `V::default()` (zero). Records outside `dates` are ignored.
fn fill_series<V: Copy + Default>(
    dates: &[NaiveDate],
    records: Vec<DailyRecord<V>>,
    kind: RowKind,
    owner: &str,
) -> Result<Vec<GridCell<V>>, GridError> {
    let mut by_date: HashMap<NaiveDate, DailyRecord<V>> = HashMap::with_capacity(records.len());
    for record in records {
        if by_date.insert(record.date, record).is_some() {
            return Err(GridError::DuplicateRecord {
                kind,
                owner: owner.to_string(),
                date: record.date,
            });
        }
    }

    Ok(dates
        .iter()
        .map(|&date| match by_date.get(&date) {
            Some(existing) => GridCell {
                record_id: existing.record_id,
                date,
                value: existing.value,
            },
            None => GridCell {
                record_id: SENTINEL_RECORD_ID,
                date,
                value: V::default(),
            },
        })
        .collect())
}
