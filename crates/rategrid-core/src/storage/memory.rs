//! In-memory record store.
//!
//! Keeps the same invariants as the SQLite store (one record per slot,
//! writes only against known owners) and logs every write it receives, so
//! callers can see exactly which operations a commit dispatched. Individual
//! slots can be made to fail, and the whole store can be taken offline.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{RecordStore, StoreOperation};
use crate::error::StoreError;
use crate::model::{
    AvailabilityRecord, CellKey, DailyRecord, DateRange, NewAvailability, NewRate, Property,
    RatePlan, RateRecord, RecordId, RoomType, RowKind,
};

#[derive(Default)]
struct MemoryState {
    properties: BTreeMap<String, Property>,
    room_types: BTreeMap<String, RoomType>,
    rate_plans: BTreeMap<String, RatePlan>,
    availability: HashMap<(String, NaiveDate), AvailabilityRecord>,
    rates: HashMap<(String, NaiveDate), RateRecord>,
    next_id: RecordId,
    operations: Vec<StoreOperation>,
    fetch_count: usize,
    failing_cells: HashSet<CellKey>,
    offline: bool,
}

impl MemoryState {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        Ok(())
    }

    fn check_cell(&self, key: &CellKey) -> Result<(), StoreError> {
        if self.failing_cells.contains(key) {
            return Err(StoreError::Unavailable(format!("write rejected for {key}")));
        }
        Ok(())
    }

    fn availability_key(&self, record_id: RecordId) -> Option<(String, NaiveDate)> {
        self.availability
            .iter()
            .find(|(_, r)| r.record_id == record_id)
            .map(|(k, _)| k.clone())
    }

    fn rate_key(&self, record_id: RecordId) -> Option<(String, NaiveDate)> {
        self.rates
            .iter()
            .find(|(_, r)| r.record_id == record_id)
            .map(|(k, _)| k.clone())
    }
}

/// Record store kept entirely in memory.
#[derive(Default)]
pub struct MemoryRecordStore {
    state: Mutex<MemoryState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))
    }

    pub fn insert_property(&self, property: Property) -> Result<(), StoreError> {
        self.state()?
            .properties
            .insert(property.id.clone(), property);
        Ok(())
    }

    pub fn insert_room_type(&self, room_type: RoomType) -> Result<(), StoreError> {
        self.state()?
            .room_types
            .insert(room_type.id.clone(), room_type);
        Ok(())
    }

    pub fn insert_rate_plan(&self, rate_plan: RatePlan) -> Result<(), StoreError> {
        self.state()?
            .rate_plans
            .insert(rate_plan.id.clone(), rate_plan);
        Ok(())
    }

    /// Seed an existing availability record without logging an operation.
    pub fn seed_availability(
        &self,
        room_type_id: &str,
        date: NaiveDate,
        value: u32,
    ) -> Result<RecordId, StoreError> {
        let mut state = self.state()?;
        let record_id = state.allocate_id();
        state.availability.insert(
            (room_type_id.to_string(), date),
            DailyRecord {
                record_id,
                date,
                value,
            },
        );
        Ok(record_id)
    }

    /// Seed an existing rate record under a chosen id, without logging an operation.
    pub fn seed_rate(
        &self,
        rate_plan_id: &str,
        record_id: RecordId,
        date: NaiveDate,
        value: f64,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.next_id = state.next_id.max(record_id);
        state.rates.insert(
            (rate_plan_id.to_string(), date),
            DailyRecord {
                record_id,
                date,
                value,
            },
        );
        Ok(())
    }

    /// Make every write addressed to `key` fail.
    pub fn fail_writes_for(&self, key: CellKey) -> Result<(), StoreError> {
        self.state()?.failing_cells.insert(key);
        Ok(())
    }

    /// Take the store offline (every call fails) or back online.
    pub fn set_offline(&self, offline: bool) -> Result<(), StoreError> {
        self.state()?.offline = offline;
        Ok(())
    }

    /// Writes received so far, in arrival order. Failed writes are included.
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.state()
            .map(|s| s.operations.clone())
            .unwrap_or_default()
    }

    /// Number of series fetches served.
    pub fn fetch_count(&self) -> usize {
        self.state().map(|s| s.fetch_count).unwrap_or_default()
    }

    pub fn availability_value(&self, room_type_id: &str, date: NaiveDate) -> Option<u32> {
        let state = self.state().ok()?;
        state
            .availability
            .get(&(room_type_id.to_string(), date))
            .map(|r| r.value)
    }

    pub fn rate_value(&self, rate_plan_id: &str, date: NaiveDate) -> Option<f64> {
        let state = self.state().ok()?;
        state
            .rates
            .get(&(rate_plan_id.to_string(), date))
            .map(|r| r.value)
    }
}

fn series_in_range<V: Copy>(
    records: &HashMap<(String, NaiveDate), DailyRecord<V>>,
    owner: &str,
    range: DateRange,
) -> Vec<DailyRecord<V>> {
    let mut found: Vec<_> = records
        .iter()
        .filter(|((o, date), _)| o == owner && range.contains(*date))
        .map(|(_, r)| *r)
        .collect();
    found.sort_by_key(|r| r.date);
    found
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_property(&self, property_id: &str) -> Result<Property, StoreError> {
        let state = self.state()?;
        state.check_online()?;
        state
            .properties
            .get(property_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "property",
                id: property_id.to_string(),
            })
    }

    async fn fetch_room_types(&self, property_id: &str) -> Result<Vec<RoomType>, StoreError> {
        let state = self.state()?;
        state.check_online()?;
        if !state.properties.contains_key(property_id) {
            return Err(StoreError::NotFound {
                entity: "property",
                id: property_id.to_string(),
            });
        }
        Ok(state
            .room_types
            .values()
            .filter(|rt| rt.property_id == property_id)
            .cloned()
            .collect())
    }

    async fn fetch_rate_plans(&self, room_type_id: &str) -> Result<Vec<RatePlan>, StoreError> {
        let state = self.state()?;
        state.check_online()?;
        Ok(state
            .rate_plans
            .values()
            .filter(|rp| rp.room_type_id == room_type_id)
            .cloned()
            .collect())
    }

    async fn fetch_availability(
        &self,
        room_type_id: &str,
        range: DateRange,
    ) -> Result<Vec<AvailabilityRecord>, StoreError> {
        let mut state = self.state()?;
        state.check_online()?;
        state.fetch_count += 1;
        Ok(series_in_range(&state.availability, room_type_id, range))
    }

    async fn fetch_rates(
        &self,
        rate_plan_id: &str,
        range: DateRange,
    ) -> Result<Vec<RateRecord>, StoreError> {
        let mut state = self.state()?;
        state.check_online()?;
        state.fetch_count += 1;
        Ok(series_in_range(&state.rates, rate_plan_id, range))
    }

    async fn create_availability(
        &self,
        record: &NewAvailability,
    ) -> Result<RecordId, StoreError> {
        let mut state = self.state()?;
        state
            .operations
            .push(StoreOperation::CreateAvailability(record.clone()));
        state.check_online()?;
        state.check_cell(&CellKey::new(
            RowKind::Availability,
            record.room_type_id.clone(),
            record.date,
        ))?;
        if !state.room_types.contains_key(&record.room_type_id) {
            return Err(StoreError::NotFound {
                entity: "room type",
                id: record.room_type_id.clone(),
            });
        }
        let slot = (record.room_type_id.clone(), record.date);
        if state.availability.contains_key(&slot) {
            return Err(StoreError::DuplicateRecord {
                kind: RowKind::Availability,
                owner: record.room_type_id.clone(),
                date: record.date,
            });
        }
        let record_id = state.allocate_id();
        state.availability.insert(
            slot,
            DailyRecord {
                record_id,
                date: record.date,
                value: record.value,
            },
        );
        Ok(record_id)
    }

    async fn update_availability(
        &self,
        record_id: RecordId,
        value: u32,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state
            .operations
            .push(StoreOperation::UpdateAvailability { record_id, value });
        state.check_online()?;
        let slot = state
            .availability_key(record_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "availability record",
                id: record_id.to_string(),
            })?;
        state.check_cell(&CellKey::new(RowKind::Availability, slot.0.clone(), slot.1))?;
        if let Some(existing) = state.availability.get_mut(&slot) {
            existing.value = value;
        }
        Ok(())
    }

    async fn create_rate(&self, record: &NewRate) -> Result<RecordId, StoreError> {
        let mut state = self.state()?;
        state.operations.push(StoreOperation::CreateRate(record.clone()));
        state.check_online()?;
        state.check_cell(&CellKey::new(
            RowKind::Rate,
            record.rate_plan_id.clone(),
            record.date,
        ))?;
        if !state.rate_plans.contains_key(&record.rate_plan_id) {
            return Err(StoreError::NotFound {
                entity: "rate plan",
                id: record.rate_plan_id.clone(),
            });
        }
        let slot = (record.rate_plan_id.clone(), record.date);
        if state.rates.contains_key(&slot) {
            return Err(StoreError::DuplicateRecord {
                kind: RowKind::Rate,
                owner: record.rate_plan_id.clone(),
                date: record.date,
            });
        }
        let record_id = state.allocate_id();
        state.rates.insert(
            slot,
            DailyRecord {
                record_id,
                date: record.date,
                value: record.value,
            },
        );
        Ok(record_id)
    }

    async fn update_rate(&self, record_id: RecordId, value: f64) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state
            .operations
            .push(StoreOperation::UpdateRate { record_id, value });
        state.check_online()?;
        let slot = state.rate_key(record_id).ok_or_else(|| StoreError::NotFound {
            entity: "rate record",
            id: record_id.to_string(),
        })?;
        state.check_cell(&CellKey::new(RowKind::Rate, slot.0.clone(), slot.1))?;
        if let Some(existing) = state.rates.get_mut(&slot) {
            existing.value = value;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn store_with_room() -> MemoryRecordStore {
        let store = MemoryRecordStore::new();
        store
            .insert_property(Property {
                id: "H1".into(),
                title: "Harbour Hotel".into(),
                channel_id: None,
            })
            .unwrap();
        store
            .insert_room_type(RoomType {
                id: "R1".into(),
                property_id: "H1".into(),
                title: "Double".into(),
                room_count: 4,
                channel_id: None,
            })
            .unwrap();
        store
    }

    #[tokio::test]
    async fn writes_are_logged_in_order() {
        let store = store_with_room();
        let id = store
            .create_availability(&NewAvailability {
                room_type_id: "R1".into(),
                date: d("2024-06-01"),
                value: 5,
            })
            .await
            .unwrap();
        store.update_availability(id, 6).await.unwrap();

        let ops = store.operations();
        assert_eq!(ops.len(), 2);
        assert!(ops[0].is_create());
        assert_eq!(
            ops[1],
            StoreOperation::UpdateAvailability {
                record_id: id,
                value: 6
            }
        );
        assert_eq!(store.availability_value("R1", d("2024-06-01")), Some(6));
    }

    #[tokio::test]
    async fn failing_cell_rejects_write() {
        let store = store_with_room();
        store
            .fail_writes_for(CellKey::new(RowKind::Availability, "R1", d("2024-06-02")))
            .unwrap();
        let err = store
            .create_availability(&NewAvailability {
                room_type_id: "R1".into(),
                date: d("2024-06-02"),
                value: 2,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.availability_value("R1", d("2024-06-02")), None);
    }

    #[tokio::test]
    async fn offline_store_fails_fetches() {
        let store = store_with_room();
        store.set_offline(true).unwrap();
        assert!(store.fetch_room_types("H1").await.is_err());
        store.set_offline(false).unwrap();
        assert_eq!(store.fetch_room_types("H1").await.unwrap().len(), 1);
    }
}
