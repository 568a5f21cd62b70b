//! Read-through cache of per-date series.
//!
//! Series reads are cached per (row, range). Catalog reads and all writes go
//! straight to the wrapped store. Cached rows are dropped through
//! [`RecordStore::invalidate`], which the reconciler calls for every row it
//! wrote to.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use super::RecordStore;
use crate::error::StoreError;
use crate::model::{
    AvailabilityRecord, DateRange, NewAvailability, NewRate, Property, RatePlan, RateRecord,
    RecordId, RoomType, RowKey,
};

#[derive(Debug, Clone)]
enum CachedSeries {
    Availability(Vec<AvailabilityRecord>),
    Rates(Vec<RateRecord>),
}

/// Caching wrapper around another [`RecordStore`].
pub struct CachedRecordStore<S> {
    inner: S,
    series: Mutex<HashMap<(RowKey, DateRange), CachedSeries>>,
}

impl<S: RecordStore> CachedRecordStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            series: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of cached (row, range) entries.
    pub fn cached_entries(&self) -> usize {
        self.series.lock().map(|s| s.len()).unwrap_or_default()
    }

    fn lookup(&self, key: &(RowKey, DateRange)) -> Option<CachedSeries> {
        self.series.lock().ok()?.get(key).cloned()
    }

    fn remember(&self, key: (RowKey, DateRange), value: CachedSeries) {
        if let Ok(mut series) = self.series.lock() {
            series.insert(key, value);
        }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for CachedRecordStore<S> {
    async fn fetch_property(&self, property_id: &str) -> Result<Property, StoreError> {
        self.inner.fetch_property(property_id).await
    }

    async fn fetch_room_types(&self, property_id: &str) -> Result<Vec<RoomType>, StoreError> {
        self.inner.fetch_room_types(property_id).await
    }

    async fn fetch_rate_plans(&self, room_type_id: &str) -> Result<Vec<RatePlan>, StoreError> {
        self.inner.fetch_rate_plans(room_type_id).await
    }

    async fn fetch_availability(
        &self,
        room_type_id: &str,
        range: DateRange,
    ) -> Result<Vec<AvailabilityRecord>, StoreError> {
        let key = (RowKey::availability(room_type_id), range);
        if let Some(CachedSeries::Availability(records)) = self.lookup(&key) {
            debug!(owner = room_type_id, %range, "availability served from cache");
            return Ok(records);
        }
        let records = self.inner.fetch_availability(room_type_id, range).await?;
        self.remember(key, CachedSeries::Availability(records.clone()));
        Ok(records)
    }

    async fn fetch_rates(
        &self,
        rate_plan_id: &str,
        range: DateRange,
    ) -> Result<Vec<RateRecord>, StoreError> {
        let key = (RowKey::rate(rate_plan_id), range);
        if let Some(CachedSeries::Rates(records)) = self.lookup(&key) {
            debug!(owner = rate_plan_id, %range, "rates served from cache");
            return Ok(records);
        }
        let records = self.inner.fetch_rates(rate_plan_id, range).await?;
        self.remember(key, CachedSeries::Rates(records.clone()));
        Ok(records)
    }

    async fn create_availability(
        &self,
        record: &NewAvailability,
    ) -> Result<RecordId, StoreError> {
        self.inner.create_availability(record).await
    }

    async fn update_availability(
        &self,
        record_id: RecordId,
        value: u32,
    ) -> Result<(), StoreError> {
        self.inner.update_availability(record_id, value).await
    }

    async fn create_rate(&self, record: &NewRate) -> Result<RecordId, StoreError> {
        self.inner.create_rate(record).await
    }

    async fn update_rate(&self, record_id: RecordId, value: f64) -> Result<(), StoreError> {
        self.inner.update_rate(record_id, value).await
    }

    fn invalidate(&self, row: &RowKey) {
        if let Ok(mut series) = self.series.lock() {
            let before = series.len();
            series.retain(|(cached_row, _), _| cached_row != row);
            debug!(%row, dropped = before - series.len(), "invalidated cached series");
        }
        self.inner.invalidate(row);
    }
}
