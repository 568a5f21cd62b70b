//! Record stores and on-disk state.
//!
//! The grid assembler and reconciler only talk to the [`RecordStore`] trait.
//! Implementations:
//! - [`SqliteRecordStore`]: the persistent store
//! - [`MemoryRecordStore`]: in-memory store with an operation log
//! - [`CachedRecordStore`]: read-through cache over any other store

mod cache;
mod config;
mod memory;
pub mod migrations;
mod sqlite;

pub use cache::CachedRecordStore;
pub use config::{ChannelManagerConfig, CommitConfig, Config, GridConfig, StoreConfig};
pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ConfigError, StoreError};
use crate::model::{
    AvailabilityRecord, CellValue, DateRange, NewAvailability, NewRate, Property, RatePlan,
    RateRecord, RecordId, RoomType, RowKey,
};

/// Returns `~/.config/rategrid[-dev]/` based on RATEGRID_ENV.
///
/// Set RATEGRID_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("RATEGRID_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("rategrid-dev")
    } else {
        base_dir.join("rategrid")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// A single write against a record store.
///
/// The memory store logs these in arrival order; the reconciler plans and
/// dispatches them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreOperation {
    CreateAvailability(NewAvailability),
    UpdateAvailability { record_id: RecordId, value: u32 },
    CreateRate(NewRate),
    UpdateRate { record_id: RecordId, value: f64 },
}

impl StoreOperation {
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            StoreOperation::CreateAvailability(_) | StoreOperation::CreateRate(_)
        )
    }

    /// The value being written.
    pub fn value(&self) -> CellValue {
        match self {
            StoreOperation::CreateAvailability(record) => CellValue::Units(record.value),
            StoreOperation::UpdateAvailability { value, .. } => CellValue::Units(*value),
            StoreOperation::CreateRate(record) => CellValue::Price(record.value),
            StoreOperation::UpdateRate { value, .. } => CellValue::Price(*value),
        }
    }

    /// Send this write to `store`. Returns the id of the written record.
    pub async fn apply<S: RecordStore + ?Sized>(&self, store: &S) -> Result<RecordId, StoreError> {
        match self {
            StoreOperation::CreateAvailability(record) => store.create_availability(record).await,
            StoreOperation::UpdateAvailability { record_id, value } => store
                .update_availability(*record_id, *value)
                .await
                .map(|()| *record_id),
            StoreOperation::CreateRate(record) => store.create_rate(record).await,
            StoreOperation::UpdateRate { record_id, value } => store
                .update_rate(*record_id, *value)
                .await
                .map(|()| *record_id),
        }
    }
}

/// Source and sink of room types, rate plans and their per-date records.
///
/// Every method is a suspension point; nothing else in the core awaits.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_property(&self, property_id: &str) -> Result<Property, StoreError>;

    async fn fetch_room_types(&self, property_id: &str) -> Result<Vec<RoomType>, StoreError>;

    async fn fetch_rate_plans(&self, room_type_id: &str) -> Result<Vec<RatePlan>, StoreError>;

    /// Existing availability records of a room type inside `range`. Dates
    /// without a record are simply absent.
    async fn fetch_availability(
        &self,
        room_type_id: &str,
        range: DateRange,
    ) -> Result<Vec<AvailabilityRecord>, StoreError>;

    /// Existing rate records of a rate plan inside `range`.
    async fn fetch_rates(
        &self,
        rate_plan_id: &str,
        range: DateRange,
    ) -> Result<Vec<RateRecord>, StoreError>;

    async fn create_availability(&self, record: &NewAvailability)
        -> Result<RecordId, StoreError>;

    async fn update_availability(&self, record_id: RecordId, value: u32)
        -> Result<(), StoreError>;

    async fn create_rate(&self, record: &NewRate) -> Result<RecordId, StoreError>;

    async fn update_rate(&self, record_id: RecordId, value: f64) -> Result<(), StoreError>;

    /// Drop any cached read view of `row`. No-op for uncached stores.
    fn invalidate(&self, _row: &RowKey) {}
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn fetch_property(&self, property_id: &str) -> Result<Property, StoreError> {
        (**self).fetch_property(property_id).await
    }

    async fn fetch_room_types(&self, property_id: &str) -> Result<Vec<RoomType>, StoreError> {
        (**self).fetch_room_types(property_id).await
    }

    async fn fetch_rate_plans(&self, room_type_id: &str) -> Result<Vec<RatePlan>, StoreError> {
        (**self).fetch_rate_plans(room_type_id).await
    }

    async fn fetch_availability(
        &self,
        room_type_id: &str,
        range: DateRange,
    ) -> Result<Vec<AvailabilityRecord>, StoreError> {
        (**self).fetch_availability(room_type_id, range).await
    }

    async fn fetch_rates(
        &self,
        rate_plan_id: &str,
        range: DateRange,
    ) -> Result<Vec<RateRecord>, StoreError> {
        (**self).fetch_rates(rate_plan_id, range).await
    }

    async fn create_availability(
        &self,
        record: &NewAvailability,
    ) -> Result<RecordId, StoreError> {
        (**self).create_availability(record).await
    }

    async fn update_availability(
        &self,
        record_id: RecordId,
        value: u32,
    ) -> Result<(), StoreError> {
        (**self).update_availability(record_id, value).await
    }

    async fn create_rate(&self, record: &NewRate) -> Result<RecordId, StoreError> {
        (**self).create_rate(record).await
    }

    async fn update_rate(&self, record_id: RecordId, value: f64) -> Result<(), StoreError> {
        (**self).update_rate(record_id, value).await
    }

    fn invalidate(&self, row: &RowKey) {
        (**self).invalidate(row)
    }
}
