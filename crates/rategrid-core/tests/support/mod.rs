//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use rategrid_core::sync::SyncPayload;
use rategrid_core::{
    ChannelManager, MemoryRecordStore, Property, RatePlan, RoomType, SyncError,
};

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Property H1 with room type R1 (rate plan P1) and room type R2 (rate
/// plan P2). Every entity carries a channel-manager id.
pub fn catalog() -> (Property, Vec<RoomType>, Vec<RatePlan>) {
    let property = Property {
        id: "H1".into(),
        title: "Harbour Hotel".into(),
        channel_id: Some("cm-h1".into()),
    };
    let room_types = vec![
        RoomType {
            id: "R1".into(),
            property_id: "H1".into(),
            title: "Double".into(),
            room_count: 6,
            channel_id: Some("cm-r1".into()),
        },
        RoomType {
            id: "R2".into(),
            property_id: "H1".into(),
            title: "Suite".into(),
            room_count: 2,
            channel_id: Some("cm-r2".into()),
        },
    ];
    let rate_plans = vec![
        RatePlan {
            id: "P1".into(),
            room_type_id: "R1".into(),
            title: "Flexible".into(),
            code: Some("FLEX".into()),
            channel_id: Some("cm-p1".into()),
        },
        RatePlan {
            id: "P2".into(),
            room_type_id: "R2".into(),
            title: "Non-refundable".into(),
            code: Some("NRF".into()),
            channel_id: Some("cm-p2".into()),
        },
    ];
    (property, room_types, rate_plans)
}

pub fn memory_store() -> MemoryRecordStore {
    let store = MemoryRecordStore::new();
    let (property, room_types, rate_plans) = catalog();
    store.insert_property(property).unwrap();
    for room_type in room_types {
        store.insert_room_type(room_type).unwrap();
    }
    for rate_plan in rate_plans {
        store.insert_rate_plan(rate_plan).unwrap();
    }
    store
}

/// Channel manager that records pushes and can be told to refuse them.
#[derive(Default)]
pub struct FakeChannel {
    pub pushes: Mutex<Vec<(String, String, SyncPayload)>>,
    pub fail_with: Mutex<Option<u16>>,
}

impl FakeChannel {
    pub fn refuse(&self, status: u16) {
        *self.fail_with.lock().unwrap() = Some(status);
    }

    pub fn accept(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelManager for FakeChannel {
    async fn push_ranges(
        &self,
        property_external_id: &str,
        owner_external_id: &str,
        payload: &SyncPayload,
    ) -> Result<(), SyncError> {
        if let Some(status) = *self.fail_with.lock().unwrap() {
            return Err(SyncError::Rejected {
                status,
                body: "refused".into(),
            });
        }
        self.pushes.lock().unwrap().push((
            property_external_id.to_string(),
            owner_external_id.to_string(),
            payload.clone(),
        ));
        Ok(())
    }
}
