//! Pushes one dirty row to the channel manager as compressed ranges.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::channel_client::{ChannelManager, SyncPayload};
use super::compress::compress;
use super::eligibility::{check_eligibility, SyncContext, SyncEligibility};
use super::SyncStateTracker;
use crate::error::SyncError;
use crate::grid::{InventoryGrid, RowSeries};
use crate::model::RowKey;

/// Summary of a confirmed push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub row: RowKey,
    pub ranges: usize,
    pub days: usize,
}

/// Compress a row's dense series into its wire payload.
pub fn payload_for(series: RowSeries<'_>) -> SyncPayload {
    match series {
        RowSeries::Availability(cells) => SyncPayload::Availability(compress(cells)),
        RowSeries::Rates(cells) => SyncPayload::Rates(compress(cells)),
    }
}

/// Eligibility of `row` without pushing anything.
pub fn row_eligibility(
    grid: &InventoryGrid,
    row: &RowKey,
    tracker: &SyncStateTracker,
    reference_loading: bool,
) -> Result<SyncEligibility, SyncError> {
    let ctx = SyncContext::from_grid(grid, row, tracker, reference_loading)?;
    Ok(check_eligibility(&ctx))
}

/// Syncs grid rows through a [`ChannelManager`].
pub struct RowSyncer<'a, C: ChannelManager + ?Sized> {
    channel: &'a C,
}

impl<'a, C: ChannelManager + ?Sized> RowSyncer<'a, C> {
    pub fn new(channel: &'a C) -> Self {
        Self { channel }
    }

    /// Push `row` if it is eligible. A confirmed push clears the row's dirty
    /// mark; any failure leaves it dirty. Nothing is retried.
    ///
    /// # Errors
    /// [`SyncError::Disabled`] with the reason when the row is not eligible,
    /// otherwise whatever the channel manager reported.
    pub async fn sync_row(
        &self,
        grid: &InventoryGrid,
        row: &RowKey,
        tracker: &mut SyncStateTracker,
        reference_loading: bool,
    ) -> Result<SyncOutcome, SyncError> {
        let ctx = SyncContext::from_grid(grid, row, tracker, reference_loading)?;
        if let SyncEligibility::Disabled(reason) = check_eligibility(&ctx) {
            return Err(SyncError::Disabled(reason));
        }

        let not_mapped = || SyncError::NotConfigured(format!("no channel id for {row}"));
        let property_external_id = ctx.property.channel_id.clone().ok_or_else(not_mapped)?;
        let owner_external_id = match ctx.rate_plan {
            Some(plan) => plan.channel_id.clone(),
            None => ctx.room_type.channel_id.clone(),
        }
        .ok_or_else(not_mapped)?;

        let payload = payload_for(ctx.series);
        let outcome = SyncOutcome {
            row: row.clone(),
            ranges: payload.len(),
            days: ctx.series.len(),
        };

        match self
            .channel
            .push_ranges(&property_external_id, &owner_external_id, &payload)
            .await
        {
            Ok(()) => {
                tracker.clear_dirty(row);
                info!(
                    kind = %row.kind,
                    owner = %row.owner_id,
                    ranges = outcome.ranges,
                    days = outcome.days,
                    "row synced"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(kind = %row.kind, owner = %row.owner_id, error = %e, "sync failed, row stays dirty");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateRange, Property, RatePlan, RoomType};
    use crate::grid::{GridCell, RatePlanRow, RoomTypeRow};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        pushes: Mutex<Vec<(String, String, SyncPayload)>>,
        reject: bool,
    }

    #[async_trait]
    impl ChannelManager for RecordingChannel {
        async fn push_ranges(
            &self,
            property_external_id: &str,
            owner_external_id: &str,
            payload: &SyncPayload,
        ) -> Result<(), SyncError> {
            if self.reject {
                return Err(SyncError::Rejected {
                    status: 503,
                    body: "maintenance".into(),
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

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn grid(rates: &[f64]) -> InventoryGrid {
        let range = DateRange::new(d("2024-06-01"), d("2024-06-05")).unwrap();
        let dates: Vec<NaiveDate> = range.days().collect();
        let cells = dates
            .iter()
            .zip(rates)
            .map(|(&date, &value)| GridCell {
                record_id: 1,
                date,
                value,
            })
            .collect();
        InventoryGrid {
            property: Property {
                id: "H1".into(),
                title: "Harbour Hotel".into(),
                channel_id: Some("cm-h1".into()),
            },
            range,
            room_types: vec![RoomTypeRow {
                room_type: RoomType {
                    id: "R1".into(),
                    property_id: "H1".into(),
                    title: "Double".into(),
                    room_count: 4,
                    channel_id: Some("cm-r1".into()),
                },
                availability: dates
                    .iter()
                    .map(|&date| GridCell { record_id: 0, date, value: 0 })
                    .collect(),
                rate_plans: vec![RatePlanRow {
                    rate_plan: RatePlan {
                        id: "P1".into(),
                        room_type_id: "R1".into(),
                        title: "Flexible".into(),
                        code: None,
                        channel_id: Some("cm-p1".into()),
                    },
                    rates: cells,
                }],
            }],
            dates,
        }
    }

    #[tokio::test]
    async fn confirmed_push_clears_dirty() {
        let grid = grid(&[100.0, 100.0, 100.0, 120.0, 120.0]);
        let channel = RecordingChannel::default();
        let mut tracker = SyncStateTracker::new();
        let row = RowKey::rate("P1");
        tracker.mark_dirty(row.clone());

        let outcome = RowSyncer::new(&channel)
            .sync_row(&grid, &row, &mut tracker, false)
            .await
            .unwrap();

        assert_eq!(outcome.ranges, 2);
        assert_eq!(outcome.days, 5);
        assert!(!tracker.is_dirty(&row));
        let pushes = channel.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, "cm-h1");
        assert_eq!(pushes[0].1, "cm-p1");
    }

    #[tokio::test]
    async fn rejected_push_keeps_dirty() {
        let grid = grid(&[100.0; 5]);
        let channel = RecordingChannel {
            reject: true,
            ..Default::default()
        };
        let mut tracker = SyncStateTracker::new();
        let row = RowKey::rate("P1");
        tracker.mark_dirty(row.clone());

        let err = RowSyncer::new(&channel)
            .sync_row(&grid, &row, &mut tracker, false)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Rejected { status: 503, .. }));
        assert!(tracker.is_dirty(&row));
    }

    #[tokio::test]
    async fn clean_row_is_not_pushed() {
        let grid = grid(&[100.0; 5]);
        let channel = RecordingChannel::default();
        let mut tracker = SyncStateTracker::new();

        let err = RowSyncer::new(&channel)
            .sync_row(&grid, &RowKey::rate("P1"), &mut tracker, false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Sync disabled: no changes to sync");
        assert!(channel.pushes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_row_is_not_pushed() {
        let grid = grid(&[100.0; 5]);
        let channel = RecordingChannel::default();
        let mut tracker = SyncStateTracker::new();
        let row = RowKey::availability("R1");
        tracker.mark_dirty(row.clone());

        let err = RowSyncer::new(&channel)
            .sync_row(&grid, &row, &mut tracker, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Disabled(crate::sync::DisabledReason::NoValues)
        ));
        assert!(tracker.is_dirty(&row));
    }

    #[test]
    fn unknown_row() {
        let grid = grid(&[100.0; 5]);
        let tracker = SyncStateTracker::new();
        let result = row_eligibility(&grid, &RowKey::rate("P9"), &tracker, false);
        assert!(matches!(result, Err(SyncError::UnknownRow(_))));
    }
}
