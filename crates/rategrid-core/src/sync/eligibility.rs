//! Whether a row may be pushed to the channel manager right now.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::SyncStateTracker;
use crate::error::SyncError;
use crate::grid::{InventoryGrid, RowSeries};
use crate::model::{Property, RatePlan, RoomType, RowKey, RowKind};

/// Why sync is disabled for a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DisabledReason {
    ReferenceLoading,
    MissingChannelMapping { entity: String },
    NoValues,
    NoChanges,
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisabledReason::ReferenceLoading => f.write_str("reference data is still loading"),
            DisabledReason::MissingChannelMapping { entity } => {
                write!(f, "missing channel manager mapping for {entity}")
            }
            DisabledReason::NoValues => f.write_str("row has no values to sync"),
            DisabledReason::NoChanges => f.write_str("no changes to sync"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncEligibility {
    Enabled,
    Disabled(DisabledReason),
}

impl SyncEligibility {
    pub fn is_enabled(&self) -> bool {
        matches!(self, SyncEligibility::Enabled)
    }

    pub fn reason(&self) -> Option<&DisabledReason> {
        match self {
            SyncEligibility::Enabled => None,
            SyncEligibility::Disabled(reason) => Some(reason),
        }
    }
}

/// Everything eligibility looks at for one row.
#[derive(Debug, Clone, Copy)]
pub struct SyncContext<'a> {
    pub row: &'a RowKey,
    pub series: RowSeries<'a>,
    pub property: &'a Property,
    pub room_type: &'a RoomType,
    /// Present for rate rows only.
    pub rate_plan: Option<&'a RatePlan>,
    pub reference_loading: bool,
    pub dirty: bool,
}

impl<'a> SyncContext<'a> {
    /// Collect the context of `row` from a loaded grid.
    ///
    /// # Errors
    /// [`SyncError::UnknownRow`] when the row is not part of `grid`.
    pub fn from_grid(
        grid: &'a InventoryGrid,
        row: &'a RowKey,
        tracker: &SyncStateTracker,
        reference_loading: bool,
    ) -> Result<Self, SyncError> {
        let unknown = || SyncError::UnknownRow(row.to_string());
        let (room_type, rate_plan) = match row.kind {
            RowKind::Availability => {
                let room = grid.room_type(&row.owner_id).ok_or_else(unknown)?;
                (&room.room_type, None)
            }
            RowKind::Rate => {
                let (room, plan) = grid.rate_plan(&row.owner_id).ok_or_else(unknown)?;
                (&room.room_type, Some(&plan.rate_plan))
            }
        };
        let series = grid.series(row).ok_or_else(unknown)?;
        Ok(Self {
            row,
            series,
            property: &grid.property,
            room_type,
            rate_plan,
            reference_loading,
            dirty: tracker.is_dirty(row),
        })
    }

    fn missing_mapping(&self) -> Option<String> {
        if !has_channel_id(&self.property.channel_id) {
            return Some(format!("property {}", self.property.id));
        }
        if !has_channel_id(&self.room_type.channel_id) {
            return Some(format!("room type {}", self.room_type.id));
        }
        match self.rate_plan {
            Some(plan) if !has_channel_id(&plan.channel_id) => {
                Some(format!("rate plan {}", plan.id))
            }
            _ => None,
        }
    }
}

fn has_channel_id(id: &Option<String>) -> bool {
    id.as_deref().is_some_and(|id| !id.trim().is_empty())
}

/// Evaluate eligibility. When several conditions fail, loading wins over a
/// missing mapping, which wins over an empty row, which wins over a clean
/// row.
pub fn check_eligibility(ctx: &SyncContext<'_>) -> SyncEligibility {
    if ctx.reference_loading {
        return SyncEligibility::Disabled(DisabledReason::ReferenceLoading);
    }
    if let Some(entity) = ctx.missing_mapping() {
        return SyncEligibility::Disabled(DisabledReason::MissingChannelMapping { entity });
    }
    if ctx.series.is_empty() || !ctx.series.has_values() {
        return SyncEligibility::Disabled(DisabledReason::NoValues);
    }
    if !ctx.dirty {
        return SyncEligibility::Disabled(DisabledReason::NoChanges);
    }
    SyncEligibility::Enabled
}
