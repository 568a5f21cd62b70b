//! Edit reconciliation: turns pending ledger edits into store writes.
//!
//! A commit is planned against the loaded grid (all cells validated before
//! anything is sent), split into four groups dispatched one after another,
//! and summarised per operation in a [`CommitReport`].

mod batch;
mod reconciler;

pub use batch::BatchQueue;
pub use reconciler::{plan_commit, Reconciler, DEFAULT_BATCH_SIZE};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{CellKey, RecordId, RowKey};
use crate::storage::StoreOperation;

/// Dispatch group of an operation. Groups run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitGroup {
    AvailabilityUpdate,
    AvailabilityCreate,
    RateUpdate,
    RateCreate,
}

impl CommitGroup {
    pub const ORDER: [CommitGroup; 4] = [
        CommitGroup::AvailabilityUpdate,
        CommitGroup::AvailabilityCreate,
        CommitGroup::RateUpdate,
        CommitGroup::RateCreate,
    ];

    pub fn of(operation: &StoreOperation) -> Self {
        match operation {
            StoreOperation::UpdateAvailability { .. } => CommitGroup::AvailabilityUpdate,
            StoreOperation::CreateAvailability(_) => CommitGroup::AvailabilityCreate,
            StoreOperation::UpdateRate { .. } => CommitGroup::RateUpdate,
            StoreOperation::CreateRate(_) => CommitGroup::RateCreate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommitGroup::AvailabilityUpdate => "availability-update",
            CommitGroup::AvailabilityCreate => "availability-create",
            CommitGroup::RateUpdate => "rate-update",
            CommitGroup::RateCreate => "rate-create",
        }
    }
}

/// One store write derived from one ledger edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedOperation {
    pub key: CellKey,
    pub operation: StoreOperation,
}

/// Validated, grouped writes for one commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitPlan {
    availability_updates: Vec<PlannedOperation>,
    availability_creates: Vec<PlannedOperation>,
    rate_updates: Vec<PlannedOperation>,
    rate_creates: Vec<PlannedOperation>,
}

impl CommitPlan {
    pub fn push(&mut self, planned: PlannedOperation) {
        let group = CommitGroup::of(&planned.operation);
        self.group_mut(group).push(planned);
    }

    fn group_mut(&mut self, group: CommitGroup) -> &mut Vec<PlannedOperation> {
        match group {
            CommitGroup::AvailabilityUpdate => &mut self.availability_updates,
            CommitGroup::AvailabilityCreate => &mut self.availability_creates,
            CommitGroup::RateUpdate => &mut self.rate_updates,
            CommitGroup::RateCreate => &mut self.rate_creates,
        }
    }

    pub fn group(&self, group: CommitGroup) -> &[PlannedOperation] {
        match group {
            CommitGroup::AvailabilityUpdate => &self.availability_updates,
            CommitGroup::AvailabilityCreate => &self.availability_creates,
            CommitGroup::RateUpdate => &self.rate_updates,
            CommitGroup::RateCreate => &self.rate_creates,
        }
    }

    /// Groups in dispatch order, each with its operations in ledger order.
    pub fn into_groups(self) -> [(CommitGroup, Vec<PlannedOperation>); 4] {
        [
            (CommitGroup::AvailabilityUpdate, self.availability_updates),
            (CommitGroup::AvailabilityCreate, self.availability_creates),
            (CommitGroup::RateUpdate, self.rate_updates),
            (CommitGroup::RateCreate, self.rate_creates),
        ]
    }

    pub fn len(&self) -> usize {
        CommitGroup::ORDER.iter().map(|g| self.group(*g).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one dispatched write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationOutcome {
    Saved { record_id: RecordId },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub key: CellKey,
    pub group: CommitGroup,
    pub operation: StoreOperation,
    pub outcome: OperationOutcome,
}

impl OperationResult {
    pub fn is_saved(&self) -> bool {
        matches!(self.outcome, OperationOutcome::Saved { .. })
    }
}

/// Per-operation log of one commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitReport {
    pub commit_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<OperationResult>,
}

impl CommitReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_saved()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    /// True when every operation was saved. An empty commit is a success.
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationResult> {
        self.results.iter().filter(|r| !r.is_saved())
    }

    /// Distinct rows with at least one saved write, in report order.
    pub fn saved_rows(&self) -> Vec<RowKey> {
        let mut rows: Vec<RowKey> = Vec::new();
        for result in self.results.iter().filter(|r| r.is_saved()) {
            let row = result.key.row();
            if !rows.contains(&row) {
                rows.push(row);
            }
        }
        rows
    }
}
