//! Commit planning, dispatch and settlement.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    BatchQueue, CommitPlan, CommitReport, OperationOutcome, OperationResult, PlannedOperation,
};
use crate::error::{CellIssue, CommitError, ValidationError};
use crate::grid::InventoryGrid;
use crate::ledger::validation::check_availability_value;
use crate::ledger::{CellEdit, EditLedger, LedgerSnapshot};
use crate::model::{is_persisted, CellValue, NewAvailability, NewRate, RowKind};
use crate::storage::{RecordStore, StoreOperation};
use crate::sync::SyncStateTracker;

/// Store operations issued concurrently per batch unless configured.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Persists ledger edits through a [`RecordStore`].
///
/// There is no rollback: when some operations fail, the successful ones stay
/// in the store and the ledger is left as it was so the operator can retry.
pub struct Reconciler<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    batch_size: usize,
}

impl<'a, S: RecordStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Dispatch a plan: groups strictly one after another, each group in
    /// batches of at most `batch_size` concurrent operations.
    pub async fn execute(&self, plan: CommitPlan) -> CommitReport {
        let commit_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = plan.len();
        let mut results = Vec::with_capacity(total);

        if total == 0 {
            debug!(%commit_id, "nothing to commit");
        } else {
            info!(%commit_id, operations = total, batch_size = self.batch_size, "commit started");
        }

        for (group, operations) in plan.into_groups() {
            if operations.is_empty() {
                continue;
            }
            let mut queue = BatchQueue::new(self.batch_size);
            queue.extend(operations);
            debug!(
                %commit_id,
                group = group.as_str(),
                operations = queue.len(),
                batches = queue.batch_count(),
                "dispatching group"
            );

            let store = self.store;
            let group_results = queue
                .run(move |planned: PlannedOperation| async move {
                    let outcome = match planned.operation.apply(store).await {
                        Ok(record_id) => OperationOutcome::Saved { record_id },
                        Err(e) => {
                            warn!(
                                %commit_id,
                                kind = %planned.key.kind,
                                owner = %planned.key.owner_id,
                                date = %planned.key.date,
                                error = %e,
                                "store write failed"
                            );
                            OperationOutcome::Failed {
                                reason: e.to_string(),
                            }
                        }
                    };
                    OperationResult {
                        key: planned.key,
                        group,
                        operation: planned.operation,
                        outcome,
                    }
                })
                .await;
            results.extend(group_results);
        }

        let report = CommitReport {
            commit_id,
            started_at,
            finished_at: Utc::now(),
            results,
        };
        if total > 0 {
            info!(
                %commit_id,
                saved = report.success_count(),
                failed = report.failure_count(),
                "commit finished"
            );
        }
        report
    }

    /// Apply a finished commit to the session state.
    ///
    /// Saved writes are folded into `grid` and their rows invalidated in the
    /// store either way. On full success every row of `snapshot` is marked
    /// dirty and the committed edits leave the ledger; otherwise the ledger
    /// and the tracker are untouched.
    ///
    /// # Errors
    /// [`CommitError::Partial`] when at least one operation failed.
    pub fn settle(
        &self,
        snapshot: &LedgerSnapshot,
        report: CommitReport,
        ledger: &mut EditLedger,
        grid: &mut InventoryGrid,
        tracker: &mut SyncStateTracker,
    ) -> Result<CommitReport, CommitError> {
        for result in &report.results {
            if let OperationOutcome::Saved { record_id } = result.outcome {
                grid.apply_saved(&result.key, record_id, result.operation.value());
            }
        }
        for row in report.saved_rows() {
            self.store.invalidate(&row);
        }

        if !report.is_success() {
            warn!(
                commit_id = %report.commit_id,
                failed = report.failure_count(),
                saved = report.success_count(),
                "commit partially failed, pending edits kept"
            );
            return Err(CommitError::Partial {
                report: Box::new(report),
            });
        }

        for row in snapshot.rows() {
            debug!(commit_id = %report.commit_id, kind = %row.kind, owner = %row.owner_id, "row marked dirty");
            tracker.mark_dirty(row);
        }
        let removed = ledger.remove_committed(snapshot);
        if removed < snapshot.len() {
            debug!(
                commit_id = %report.commit_id,
                kept = snapshot.len() - removed,
                "edits changed during commit stay pending"
            );
        }
        Ok(report)
    }

    /// Plan, execute and settle the current ledger in one call.
    ///
    /// # Errors
    /// [`CommitError::Invalid`] before anything is sent, or
    /// [`CommitError::Partial`] after dispatch.
    pub async fn commit(
        &self,
        ledger: &mut EditLedger,
        grid: &mut InventoryGrid,
        tracker: &mut SyncStateTracker,
    ) -> Result<CommitReport, CommitError> {
        let snapshot = ledger.snapshot();
        let plan = plan_commit(&snapshot, grid)?;
        let report = self.execute(plan).await;
        self.settle(&snapshot, report, ledger, grid, tracker)
    }
}

/// Validate every edit of `snapshot` against `grid` and route it to a
/// create (no backing record) or an update.
///
/// # Errors
/// [`CommitError::Invalid`] listing every rejected cell. Nothing has been
/// sent to the store at that point.
pub fn plan_commit(
    snapshot: &LedgerSnapshot,
    grid: &InventoryGrid,
) -> Result<CommitPlan, CommitError> {
    let mut plan = CommitPlan::default();
    let mut issues = Vec::new();
    for edit in snapshot.edits() {
        match plan_edit(edit, grid) {
            Ok(planned) => plan.push(planned),
            Err(error) => issues.push(CellIssue {
                key: edit.key.clone(),
                error,
            }),
        }
    }
    if !issues.is_empty() {
        return Err(CommitError::Invalid { issues });
    }
    Ok(plan)
}

fn plan_edit(edit: &CellEdit, grid: &InventoryGrid) -> Result<PlannedOperation, ValidationError> {
    let key = &edit.key;
    let record_id = grid
        .record_id(key)
        .ok_or_else(|| ValidationError::UnknownCell { key: key.clone() })?;

    let operation = match (key.kind, edit.new_value) {
        (RowKind::Availability, CellValue::Units(units)) => {
            let value = check_availability_value(i64::from(units))?;
            if is_persisted(record_id) {
                StoreOperation::UpdateAvailability { record_id, value }
            } else {
                StoreOperation::CreateAvailability(NewAvailability {
                    room_type_id: key.owner_id.clone(),
                    date: key.date,
                    value,
                })
            }
        }
        (RowKind::Rate, CellValue::Price(value)) => {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: key.to_string(),
                    message: format!("{value} is not a valid rate"),
                });
            }
            if is_persisted(record_id) {
                StoreOperation::UpdateRate { record_id, value }
            } else {
                StoreOperation::CreateRate(NewRate {
                    rate_plan_id: key.owner_id.clone(),
                    date: key.date,
                    value,
                })
            }
        }
        (kind, value) => {
            return Err(ValidationError::InvalidValue {
                field: key.to_string(),
                message: format!("{value} is not a {kind} value"),
            })
        }
    };

    Ok(PlannedOperation {
        key: key.clone(),
        operation,
    })
}
