//! One operator's editing session over a loaded grid.
//!
//! The session owns the grid, the edit ledger and the sync-state tracker and
//! hands them to the reconciler and the row syncer explicitly. A commit is
//! two-phase: [`EditSession::begin_commit`] snapshots and plans, the caller
//! dispatches, and [`EditSession::finish_commit`] settles. Edits made in
//! between stay in the ledger.

use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{CommitError, GridError, SyncError, ValidationError};
use crate::grid::{GridAssembler, GridFilter, InventoryGrid};
use crate::ledger::{CellEdit, EditLedger, LedgerSnapshot};
use crate::model::{CellKey, CellValue, RowKey, RowKind};
use crate::reconcile::{plan_commit, CommitPlan, CommitReport, Reconciler};
use crate::storage::RecordStore;
use crate::sync::{
    row_eligibility, ChannelManager, RowSyncer, SyncEligibility, SyncOutcome, SyncStateTracker,
};

/// Snapshot and plan of a commit that has been started but not settled.
#[derive(Debug)]
pub struct PendingCommit {
    pub snapshot: LedgerSnapshot,
    pub plan: CommitPlan,
}

pub struct EditSession {
    grid: InventoryGrid,
    filter: GridFilter,
    ledger: EditLedger,
    tracker: SyncStateTracker,
    loading: HashSet<RowKey>,
    commit_in_flight: bool,
}

impl EditSession {
    pub fn new(grid: InventoryGrid) -> Self {
        Self {
            grid,
            filter: GridFilter::all(),
            ledger: EditLedger::new(),
            tracker: SyncStateTracker::new(),
            loading: HashSet::new(),
            commit_in_flight: false,
        }
    }

    /// Assemble a grid and start a session on it.
    pub async fn open<S: RecordStore + ?Sized>(
        assembler: &GridAssembler<'_, S>,
        property_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        filter: GridFilter,
    ) -> Result<Self, GridError> {
        let grid = assembler.assemble(property_id, start, end, &filter).await?;
        let mut session = Self::new(grid);
        session.filter = filter;
        Ok(session)
    }

    /// Reload the grid from the store. Pending edits and dirty rows are kept.
    pub async fn reload<S: RecordStore + ?Sized>(
        &mut self,
        assembler: &GridAssembler<'_, S>,
    ) -> Result<(), GridError> {
        let grid = assembler
            .assemble(
                &self.grid.property.id,
                self.grid.range.start,
                self.grid.range.end,
                &self.filter,
            )
            .await?;
        self.grid = grid;
        Ok(())
    }

    pub fn grid(&self) -> &InventoryGrid {
        &self.grid
    }

    pub fn ledger(&self) -> &EditLedger {
        &self.ledger
    }

    pub fn tracker(&self) -> &SyncStateTracker {
        &self.tracker
    }

    fn original_value(&self, key: &CellKey) -> CellValue {
        self.grid
            .value(key)
            .unwrap_or_else(|| CellValue::zero(key.kind))
    }

    /// Typed input for a cell.
    pub fn set_cell(&mut self, key: CellKey, raw: &str) -> Result<&CellEdit, ValidationError> {
        let original = self.original_value(&key);
        self.ledger.set_edit(key, raw, original)
    }

    /// Input for a cell that lost focus.
    pub fn finalize_cell(&mut self, key: CellKey, raw: &str) -> Result<&CellEdit, ValidationError> {
        let original = self.original_value(&key);
        self.ledger.finalize_edit(key, raw, original)
    }

    pub fn discard(&mut self, key: &CellKey) -> bool {
        self.ledger.discard(key).is_some()
    }

    pub fn has_pending_edits(&self, kind: RowKind, owner_id: &str) -> bool {
        self.ledger.has_pending_edits(kind, owner_id)
    }

    pub fn commit_in_flight(&self) -> bool {
        self.commit_in_flight
    }

    /// Snapshot the ledger and plan the commit.
    ///
    /// # Errors
    /// [`CommitError::CommitInFlight`] while another commit is unsettled,
    /// [`CommitError::Invalid`] when any edit fails validation.
    pub fn begin_commit(&mut self) -> Result<PendingCommit, CommitError> {
        if self.commit_in_flight {
            return Err(CommitError::CommitInFlight);
        }
        let snapshot = self.ledger.snapshot();
        let plan = plan_commit(&snapshot, &self.grid)?;
        self.commit_in_flight = true;
        debug!(edits = snapshot.len(), operations = plan.len(), "commit begun");
        Ok(PendingCommit { snapshot, plan })
    }

    /// Settle a commit started with [`EditSession::begin_commit`].
    pub fn finish_commit<S: RecordStore + ?Sized>(
        &mut self,
        reconciler: &Reconciler<'_, S>,
        snapshot: &LedgerSnapshot,
        report: CommitReport,
    ) -> Result<CommitReport, CommitError> {
        self.commit_in_flight = false;
        reconciler.settle(
            snapshot,
            report,
            &mut self.ledger,
            &mut self.grid,
            &mut self.tracker,
        )
    }

    /// Give up on a started commit without settling it.
    pub fn abort_commit(&mut self) {
        self.commit_in_flight = false;
    }

    /// Begin, dispatch and settle in one go.
    pub async fn commit<S: RecordStore + ?Sized>(
        &mut self,
        reconciler: &Reconciler<'_, S>,
    ) -> Result<CommitReport, CommitError> {
        let PendingCommit { snapshot, plan } = self.begin_commit()?;
        let report = reconciler.execute(plan).await;
        self.finish_commit(reconciler, &snapshot, report)
    }

    /// Mark reference data of `row` as being fetched; sync is disabled for
    /// the row until [`EditSession::finish_reference_load`].
    pub fn begin_reference_load(&mut self, row: RowKey) {
        self.loading.insert(row);
    }

    pub fn finish_reference_load(&mut self, row: &RowKey) {
        self.loading.remove(row);
    }

    pub fn eligibility(&self, row: &RowKey) -> Result<SyncEligibility, SyncError> {
        row_eligibility(&self.grid, row, &self.tracker, self.loading.contains(row))
    }

    pub async fn sync_row<C: ChannelManager + ?Sized>(
        &mut self,
        syncer: &RowSyncer<'_, C>,
        row: &RowKey,
    ) -> Result<SyncOutcome, SyncError> {
        let loading = self.loading.contains(row);
        syncer
            .sync_row(&self.grid, row, &mut self.tracker, loading)
            .await
    }
}
