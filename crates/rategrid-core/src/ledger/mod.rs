//! Edit ledger: pending, unsaved cell edits.
//!
//! One entry per (kind, owner, date); a later edit of the same cell replaces
//! the earlier value but keeps its position, so iteration order is the order
//! in which cells were first touched. The ledger never talks to a store.

pub mod validation;

pub use validation::{InputStage, ValidationPolicy};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{CellKey, CellValue, RowKey, RowKind};

/// A pending change to one grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellEdit {
    pub key: CellKey,
    pub new_value: CellValue,
    /// Value the cell held before it was first edited.
    pub original_value: CellValue,
}

/// Owned copy of the ledger taken when a commit starts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSnapshot {
    edits: Vec<CellEdit>,
}

impl LedgerSnapshot {
    pub fn edits(&self) -> &[CellEdit] {
        &self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Distinct rows touched, in ledger order.
    pub fn rows(&self) -> Vec<RowKey> {
        let mut rows: Vec<RowKey> = Vec::new();
        for edit in &self.edits {
            let row = edit.key.row();
            if !rows.contains(&row) {
                rows.push(row);
            }
        }
        rows
    }
}

/// In-memory map of pending cell edits.
#[derive(Debug, Clone, Default)]
pub struct EditLedger {
    edits: IndexMap<CellKey, CellEdit>,
}

impl EditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record typed input for a cell.
    ///
    /// Availability input that is malformed or outside 1..=12 is rejected
    /// and the ledger is left untouched; empty input records an explicit
    /// clear (0). Rate input never fails: unusable text is stored as 0.
    ///
    /// # Errors
    /// Returns the validation failure for rejected availability input, or
    /// [`ValidationError::InvalidValue`] if `original` is of the wrong kind.
    pub fn set_edit(
        &mut self,
        key: CellKey,
        raw: &str,
        original: CellValue,
    ) -> Result<&CellEdit, ValidationError> {
        self.apply(key, raw, original, InputStage::Typing)
    }

    /// Record input for a cell that lost focus: availability below 1 is
    /// cleared to 0 and above 12 clamped to 12.
    ///
    /// # Errors
    /// Non-integer availability input is still rejected.
    pub fn finalize_edit(
        &mut self,
        key: CellKey,
        raw: &str,
        original: CellValue,
    ) -> Result<&CellEdit, ValidationError> {
        self.apply(key, raw, original, InputStage::Finalize)
    }

    fn apply(
        &mut self,
        key: CellKey,
        raw: &str,
        original: CellValue,
        stage: InputStage,
    ) -> Result<&CellEdit, ValidationError> {
        if original.kind() != key.kind {
            return Err(ValidationError::InvalidValue {
                field: key.to_string(),
                message: format!("original value is a {} value", original.kind()),
            });
        }
        let new_value = validation::parse_cell_input(key.kind, stage, raw)?;

        let entry = self.edits.entry(key.clone()).or_insert(CellEdit {
            key,
            new_value,
            original_value: original,
        });
        entry.new_value = new_value;
        Ok(entry)
    }

    /// True iff any pending edit belongs to the (kind, owner) row.
    pub fn has_pending_edits(&self, kind: RowKind, owner_id: &str) -> bool {
        self.edits
            .keys()
            .any(|key| key.kind == kind && key.owner_id == owner_id)
    }

    pub fn get(&self, key: &CellKey) -> Option<&CellEdit> {
        self.edits.get(key)
    }

    /// Drop one pending edit.
    pub fn discard(&mut self, key: &CellKey) -> Option<CellEdit> {
        self.edits.shift_remove(key)
    }

    /// Edits in ledger order.
    pub fn iter(&self) -> impl Iterator<Item = &CellEdit> {
        self.edits.values()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Empty the ledger.
    pub fn clear(&mut self) {
        self.edits.clear();
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            edits: self.edits.values().cloned().collect(),
        }
    }

    /// Remove the entries a finished commit covered. An entry edited again
    /// after the snapshot was taken keeps its newer value and stays pending.
    ///
    /// Returns the number of entries removed.
    pub fn remove_committed(&mut self, snapshot: &LedgerSnapshot) -> usize {
        let mut removed = 0;
        for committed in snapshot.edits() {
            let unchanged = self
                .edits
                .get(&committed.key)
                .is_some_and(|current| current.new_value == committed.new_value);
            if unchanged {
                self.edits.shift_remove(&committed.key);
                removed += 1;
            }
        }
        removed
    }
}
