//! Rows saved since their last successful channel sync.

use std::collections::HashSet;

use crate::model::{DirtyRowKey, RowKey, RowKind};

/// Session-scoped set of dirty rows. Never persisted: a restart forgets
/// which rows still need pushing.
#[derive(Debug, Clone, Default)]
pub struct SyncStateTracker {
    dirty: HashSet<DirtyRowKey>,
}

impl SyncStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn mark_dirty(&mut self, row: RowKey) {
        self.dirty.insert(row);
    }

    /// Idempotent. Returns whether the row was dirty.
    pub fn clear_dirty(&mut self, row: &RowKey) -> bool {
        self.dirty.remove(row)
    }

    pub fn is_dirty(&self, row: &RowKey) -> bool {
        self.dirty.contains(row)
    }

    pub fn is_dirty_kind(&self, kind: RowKind, owner_id: &str) -> bool {
        self.dirty
            .iter()
            .any(|row| row.kind == kind && row.owner_id == owner_id)
    }

    /// Dirty rows, sorted.
    pub fn dirty_rows(&self) -> Vec<RowKey> {
        let mut rows: Vec<RowKey> = self.dirty.iter().cloned().collect();
        rows.sort();
        rows
    }

    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_and_clear_are_idempotent() {
        let mut tracker = SyncStateTracker::new();
        let row = RowKey::rate("P1");

        tracker.mark_dirty(row.clone());
        tracker.mark_dirty(row.clone());
        assert_eq!(tracker.len(), 1);
        assert!(tracker.is_dirty(&row));

        assert!(tracker.clear_dirty(&row));
        assert!(!tracker.clear_dirty(&row));
        assert!(tracker.is_empty());
    }

    #[test]
    fn kinds_are_tracked_separately() {
        let mut tracker = SyncStateTracker::new();
        tracker.mark_dirty(RowKey::availability("X"));
        assert!(tracker.is_dirty_kind(RowKind::Availability, "X"));
        assert!(!tracker.is_dirty_kind(RowKind::Rate, "X"));
    }

    #[test]
    fn dirty_rows_are_sorted() {
        let mut tracker = SyncStateTracker::new();
        tracker.mark_dirty(RowKey::rate("P2"));
        tracker.mark_dirty(RowKey::availability("R1"));
        tracker.mark_dirty(RowKey::rate("P1"));
        let rows = tracker.dirty_rows();
        let mut sorted = rows.clone();
        sorted.sort();
        assert_eq!(rows, sorted);
        assert_eq!(rows.len(), 3);
    }
}
