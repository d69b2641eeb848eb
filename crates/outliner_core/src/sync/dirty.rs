//! In-process change observer that accumulates dirty ids per outline.
//!
//! # Responsibility
//! - Receive `ChangeBatch` notifications from any number of outlines.
//! - Let a persistence driver take the pending ids and see flush requests.
//!
//! # Invariants
//! - Ids are deduplicated per outline until taken.
//! - An outline is listed at most once among pending flush requests; the
//!   list is emptied by `take_flush_requests`.
//! - A poisoned lock is recovered, never propagated as a panic.

use crate::model::entity_id::EntityId;
use crate::sync::change::{ChangeBatch, ChangeObserver};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct RegistryState {
    dirty: BTreeMap<EntityId, BTreeSet<EntityId>>,
    flush_requests: Vec<EntityId>,
    batch_count: usize,
}

/// Thread-safe dirty-id registry keyed by outline id.
#[derive(Debug, Default)]
pub struct DirtyRegistry {
    state: Mutex<RegistryState>,
}

impl DirtyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns whether the outline has pending dirty ids.
    pub fn is_dirty(&self, outline_id: &EntityId) -> bool {
        self.lock()
            .dirty
            .get(outline_id)
            .is_some_and(|ids| !ids.is_empty())
    }

    /// Pending ids for one outline, without clearing them.
    pub fn pending(&self, outline_id: &EntityId) -> Vec<EntityId> {
        self.lock()
            .dirty
            .get(outline_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes and returns the pending ids for one outline.
    pub fn take(&self, outline_id: &EntityId) -> Vec<EntityId> {
        self.lock()
            .dirty
            .remove(outline_id)
            .map(|ids| ids.into_iter().collect())
            .unwrap_or_default()
    }

    /// Outlines whose flush was requested, in request order.
    pub fn flush_requests(&self) -> Vec<EntityId> {
        self.lock().flush_requests.clone()
    }

    /// Removes and returns the pending flush requests.
    pub fn take_flush_requests(&self) -> Vec<EntityId> {
        std::mem::take(&mut self.lock().flush_requests)
    }

    /// Number of batches received since creation.
    pub fn batch_count(&self) -> usize {
        self.lock().batch_count
    }
}

impl ChangeObserver for DirtyRegistry {
    fn mark_as_dirty(&self, batch: &ChangeBatch) {
        let mut state = self.lock();
        state.batch_count += 1;
        state
            .dirty
            .entry(batch.outline_id.clone())
            .or_default()
            .extend(batch.entity_ids.iter().cloned());
    }

    fn flush(&self, outline_id: &EntityId) {
        debug!(
            "event=flush_requested module=sync status=ok outline={}",
            outline_id
        );
        let mut state = self.lock();
        if !state.flush_requests.contains(outline_id) {
            state.flush_requests.push(outline_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DirtyRegistry;
    use crate::model::entity_id::EntityId;
    use crate::sync::change::{ChangeBatch, ChangeObserver};

    #[test]
    fn batches_accumulate_until_taken() {
        let registry = DirtyRegistry::new();
        let outline = EntityId::outline(1, "f", "o");
        let row_a = EntityId::row(1, "o", "a");
        let row_b = EntityId::row(1, "o", "b");

        registry.mark_as_dirty(&ChangeBatch {
            outline_id: outline.clone(),
            entity_ids: vec![row_a.clone()],
        });
        registry.mark_as_dirty(&ChangeBatch {
            outline_id: outline.clone(),
            entity_ids: vec![row_a.clone(), row_b.clone()],
        });

        assert!(registry.is_dirty(&outline));
        assert_eq!(registry.batch_count(), 2);
        assert_eq!(registry.take(&outline), vec![row_a, row_b]);
        assert!(!registry.is_dirty(&outline));
    }

    #[test]
    fn flush_requests_are_recorded_once_until_taken() {
        let registry = DirtyRegistry::new();
        let first = EntityId::outline(1, "f", "one");
        let second = EntityId::outline(1, "f", "two");
        registry.flush(&first);
        registry.flush(&second);
        registry.flush(&first);
        assert_eq!(registry.flush_requests(), vec![first.clone(), second.clone()]);

        assert_eq!(registry.take_flush_requests(), vec![first.clone(), second]);
        assert!(registry.flush_requests().is_empty());
        assert!(registry.take_flush_requests().is_empty());

        registry.flush(&first);
        assert_eq!(registry.flush_requests(), vec![first]);
    }
}
