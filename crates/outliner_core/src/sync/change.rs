//! Dirty-row batching for the persistence/sync collaborator.
//!
//! # Responsibility
//! - Collect entity ids touched by one logical operation.
//! - Emit them to the registered `ChangeObserver` as a single batch.
//!
//! # Invariants
//! - Nested batches coalesce; only the outermost `end` emits.
//! - Every id marked inside a batch is reported exactly once for that batch.
//! - Marks made outside any batch are emitted immediately.

use crate::model::entity_id::EntityId;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Ids dirtied by one logical operation on one outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    pub outline_id: EntityId,
    pub entity_ids: Vec<EntityId>,
}

impl ChangeBatch {
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entity_ids.contains(id)
    }
}

/// Collaborator notified of dirty entities.
///
/// Scheduling, debouncing and the actual persistence belong to the
/// implementor; calls must return without blocking on I/O.
pub trait ChangeObserver: Send + Sync {
    /// Receives one batch of dirtied ids.
    fn mark_as_dirty(&self, batch: &ChangeBatch);

    /// Requests that pending work for `outline_id` is written out.
    fn flush(&self, _outline_id: &EntityId) {}
}

/// Batch bracket state owned by one outline.
pub struct DirtyTracker {
    outline_id: EntityId,
    depth: usize,
    pending: BTreeSet<EntityId>,
    observer: Option<Arc<dyn ChangeObserver>>,
}

impl Debug for DirtyTracker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirtyTracker")
            .field("outline_id", &self.outline_id)
            .field("depth", &self.depth)
            .field("pending", &self.pending)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl DirtyTracker {
    pub fn new(outline_id: EntityId) -> Self {
        Self {
            outline_id,
            depth: 0,
            pending: BTreeSet::new(),
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: Option<Arc<dyn ChangeObserver>>) {
        self.observer = observer;
    }

    pub fn observer(&self) -> Option<&Arc<dyn ChangeObserver>> {
        self.observer.as_ref()
    }

    pub fn is_in_batch(&self) -> bool {
        self.depth > 0
    }

    pub fn pending(&self) -> &BTreeSet<EntityId> {
        &self.pending
    }

    pub fn begin(&mut self) {
        self.depth += 1;
    }

    pub fn mark(&mut self, id: EntityId) {
        self.pending.insert(id);
        if self.depth == 0 {
            self.emit();
        }
    }

    pub fn end(&mut self) {
        if self.depth == 0 {
            warn!(
                "event=batch_end module=sync status=error error_code=unbalanced_batch outline={}",
                self.outline_id
            );
            return;
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.emit();
        }
    }

    /// Closes every open bracket and emits what is pending.
    pub fn close_all(&mut self) {
        if self.depth > 0 {
            debug!(
                "event=batch_close_all module=sync status=ok outline={} open_depth={}",
                self.outline_id, self.depth
            );
        }
        self.depth = 0;
        self.emit();
    }

    /// Asks the observer to write out pending work.
    pub fn flush(&self) {
        if let Some(observer) = &self.observer {
            observer.flush(&self.outline_id);
        }
    }

    fn emit(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let entity_ids = std::mem::take(&mut self.pending)
            .into_iter()
            .collect::<Vec<_>>();
        debug!(
            "event=batch_emit module=sync status=ok outline={} count={}",
            self.outline_id,
            entity_ids.len()
        );
        if let Some(observer) = &self.observer {
            observer.mark_as_dirty(&ChangeBatch {
                outline_id: self.outline_id.clone(),
                entity_ids,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeBatch, ChangeObserver, DirtyTracker};
    use crate::model::entity_id::EntityId;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingObserver {
        batches: Mutex<Vec<ChangeBatch>>,
    }

    impl ChangeObserver for RecordingObserver {
        fn mark_as_dirty(&self, batch: &ChangeBatch) {
            self.batches.lock().unwrap().push(batch.clone());
        }
    }

    fn outline_id() -> EntityId {
        EntityId::outline(1, "f", "o")
    }

    #[test]
    fn nested_batches_emit_once() {
        let observer = Arc::new(RecordingObserver::default());
        let mut tracker = DirtyTracker::new(outline_id());
        tracker.set_observer(Some(observer.clone()));

        tracker.begin();
        tracker.mark(EntityId::row(1, "o", "a"));
        tracker.begin();
        tracker.mark(EntityId::row(1, "o", "b"));
        tracker.mark(EntityId::row(1, "o", "a"));
        tracker.end();
        assert!(observer.batches.lock().unwrap().is_empty());
        tracker.end();

        let batches = observer.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].entity_ids.len(), 2);
    }

    #[test]
    fn mark_outside_batch_emits_immediately() {
        let observer = Arc::new(RecordingObserver::default());
        let mut tracker = DirtyTracker::new(outline_id());
        tracker.set_observer(Some(observer.clone()));

        tracker.mark(EntityId::row(1, "o", "a"));
        assert_eq!(observer.batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn unbalanced_end_is_ignored() {
        let mut tracker = DirtyTracker::new(outline_id());
        tracker.end();
        assert!(!tracker.is_in_batch());
    }

    #[test]
    fn close_all_emits_pending_marks() {
        let observer = Arc::new(RecordingObserver::default());
        let mut tracker = DirtyTracker::new(outline_id());
        tracker.set_observer(Some(observer.clone()));

        tracker.begin();
        tracker.begin();
        tracker.mark(EntityId::row(1, "o", "a"));
        tracker.close_all();

        assert!(!tracker.is_in_batch());
        assert_eq!(observer.batches.lock().unwrap().len(), 1);
    }
}
