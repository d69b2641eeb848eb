//! Row tree primitives of the outline aggregate.
//!
//! # Responsibility
//! - Membership and ancestry queries over `row_order` and parent ids.
//! - Primitive mutations that keep container order, `keyed_rows` and images
//!   in step, each returning the `RowEdit` it applied.
//! - Exact reversal of recorded edits.
//!
//! # Invariants
//! - Primitives never open batches or bump the generation; `transact` and
//!   the public wrappers do.
//! - Every primitive marks the touched rows and containers dirty.

use super::{Outline, OutlineError, OutlineResult};
use crate::model::edit::{RowEdit, RowGroup};
use crate::model::image::Image;
use crate::model::row::{Container, Row, RowId};
use log::error;
use std::collections::{HashMap, HashSet};

/// Where a moved row lands in its target container, resolved after the row
/// was detached.
#[derive(Debug, Clone)]
pub(crate) enum Placement {
    Index(usize),
    Before(RowId),
    After(RowId),
    End,
}

fn violation(message: impl Into<String>) -> OutlineError {
    OutlineError::StructuralInvariantViolation(message.into())
}

impl Outline {
    pub fn contains_row(&self, container: &Container, id: &str) -> bool {
        self.rows_in(container)
            .is_ok_and(|order| order.iter().any(|child| child == id))
    }

    pub fn first_index_of_row(&self, container: &Container, id: &str) -> Option<usize> {
        self.rows_in(container)
            .ok()?
            .iter()
            .position(|child| child == id)
    }

    /// Parent ids of `id`, nearest first.
    pub fn ancestors(&self, id: &str) -> Vec<&str> {
        let mut ancestors = Vec::new();
        let mut current = self.keyed_rows.get(id);
        while let Some(row) = current {
            match row.parent() {
                Container::Row(parent_id) => {
                    if ancestors.len() > self.keyed_rows.len() {
                        error!(
                            "event=ancestor_walk module=outline status=error error_code=parent_cycle row={}",
                            id
                        );
                        break;
                    }
                    ancestors.push(parent_id.as_str());
                    current = self.keyed_rows.get(parent_id);
                }
                Container::Root => break,
            }
        }
        ancestors
    }

    /// Number of ancestor rows; root-level rows have level 0.
    pub fn level(&self, id: &str) -> usize {
        self.ancestors(id).len()
    }

    /// Whether any ancestor is complete. Derived on every read.
    pub fn is_ancestor_complete(&self, id: &str) -> bool {
        self.ancestors(id)
            .into_iter()
            .filter_map(|ancestor| self.keyed_rows.get(ancestor))
            .any(Row::is_complete)
    }

    /// Whether `id` sits somewhere below `of`.
    pub fn is_descendant(&self, id: &str, of: &str) -> bool {
        self.ancestors(id).contains(&of)
    }

    /// Returns `id` or its first ancestor that shares a parent with `target`
    /// or directly contains it.
    pub fn ancestor_sibling(&self, id: &str, target: &str) -> Option<&str> {
        let mut current = self.keyed_rows.get(id)?;
        loop {
            if self.contains_row(current.parent(), target)
                || current.row_order().iter().any(|child| child == target)
            {
                return Some(current.id());
            }
            match current.parent() {
                Container::Row(parent_id) => current = self.keyed_rows.get(parent_id)?,
                Container::Root => return None,
            }
        }
    }

    pub fn has_same_parent(&self, left: &str, right: &str) -> bool {
        match (self.keyed_rows.get(left), self.keyed_rows.get(right)) {
            (Some(left), Some(right)) => left.parent() == right.parent(),
            _ => false,
        }
    }

    /// Descendant ids of `id` in pre-order, excluding `id`.
    pub fn descendants(&self, id: &str) -> Vec<RowId> {
        let Some(row) = self.keyed_rows.get(id) else {
            return Vec::new();
        };
        self.pre_order(row.row_order())
            .into_iter()
            .cloned()
            .collect()
    }

    /// Every row id in pre-order, ignoring expansion and filter.
    pub(crate) fn rows_in_tree_order(&self) -> Vec<&RowId> {
        self.pre_order(&self.root_order)
    }

    fn pre_order<'a>(&'a self, order: &'a [RowId]) -> Vec<&'a RowId> {
        let mut ids = Vec::new();
        let mut stack = order.iter().rev().collect::<Vec<_>>();
        while let Some(id) = stack.pop() {
            let Some(row) = self.keyed_rows.get(id) else {
                continue;
            };
            ids.push(id);
            stack.extend(row.row_order().iter().rev());
        }
        ids
    }

    /// Sorts a selection into display order and drops duplicates.
    pub(crate) fn display_order(&self, ids: &[RowId]) -> OutlineResult<Vec<RowId>> {
        let positions = self
            .rows_in_tree_order()
            .into_iter()
            .enumerate()
            .map(|(position, id)| (id.as_str(), position))
            .collect::<HashMap<_, _>>();

        let mut ordered = ids
            .iter()
            .map(|id| {
                positions
                    .get(id.as_str())
                    .map(|position| (*position, id.clone()))
                    .ok_or_else(|| OutlineError::RowNotFound(id.clone()))
            })
            .collect::<OutlineResult<Vec<_>>>()?;
        ordered.sort();
        ordered.dedup();
        Ok(ordered.into_iter().map(|(_, id)| id).collect())
    }

    /// Display-ordered selection without rows whose ancestor is selected.
    pub(crate) fn top_level_selection(&self, ids: &[RowId]) -> OutlineResult<Vec<RowId>> {
        let ordered = self.display_order(ids)?;
        let selected = ordered.iter().map(String::as_str).collect::<HashSet<_>>();
        Ok(ordered
            .iter()
            .filter(|id| {
                !self
                    .ancestors(id)
                    .iter()
                    .any(|ancestor| selected.contains(ancestor))
            })
            .cloned()
            .collect())
    }

    /// Checks that reachable rows and keyed rows are the same set and that
    /// parent back-references match.
    pub fn verify_integrity(&self) -> OutlineResult<()> {
        let mut seen = HashSet::new();
        let mut stack = self
            .root_order
            .iter()
            .rev()
            .map(|id| (id, Container::Root))
            .collect::<Vec<_>>();

        while let Some((id, container)) = stack.pop() {
            let row = self
                .keyed_rows
                .get(id)
                .ok_or_else(|| violation(format!("row `{id}` is listed but not keyed")))?;
            if !seen.insert(id.as_str()) {
                return Err(violation(format!("row `{id}` is listed twice")));
            }
            if row.parent() != &container {
                return Err(violation(format!("row `{id}` has a stale parent")));
            }
            stack.extend(
                row.row_order()
                    .iter()
                    .rev()
                    .map(|child| (child, row.as_container())),
            );
        }

        if seen.len() != self.keyed_rows.len() {
            return Err(violation(format!(
                "{} keyed rows are unreachable",
                self.keyed_rows.len() - seen.len()
            )));
        }
        if let Some(orphan) = self.images.keys().find(|id| !seen.contains(id.as_str())) {
            return Err(violation(format!("images reference missing row `{orphan}`")));
        }
        Ok(())
    }

    /// Inserts `row` into `container` at `index`.
    pub fn insert_row(
        &mut self,
        row: Row,
        container: &Container,
        index: usize,
    ) -> OutlineResult<RowEdit> {
        let group = RowGroup {
            rows: vec![row],
            images: Vec::new(),
        };
        let container = container.clone();
        let mut edits = self.transact(|outline, edits| {
            edits.push(outline.raw_insert_group(group, &container, index)?);
            Ok(())
        })?;
        edits
            .pop()
            .ok_or_else(|| violation("insert recorded no edit"))
    }

    /// Appends `row` as the last child of `container`.
    pub fn append_row(&mut self, row: Row, container: &Container) -> OutlineResult<RowEdit> {
        let index = self.rows_in(container)?.len();
        self.insert_row(row, container, index)
    }

    /// Removes a row and all of its descendants.
    pub fn delete_row(&mut self, id: &str) -> OutlineResult<RowEdit> {
        let id = id.to_string();
        let mut edits = self.transact(|outline, edits| {
            edits.push(outline.raw_delete(&id)?);
            Ok(())
        })?;
        edits
            .pop()
            .ok_or_else(|| violation("delete recorded no edit"))
    }

    /// Reverts `edits` in reverse order.
    ///
    /// Tag edits revert while paged out; anything else needs loaded rows.
    pub fn revert(&mut self, edits: &[RowEdit]) -> OutlineResult<()> {
        let is_tag_only = edits.iter().all(|edit| {
            matches!(edit, RowEdit::TagAdded { .. } | RowEdit::TagRemoved { .. })
        });
        if !is_tag_only {
            self.ensure_loaded()?;
        }
        self.begin_batch();
        let outcome = edits
            .iter()
            .rev()
            .try_for_each(|edit| self.undo_edit(edit));
        if !edits.is_empty() {
            self.bump_generation();
            self.shadow_stale = true;
        }
        self.end_batch();
        outcome
    }

    /// Runs `apply` inside one batch. On failure the edits recorded so far
    /// are reverted before the error is returned.
    pub(crate) fn transact<F>(&mut self, apply: F) -> OutlineResult<Vec<RowEdit>>
    where
        F: FnOnce(&mut Self, &mut Vec<RowEdit>) -> OutlineResult<()>,
    {
        self.ensure_loaded()?;
        self.begin_batch();
        let mut edits = Vec::new();
        let outcome = apply(self, &mut edits);
        if !edits.is_empty() {
            self.shadow_stale = true;
        }
        let result = match outcome {
            Ok(()) => {
                if !edits.is_empty() {
                    self.bump_generation();
                }
                Ok(edits)
            }
            Err(err) => {
                if let Err(revert_err) = edits
                    .iter()
                    .rev()
                    .try_for_each(|edit| self.undo_edit(edit))
                {
                    error!(
                        "event=transact_rollback module=outline status=error outline={} error={}",
                        self.id, revert_err
                    );
                }
                Err(err)
            }
        };
        self.end_batch();
        result
    }

    fn mark_container(&mut self, container: &Container) {
        let id = match container {
            Container::Root => self.id.clone(),
            Container::Row(row_id) => self.row_entity_id(row_id),
        };
        self.changes.mark(id);
    }

    fn mark_row(&mut self, row_id: &str) {
        let id = self.row_entity_id(row_id);
        self.changes.mark(id);
    }

    fn order_mut(&mut self, container: &Container) -> OutlineResult<&mut Vec<RowId>> {
        match container {
            Container::Root => Ok(&mut self.root_order),
            Container::Row(id) => self
                .keyed_rows
                .get_mut(id)
                .map(Row::row_order_mut)
                .ok_or_else(|| OutlineError::ContainerNotFound(container.clone())),
        }
    }

    pub(super) fn require_row(&self, id: &str) -> OutlineResult<&Row> {
        self.keyed_rows
            .get(id)
            .ok_or_else(|| OutlineError::RowNotFound(id.to_string()))
    }

    pub(super) fn require_row_mut(&mut self, id: &str) -> OutlineResult<&mut Row> {
        self.keyed_rows
            .get_mut(id)
            .ok_or_else(|| OutlineError::RowNotFound(id.to_string()))
    }

    /// Captures a row with its descendants and their images.
    pub(crate) fn capture_group(&self, id: &str) -> OutlineResult<RowGroup> {
        let top = self.require_row(id)?;
        let mut rows = vec![top.clone()];
        rows.extend(
            self.pre_order(top.row_order())
                .into_iter()
                .filter_map(|child| self.keyed_rows.get(child).cloned()),
        );
        for row in &mut rows {
            row.set_shadow_table_index(None);
        }
        let images = rows
            .iter()
            .flat_map(|row| self.images_of(row.id()).iter().cloned())
            .collect();
        Ok(RowGroup { rows, images })
    }

    pub(crate) fn raw_insert_group(
        &mut self,
        group: RowGroup,
        container: &Container,
        index: usize,
    ) -> OutlineResult<RowEdit> {
        let top_id = group
            .top_row_id()
            .map(str::to_string)
            .ok_or_else(|| violation("cannot insert an empty row group"))?;
        if let Some(existing) = group
            .rows
            .iter()
            .find(|row| self.keyed_rows.contains_key(row.id()))
        {
            return Err(violation(format!("row `{}` already exists", existing.id())));
        }
        let order_len = self.rows_in(container)?.len();
        if index > order_len {
            return Err(violation(format!(
                "insert index {index} is past the end of {container:?}"
            )));
        }

        let mut by_id = group
            .rows
            .into_iter()
            .map(|row| (row.id().to_string(), row))
            .collect::<HashMap<_, _>>();
        let mut parents = vec![(top_id.clone(), container.clone())];
        let mut placed = Vec::with_capacity(by_id.len());
        while let Some((id, parent)) = parents.pop() {
            let mut row = by_id
                .remove(&id)
                .ok_or_else(|| violation(format!("row group does not contain `{id}`")))?;
            row.set_parent(parent);
            row.set_shadow_table_index(None);
            parents.extend(
                row.row_order()
                    .iter()
                    .map(|child| (child.clone(), row.as_container())),
            );
            placed.push(row);
        }
        if !by_id.is_empty() {
            return Err(violation("row group contains unreachable rows"));
        }

        for row in placed {
            let id = row.id().to_string();
            self.render_cache.invalidate(&id);
            self.keyed_rows.insert(id.clone(), row);
            self.mark_row(&id);
        }
        for image in group.images {
            let Some(row_id) = image.id.row_uuid().map(str::to_string) else {
                continue;
            };
            if self.keyed_rows.contains_key(&row_id) {
                self.changes.mark(image.id.clone());
                self.images.entry(row_id).or_default().push(image);
            }
        }
        self.order_mut(container)?.insert(index, top_id.clone());
        self.mark_container(container);

        Ok(RowEdit::Inserted {
            container: container.clone(),
            index,
            row_id: top_id,
        })
    }

    pub(crate) fn raw_delete(&mut self, id: &str) -> OutlineResult<RowEdit> {
        let group = self.capture_group(id)?;
        let container = self.require_row(id)?.parent().clone();
        let index = self
            .first_index_of_row(&container, id)
            .ok_or_else(|| violation(format!("row `{id}` is not listed by its parent")))?;

        self.order_mut(&container)?.remove(index);
        for row in &group.rows {
            self.keyed_rows.remove(row.id());
            self.images.remove(row.id());
            self.render_cache.invalidate(row.id());
            self.mark_row(row.id());
        }
        for image in &group.images {
            self.changes.mark(image.id.clone());
        }
        self.mark_container(&container);

        Ok(RowEdit::Deleted {
            container,
            index,
            group,
        })
    }

    pub(crate) fn raw_move(
        &mut self,
        id: &str,
        to: &Container,
        placement: Placement,
    ) -> OutlineResult<RowEdit> {
        let from = self.require_row(id)?.parent().clone();
        if let Container::Row(target) = to {
            if target == id || self.is_descendant(target, id) {
                return Err(violation(format!("row `{id}` cannot move below itself")));
            }
        }
        self.rows_in(to)?;
        let from_index = self
            .first_index_of_row(&from, id)
            .ok_or_else(|| violation(format!("row `{id}` is not listed by its parent")))?;

        self.order_mut(&from)?.remove(from_index);
        let order = self.order_mut(to)?;
        let anchor_index = |anchor: &str, order: &[RowId]| {
            order
                .iter()
                .position(|child| child == anchor)
                .ok_or_else(|| violation(format!("move anchor `{anchor}` is not in the target")))
        };
        let to_index = match &placement {
            Placement::Index(index) => Ok((*index).min(order.len())),
            Placement::Before(anchor) => anchor_index(anchor, order),
            Placement::After(anchor) => anchor_index(anchor, order).map(|index| index + 1),
            Placement::End => Ok(order.len()),
        };
        let to_index = match to_index {
            Ok(index) => index,
            Err(err) => {
                self.order_mut(&from)?.insert(from_index, id.to_string());
                return Err(err);
            }
        };
        order.insert(to_index, id.to_string());
        self.require_row_mut(id)?.set_parent(to.clone());

        self.mark_row(id);
        self.mark_container(&from);
        self.mark_container(to);

        Ok(RowEdit::Moved {
            row_id: id.to_string(),
            from,
            from_index,
            to: to.clone(),
            to_index,
        })
    }

    pub(crate) fn raw_set_expanded(
        &mut self,
        id: &str,
        value: bool,
    ) -> OutlineResult<Option<RowEdit>> {
        let row = self.require_row_mut(id)?;
        if row.is_expanded() == value {
            return Ok(None);
        }
        row.set_expanded(value);
        self.mark_row(id);
        Ok(Some(RowEdit::ExpandedChanged {
            row_id: id.to_string(),
            was_expanded: !value,
        }))
    }

    pub(crate) fn raw_set_complete(
        &mut self,
        id: &str,
        value: bool,
    ) -> OutlineResult<Option<RowEdit>> {
        let row = self.require_row_mut(id)?;
        if row.is_complete() == value {
            return Ok(None);
        }
        row.set_complete(value);
        self.mark_row(id);
        Ok(Some(RowEdit::CompleteChanged {
            row_id: id.to_string(),
            was_complete: !value,
        }))
    }

    /// Replaces both texts and the full image list of one row.
    pub(crate) fn raw_replace_text(
        &mut self,
        id: &str,
        topic: Option<String>,
        note: Option<String>,
        images: Vec<Image>,
    ) -> OutlineResult<RowEdit> {
        let row = self.require_row_mut(id)?;
        let old_topic = row.topic().map(str::to_string);
        let old_note = row.note().map(str::to_string);
        row.set_topic(topic);
        row.set_note(note);

        let old_images = if images.is_empty() {
            self.images.remove(id).unwrap_or_default()
        } else {
            self.images
                .insert(id.to_string(), images.clone())
                .unwrap_or_default()
        };
        for image in old_images.iter().chain(images.iter()) {
            self.changes.mark(image.id.clone());
        }
        self.render_cache.invalidate(id);
        self.mark_row(id);

        Ok(RowEdit::TextChanged {
            row_id: id.to_string(),
            topic: old_topic,
            note: old_note,
            images: old_images,
        })
    }

    pub(crate) fn raw_add_tag(&mut self, tag_id: &str, index: usize) -> RowEdit {
        let index = index.min(self.tag_ids.len());
        self.tag_ids.insert(index, tag_id.to_string());
        let id = self.id.clone();
        self.changes.mark(id);
        RowEdit::TagAdded {
            tag_id: tag_id.to_string(),
            index,
        }
    }

    pub(crate) fn raw_remove_tag(&mut self, tag_id: &str) -> Option<RowEdit> {
        let index = self.tag_ids.iter().position(|id| id == tag_id)?;
        self.tag_ids.remove(index);
        let id = self.id.clone();
        self.changes.mark(id);
        Some(RowEdit::TagRemoved {
            tag_id: tag_id.to_string(),
            index,
        })
    }

    fn undo_edit(&mut self, edit: &RowEdit) -> OutlineResult<()> {
        match edit {
            RowEdit::Inserted {
                container,
                index,
                row_id,
            } => {
                if self.rows_in(container)?.get(*index) != Some(row_id) {
                    return Err(violation(format!(
                        "inserted row `{row_id}` is no longer at {index}"
                    )));
                }
                self.raw_delete(row_id)?;
            }
            RowEdit::Deleted {
                container,
                index,
                group,
            } => {
                self.raw_insert_group(group.clone(), container, *index)?;
            }
            RowEdit::Moved {
                row_id,
                from,
                from_index,
                to,
                to_index,
            } => {
                if self.rows_in(to)?.get(*to_index) != Some(row_id) {
                    return Err(violation(format!(
                        "moved row `{row_id}` is no longer at {to_index}"
                    )));
                }
                self.raw_move(row_id, from, Placement::Index(*from_index))?;
            }
            RowEdit::ExpandedChanged {
                row_id,
                was_expanded,
            } => {
                self.raw_set_expanded(row_id, *was_expanded)?;
            }
            RowEdit::CompleteChanged {
                row_id,
                was_complete,
            } => {
                self.raw_set_complete(row_id, *was_complete)?;
            }
            RowEdit::TextChanged {
                row_id,
                topic,
                note,
                images,
            } => {
                self.raw_replace_text(row_id, topic.clone(), note.clone(), images.clone())?;
            }
            RowEdit::TagAdded { tag_id, index } => {
                if self.tag_ids.get(*index) != Some(tag_id) {
                    return Err(violation(format!("tag `{tag_id}` is no longer at {index}")));
                }
                self.tag_ids.remove(*index);
                let id = self.id.clone();
                self.changes.mark(id);
            }
            RowEdit::TagRemoved { tag_id, index } => {
                self.raw_add_tag(tag_id, *index);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::outline_with;
    use crate::model::row::{Container, Row};

    #[test]
    fn ancestry_queries_walk_parent_ids() {
        let outline = outline_with(&[("a", None), ("b", Some("a")), ("c", Some("b")), ("d", None)]);

        assert_eq!(outline.level("c"), 2);
        assert!(outline.is_descendant("c", "a"));
        assert!(!outline.is_descendant("a", "c"));
        assert_eq!(outline.ancestor_sibling("c", "d"), Some("a"));
        assert_eq!(outline.ancestor_sibling("b", "c"), Some("b"));
        assert!(outline.has_same_parent("a", "d"));
        assert_eq!(outline.first_index_of_row(&Container::Root, "d"), Some(1));
        assert!(outline.contains_row(&Container::from("a"), "b"));
    }

    #[test]
    fn completion_cascade_is_derived_on_read() {
        let mut outline = outline_with(&[("r", None), ("a", Some("r")), ("b", Some("a"))]);
        outline.complete_rows(&["a".to_string()]).unwrap();

        assert!(outline.is_ancestor_complete("b"));
        assert!(!outline.row("b").unwrap().is_complete());

        outline.uncomplete_rows(&["a".to_string()]).unwrap();
        assert!(!outline.is_ancestor_complete("b"));
        assert!(!outline.row("b").unwrap().is_complete());
    }

    #[test]
    fn delete_then_revert_restores_subtree() {
        let mut outline = outline_with(&[("a", None), ("b", Some("a")), ("c", None)]);
        let before = outline.row_set();

        let edit = outline.delete_row("a").unwrap();
        assert_eq!(outline.row_count(), 1);
        assert!(outline.verify_integrity().is_ok());

        outline.revert(&[edit]).unwrap();
        assert_eq!(outline.row_set(), before);
        assert!(outline.verify_integrity().is_ok());
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut outline = outline_with(&[("a", None)]);
        let err = outline
            .append_row(Row::with_id("a", None, None), &Container::Root)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::model::outline::OutlineError::StructuralInvariantViolation(_)
        ));
        assert_eq!(outline.row_count(), 1);
    }
}
