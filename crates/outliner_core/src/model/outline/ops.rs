//! Outline mutators and their availability predicates.
//!
//! # Invariants
//! - Every mutator checks row existence, then its predicate, before touching
//!   state; an unavailable operation changes nothing.
//! - A mutator whose predicate reported available records at least one edit.
//! - Selections are processed in display order (outdent: reverse order).

use super::tree::Placement;
use super::{OperationKind, Outline, OutlineError, OutlineResult};
use crate::model::edit::{RowEdit, RowGroup};
use crate::model::image::Image;
use crate::model::row::{Container, Row, RowId, RowStrings};
use crate::model::text::{char_len, split_at_char, split_image_references, TextField};
use log::{debug, warn};
use std::collections::HashSet;

fn unavailable(operation: OperationKind) -> OutlineError {
    debug!(
        "event=operation_unavailable module=outline status=rejected operation={}",
        operation
    );
    OutlineError::Unavailable(operation)
}

fn single(row: Row) -> RowGroup {
    RowGroup {
        rows: vec![row],
        images: Vec::new(),
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl Outline {
    fn require_rows(&self, ids: &[RowId]) -> OutlineResult<()> {
        self.ensure_loaded()?;
        match ids.iter().find(|id| !self.keyed_rows.contains_key(id.as_str())) {
            Some(missing) => Err(OutlineError::RowNotFound(missing.clone())),
            None => Ok(()),
        }
    }

    fn selection_exists(&self, ids: &[RowId]) -> bool {
        self.is_loaded
            && !ids.is_empty()
            && ids.iter().all(|id| self.keyed_rows.contains_key(id.as_str()))
    }

    fn selected_rows<'a>(&'a self, ids: &'a [RowId]) -> impl Iterator<Item = &'a Row> + 'a {
        ids.iter().filter_map(|id| self.keyed_rows.get(id.as_str()))
    }

    fn index_in_parent(&self, id: &str) -> Option<usize> {
        let row = self.keyed_rows.get(id)?;
        self.first_index_of_row(row.parent(), id)
    }

    /// The row itself for a row container, every row for the root.
    fn subtree_rows(&self, container: &Container) -> Vec<RowId> {
        match container {
            Container::Root => self.rows_in_tree_order().into_iter().cloned().collect(),
            Container::Row(id) => {
                let mut rows = vec![id.clone()];
                rows.extend(self.descendants(id));
                rows
            }
        }
    }

    fn containers_exist(&self, containers: &[Container]) -> bool {
        self.is_loaded
            && !containers.is_empty()
            && containers.iter().all(|container| self.rows_in(container).is_ok())
    }

    /// Where rows placed "after" `after` go: first child of an expanded
    /// parent with children, otherwise the next sibling. `None` is the top
    /// of the outline (root index 0).
    fn insertion_point_after(&self, after: Option<&str>) -> OutlineResult<(Container, usize)> {
        let Some(after) = after else {
            return Ok((Container::Root, 0));
        };
        let row = self.require_row(after)?;
        if row.is_expanded() && row.row_count() > 0 {
            return Ok((row.as_container(), 0));
        }
        let container = row.parent().clone();
        let index = self
            .first_index_of_row(&container, after)
            .ok_or_else(|| OutlineError::RowNotFound(after.to_string()))?;
        Ok((container, index + 1))
    }

    pub fn is_delete_rows_unavailable(&self, ids: &[RowId]) -> bool {
        !self.selection_exists(ids)
    }

    /// Unavailable when any row is the first child of its container.
    pub fn is_indent_rows_unavailable(&self, ids: &[RowId]) -> bool {
        !self.selection_exists(ids)
            || ids
                .iter()
                .any(|id| self.index_in_parent(id).map_or(true, |index| index == 0))
    }

    /// Unavailable when any row is at root level.
    pub fn is_outdent_rows_unavailable(&self, ids: &[RowId]) -> bool {
        !self.selection_exists(ids)
            || self
                .selected_rows(ids)
                .any(|row| row.parent().is_root())
    }

    pub fn is_complete_unavailable(&self, ids: &[RowId]) -> bool {
        !self.selection_exists(ids) || !self.selected_rows(ids).any(Row::is_completable)
    }

    pub fn is_uncomplete_unavailable(&self, ids: &[RowId]) -> bool {
        !self.selection_exists(ids) || !self.selected_rows(ids).any(Row::is_uncompletable)
    }

    pub fn is_create_notes_unavailable(&self, ids: &[RowId]) -> bool {
        !self.selection_exists(ids) || !self.selected_rows(ids).any(Row::is_note_empty)
    }

    pub fn is_delete_notes_unavailable(&self, ids: &[RowId]) -> bool {
        !self.selection_exists(ids) || self.selected_rows(ids).all(Row::is_note_empty)
    }

    pub fn is_expand_unavailable(&self, ids: &[RowId]) -> bool {
        !self.selection_exists(ids) || !self.selected_rows(ids).any(Row::is_expandable)
    }

    pub fn is_collapse_unavailable(&self, ids: &[RowId]) -> bool {
        !self.selection_exists(ids) || !self.selected_rows(ids).any(Row::is_collapsable)
    }

    pub fn is_expand_all_unavailable(&self, containers: &[Container]) -> bool {
        !self.containers_exist(containers)
            || !containers
                .iter()
                .flat_map(|container| self.subtree_rows(container))
                .filter_map(|id| self.keyed_rows.get(&id))
                .any(Row::is_expandable)
    }

    pub fn is_collapse_all_unavailable(&self, containers: &[Container]) -> bool {
        !self.containers_exist(containers)
            || !containers
                .iter()
                .flat_map(|container| self.subtree_rows(container))
                .filter_map(|id| self.keyed_rows.get(&id))
                .any(Row::is_collapsable)
    }

    /// Unavailable when `position` is past the end of the topic.
    pub fn is_split_row_unavailable(&self, id: &str, position: usize) -> bool {
        match self.keyed_rows.get(id) {
            Some(row) if self.is_loaded => position > char_len(row.topic().unwrap_or_default()),
            _ => true,
        }
    }

    /// Unavailable when the target is a moved row or lies below one, or
    /// `index` is past the end of the target's children.
    pub fn is_move_rows_unavailable(&self, ids: &[RowId], to: &Container, index: usize) -> bool {
        if !self.selection_exists(ids) {
            return true;
        }
        let Ok(order) = self.rows_in(to) else {
            return true;
        };
        if index > order.len() {
            return true;
        }
        match to {
            Container::Root => false,
            Container::Row(target) => ids
                .iter()
                .any(|id| id == target || self.is_descendant(target, id)),
        }
    }

    pub fn is_paste_rows_unavailable(&self, groups: &[RowGroup]) -> bool {
        !self.is_loaded || groups.is_empty() || groups.iter().any(RowGroup::is_empty)
    }

    /// Allocates a detached row with a fresh id. Place it with one of the
    /// `create_row_*` mutators.
    pub fn create_row(&self, topic: Option<String>, note: Option<String>) -> Row {
        Row::new(topic, note)
    }

    /// Inserts `row` after `after` (first child when `after` is expanded
    /// with children); `None` inserts at the top of the outline.
    pub fn create_row_after(&mut self, after: Option<&str>, row: Row) -> OutlineResult<Vec<RowEdit>> {
        self.ensure_loaded()?;
        let (container, index) = self.insertion_point_after(after)?;
        self.transact(|outline, edits| {
            edits.push(outline.raw_insert_group(single(row), &container, index)?);
            Ok(())
        })
    }

    /// Inserts `row` as the sibling right before `before`.
    pub fn create_row_before(&mut self, before: &str, row: Row) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(&[before.to_string()])?;
        let container = self.require_row(before)?.parent().clone();
        let index = self
            .first_index_of_row(&container, before)
            .ok_or_else(|| OutlineError::RowNotFound(before.to_string()))?;
        self.transact(|outline, edits| {
            edits.push(outline.raw_insert_group(single(row), &container, index)?);
            Ok(())
        })
    }

    /// Appends `row` as the last child of `parent`, expanding it.
    pub fn create_row_inside(&mut self, parent: &str, row: Row) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(&[parent.to_string()])?;
        let container = Container::from(parent);
        self.transact(|outline, edits| {
            if let Some(edit) = outline.raw_set_expanded(parent, true)? {
                edits.push(edit);
            }
            let index = outline.rows_in(&container)?.len();
            edits.push(outline.raw_insert_group(single(row), &container, index)?);
            Ok(())
        })
    }

    /// Deletes rows with their descendants. Selected descendants of a
    /// selected row are folded into it.
    pub fn delete_rows(&mut self, ids: &[RowId]) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(ids)?;
        if self.is_delete_rows_unavailable(ids) {
            return Err(unavailable(OperationKind::DeleteRows));
        }
        let selection = self.top_level_selection(ids)?;
        self.transact(|outline, edits| {
            for id in &selection {
                edits.push(outline.raw_delete(id)?);
            }
            Ok(())
        })
    }

    pub fn delete_all_rows(&mut self) -> OutlineResult<Vec<RowEdit>> {
        self.ensure_loaded()?;
        if self.root_order.is_empty() {
            return Err(unavailable(OperationKind::DeleteAllRows));
        }
        let roots = self.root_order.clone();
        self.transact(|outline, edits| {
            for id in &roots {
                edits.push(outline.raw_delete(id)?);
            }
            Ok(())
        })
    }

    /// Makes each row the last child of its preceding sibling.
    pub fn indent_rows(&mut self, ids: &[RowId]) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(ids)?;
        if self.is_indent_rows_unavailable(ids) {
            return Err(unavailable(OperationKind::IndentRows));
        }
        let ordered = self.display_order(ids)?;
        self.transact(|outline, edits| {
            for id in &ordered {
                let container = outline.require_row(id)?.parent().clone();
                let index = outline
                    .first_index_of_row(&container, id)
                    .filter(|index| *index > 0)
                    .ok_or(OutlineError::Unavailable(OperationKind::IndentRows))?;
                let new_parent = outline.rows_in(&container)?[index - 1].clone();
                if let Some(edit) = outline.raw_set_expanded(&new_parent, true)? {
                    edits.push(edit);
                }
                edits.push(outline.raw_move(id, &Container::Row(new_parent), Placement::End)?);
            }
            Ok(())
        })
    }

    /// Makes each row the sibling right after its former parent.
    pub fn outdent_rows(&mut self, ids: &[RowId]) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(ids)?;
        if self.is_outdent_rows_unavailable(ids) {
            return Err(unavailable(OperationKind::OutdentRows));
        }
        let mut ordered = self.display_order(ids)?;
        ordered.reverse();
        self.transact(|outline, edits| {
            for id in &ordered {
                let Container::Row(parent_id) = outline.require_row(id)?.parent().clone() else {
                    return Err(OutlineError::Unavailable(OperationKind::OutdentRows));
                };
                let grandparent = outline.require_row(&parent_id)?.parent().clone();
                edits.push(outline.raw_move(id, &grandparent, Placement::After(parent_id))?);
            }
            Ok(())
        })
    }

    pub fn complete_rows(&mut self, ids: &[RowId]) -> OutlineResult<Vec<RowEdit>> {
        self.set_complete_rows(ids, true, OperationKind::CompleteRows)
    }

    pub fn uncomplete_rows(&mut self, ids: &[RowId]) -> OutlineResult<Vec<RowEdit>> {
        self.set_complete_rows(ids, false, OperationKind::UncompleteRows)
    }

    fn set_complete_rows(
        &mut self,
        ids: &[RowId],
        value: bool,
        operation: OperationKind,
    ) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(ids)?;
        let is_unavailable = if value {
            self.is_complete_unavailable(ids)
        } else {
            self.is_uncomplete_unavailable(ids)
        };
        if is_unavailable {
            return Err(unavailable(operation));
        }
        let ordered = self.display_order(ids)?;
        self.transact(|outline, edits| {
            for id in &ordered {
                if let Some(edit) = outline.raw_set_complete(id, value)? {
                    edits.push(edit);
                }
            }
            Ok(())
        })
    }

    pub fn expand_rows(&mut self, ids: &[RowId]) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(ids)?;
        if self.is_expand_unavailable(ids) {
            return Err(unavailable(OperationKind::ExpandRows));
        }
        let targets = self
            .display_order(ids)?
            .into_iter()
            .filter(|id| self.keyed_rows.get(id).is_some_and(Row::is_expandable))
            .collect::<Vec<_>>();
        self.set_expanded_rows(&targets, true)
    }

    pub fn collapse_rows(&mut self, ids: &[RowId]) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(ids)?;
        if self.is_collapse_unavailable(ids) {
            return Err(unavailable(OperationKind::CollapseRows));
        }
        let targets = self
            .display_order(ids)?
            .into_iter()
            .filter(|id| self.keyed_rows.get(id).is_some_and(Row::is_collapsable))
            .collect::<Vec<_>>();
        self.set_expanded_rows(&targets, false)
    }

    /// Expands every collapsed row with children inside `containers`.
    pub fn expand_all(&mut self, containers: &[Container]) -> OutlineResult<Vec<RowEdit>> {
        self.ensure_loaded()?;
        if self.is_expand_all_unavailable(containers) {
            return Err(unavailable(OperationKind::ExpandAll));
        }
        let targets = self.rows_matching(containers, Row::is_expandable);
        self.set_expanded_rows(&targets, true)
    }

    /// Collapses every expanded row with children inside `containers`.
    pub fn collapse_all(&mut self, containers: &[Container]) -> OutlineResult<Vec<RowEdit>> {
        self.ensure_loaded()?;
        if self.is_collapse_all_unavailable(containers) {
            return Err(unavailable(OperationKind::CollapseAll));
        }
        let targets = self.rows_matching(containers, Row::is_collapsable);
        self.set_expanded_rows(&targets, false)
    }

    fn rows_matching(&self, containers: &[Container], predicate: fn(&Row) -> bool) -> Vec<RowId> {
        let mut seen = HashSet::new();
        containers
            .iter()
            .flat_map(|container| self.subtree_rows(container))
            .filter(|id| seen.insert(id.clone()))
            .filter(|id| self.keyed_rows.get(id).is_some_and(predicate))
            .collect()
    }

    fn set_expanded_rows(&mut self, ids: &[RowId], value: bool) -> OutlineResult<Vec<RowEdit>> {
        self.transact(|outline, edits| {
            for id in ids {
                if let Some(edit) = outline.raw_set_expanded(id, value)? {
                    edits.push(edit);
                }
            }
            Ok(())
        })
    }

    pub fn create_notes(&mut self, ids: &[RowId]) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(ids)?;
        if self.is_create_notes_unavailable(ids) {
            return Err(unavailable(OperationKind::CreateNotes));
        }
        let ordered = self.display_order(ids)?;
        self.transact(|outline, edits| {
            for id in &ordered {
                let row = outline.require_row(id)?;
                if !row.is_note_empty() {
                    continue;
                }
                let topic = row.topic().map(str::to_string);
                let images = outline.images_of(id).to_vec();
                edits.push(outline.raw_replace_text(id, topic, Some(String::new()), images)?);
            }
            Ok(())
        })
    }

    /// Removes notes and their images.
    pub fn delete_notes(&mut self, ids: &[RowId]) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(ids)?;
        if self.is_delete_notes_unavailable(ids) {
            return Err(unavailable(OperationKind::DeleteNotes));
        }
        let ordered = self.display_order(ids)?;
        self.transact(|outline, edits| {
            for id in &ordered {
                let row = outline.require_row(id)?;
                if row.is_note_empty() {
                    continue;
                }
                let topic = row.topic().map(str::to_string);
                let images = outline
                    .images_of(id)
                    .iter()
                    .filter(|image| !image.is_in_notes)
                    .cloned()
                    .collect();
                edits.push(outline.raw_replace_text(id, topic, None, images)?);
            }
            Ok(())
        })
    }

    /// Splits a row's topic at char `position`.
    ///
    /// The row keeps the head; a new sibling `new_row_id` right after it
    /// gets the tail, the topic images at or after `position` and all of the
    /// row's children, and copies the row's expansion flag.
    pub fn split_row(
        &mut self,
        id: &str,
        position: usize,
        new_row_id: impl Into<RowId>,
    ) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(&[id.to_string()])?;
        if self.is_split_row_unavailable(id, position) {
            return Err(unavailable(OperationKind::SplitRow));
        }
        let new_row_id = new_row_id.into();
        let row = self.require_row(id)?;
        let (head, tail) = split_at_char(row.topic().unwrap_or_default(), position);
        let note = row.note().map(str::to_string);
        let children = row.row_order().to_vec();
        let container = row.parent().clone();
        let mut new_row = Row::with_id(new_row_id.clone(), non_empty(tail), None);
        new_row.set_expanded(row.is_expanded());

        let (moved, kept): (Vec<Image>, Vec<Image>) = self
            .images_of(id)
            .iter()
            .cloned()
            .partition(|image| !image.is_in_notes && image.offset >= position);
        let account_id = self.account_id();
        let outline_uuid = self.outline_uuid().to_string();
        let moved = moved
            .into_iter()
            .map(|image| {
                let mut rebased = image.reassigned(account_id, &outline_uuid, &new_row_id);
                rebased.offset = image.offset - position;
                rebased
            })
            .collect::<Vec<_>>();
        let index = self
            .first_index_of_row(&container, id)
            .ok_or_else(|| OutlineError::RowNotFound(id.to_string()))?;

        self.transact(|outline, edits| {
            edits.push(outline.raw_replace_text(id, Some(head), note, kept)?);
            let group = RowGroup {
                rows: vec![new_row],
                images: moved,
            };
            edits.push(outline.raw_insert_group(group, &container, index + 1)?);
            let new_container = Container::Row(new_row_id.clone());
            for child in &children {
                edits.push(outline.raw_move(child, &new_container, Placement::End)?);
            }
            Ok(())
        })
    }

    /// Moves rows so they sit, in display order, at `index` of `to` as
    /// counted before the move.
    pub fn move_rows(
        &mut self,
        ids: &[RowId],
        to: &Container,
        index: usize,
    ) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(ids)?;
        if self.rows_in(to).is_err() {
            return Err(OutlineError::ContainerNotFound(to.clone()));
        }
        if self.is_move_rows_unavailable(ids, to, index) {
            return Err(unavailable(OperationKind::MoveRows));
        }
        let selection = self.top_level_selection(ids)?;
        let moving = selection.iter().map(String::as_str).collect::<HashSet<_>>();
        let anchor = self.rows_in(to)?[index..]
            .iter()
            .find(|id| !moving.contains(id.as_str()))
            .cloned();

        self.transact(|outline, edits| {
            for id in &selection {
                let placement = anchor.clone().map_or(Placement::End, Placement::Before);
                edits.push(outline.raw_move(id, to, placement)?);
            }
            Ok(())
        })
    }

    /// Captures the selected rows with descendants and images.
    pub fn copy_rows(&self, ids: &[RowId]) -> OutlineResult<Vec<RowGroup>> {
        self.require_rows(ids)?;
        self.top_level_selection(ids)?
            .iter()
            .map(|id| self.capture_group(id))
            .collect()
    }

    /// Pastes groups after `after` with fresh ids for every row and image.
    /// `after` is placed as in `create_row_after`.
    pub fn paste_rows(
        &mut self,
        groups: &[RowGroup],
        after: Option<&str>,
    ) -> OutlineResult<Vec<RowEdit>> {
        let account_id = self.account_id();
        let outline_uuid = self.outline_uuid().to_string();
        let fresh = groups
            .iter()
            .map(|group| group.reidentified(account_id, &outline_uuid))
            .collect();
        self.insert_row_groups(fresh, after)
    }

    /// Inserts groups as given, keeping their ids. `after` is placed as in
    /// `create_row_after`; `None` inserts at the top of the outline.
    pub fn insert_row_groups(
        &mut self,
        groups: Vec<RowGroup>,
        after: Option<&str>,
    ) -> OutlineResult<Vec<RowEdit>> {
        self.ensure_loaded()?;
        if let Some(after) = after {
            self.require_rows(&[after.to_string()])?;
        }
        if self.is_paste_rows_unavailable(&groups) {
            return Err(unavailable(OperationKind::PasteRows));
        }
        let (container, index) = self.insertion_point_after(after)?;
        self.transact(|outline, edits| {
            for (offset, group) in groups.into_iter().enumerate() {
                edits.push(outline.raw_insert_group(group, &container, index + offset)?);
            }
            Ok(())
        })
    }

    /// Replaces row text from markdown carrying `![](<uuid>.png)` references.
    ///
    /// Referenced images must already belong to the row; unknown references
    /// are dropped. Returns no edits when nothing changed.
    pub fn update_row_strings(
        &mut self,
        id: &str,
        strings: RowStrings,
    ) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(&[id.to_string()])?;
        let row = self.require_row(id)?;
        let (topic_markdown, note_markdown) = match strings {
            RowStrings::TopicMarkdown(topic) => (Some(topic), None),
            RowStrings::NoteMarkdown(note) => (None, Some(note)),
            RowStrings::Both(topic, note) => (Some(topic), Some(note)),
        };

        let existing = self.images_of(id);
        let mut images = Vec::new();
        let topic = match topic_markdown {
            Some(markdown) => self.parse_field(id, markdown, TextField::Topic, existing, &mut images),
            None => {
                images.extend(existing.iter().filter(|image| !image.is_in_notes).cloned());
                row.topic().map(str::to_string)
            }
        };
        let note = match note_markdown {
            Some(markdown) => self.parse_field(id, markdown, TextField::Note, existing, &mut images),
            None => {
                images.extend(existing.iter().filter(|image| image.is_in_notes).cloned());
                row.note().map(str::to_string)
            }
        };

        let unchanged = topic.as_deref() == row.topic()
            && note.as_deref() == row.note()
            && images.len() == existing.len()
            && images.iter().all(|image| existing.contains(image));
        if unchanged {
            return Ok(Vec::new());
        }
        self.transact(|outline, edits| {
            edits.push(outline.raw_replace_text(id, topic, note, images)?);
            Ok(())
        })
    }

    fn parse_field(
        &self,
        id: &str,
        markdown: Option<String>,
        field: TextField,
        existing: &[Image],
        images: &mut Vec<Image>,
    ) -> Option<String> {
        let markdown = markdown?;
        let (plain, references) = split_image_references(&markdown);
        for reference in references {
            match existing
                .iter()
                .find(|image| image.image_uuid() == reference.image_uuid)
            {
                Some(image) => {
                    let mut placed = image.clone();
                    placed.offset = reference.offset;
                    placed.is_in_notes = field.is_in_notes();
                    images.push(placed);
                }
                None => warn!(
                    "event=update_row_strings module=outline status=skipped error_code=image_unknown row={} image={}",
                    id, reference.image_uuid
                ),
            }
        }
        Some(plain)
    }

    /// Sets plain text and images as produced by an importer.
    pub fn import_row_text(
        &mut self,
        id: &str,
        topic: Option<String>,
        note: Option<String>,
        images: Vec<Image>,
    ) -> OutlineResult<Vec<RowEdit>> {
        self.require_rows(&[id.to_string()])?;
        let account_id = self.account_id();
        let outline_uuid = self.outline_uuid().to_string();
        let images = images
            .iter()
            .map(|image| image.reassigned(account_id, &outline_uuid, id))
            .collect();
        self.transact(|outline, edits| {
            edits.push(outline.raw_replace_text(id, topic, note, images)?);
            Ok(())
        })
    }

    /// Associates an account tag with this outline. Works while paged out.
    pub fn add_tag(&mut self, tag_id: &str) -> OutlineResult<Vec<RowEdit>> {
        if self.has_tag(tag_id) {
            return Err(unavailable(OperationKind::AddTag));
        }
        self.begin_batch();
        let index = self.tag_ids.len();
        let edit = self.raw_add_tag(tag_id, index);
        self.bump_generation();
        self.end_batch();
        Ok(vec![edit])
    }

    /// Drops a tag association. Works while paged out.
    pub fn remove_tag(&mut self, tag_id: &str) -> OutlineResult<Vec<RowEdit>> {
        self.begin_batch();
        let edit = self.raw_remove_tag(tag_id);
        if edit.is_some() {
            self.bump_generation();
        }
        self.end_batch();
        edit.map(|edit| vec![edit])
            .ok_or_else(|| unavailable(OperationKind::RemoveTag))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::outline_with;
    use super::single;
    use crate::model::outline::{OperationKind, OutlineError};
    use crate::model::row::{Container, Row, RowStrings};

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn indent_and_outdent_boundaries() {
        let mut outline = outline_with(&[("a", None), ("b", None)]);

        assert!(outline.is_indent_rows_unavailable(&ids(&["a"])));
        assert_eq!(
            outline.indent_rows(&ids(&["a"])),
            Err(OutlineError::Unavailable(OperationKind::IndentRows))
        );
        assert!(outline.is_outdent_rows_unavailable(&ids(&["b"])));

        outline.indent_rows(&ids(&["b"])).unwrap();
        assert_eq!(outline.row("a").unwrap().row_order(), &ids(&["b"])[..]);
        outline.outdent_rows(&ids(&["b"])).unwrap();
        assert_eq!(outline.root_order(), &ids(&["a", "b"])[..]);
    }

    #[test]
    fn indent_keeps_relative_order_and_expands_new_parent() {
        let mut outline = outline_with(&[("a", None), ("x", Some("a")), ("b", None), ("c", None)]);
        outline.collapse_rows(&ids(&["a"])).unwrap();

        outline.indent_rows(&ids(&["c", "b"])).unwrap();

        let a = outline.row("a").unwrap();
        assert!(a.is_expanded());
        assert_eq!(a.row_order(), &ids(&["x", "b", "c"])[..]);
        assert!(outline.verify_integrity().is_ok());
    }

    #[test]
    fn outdent_places_row_after_former_parent() {
        let mut outline = outline_with(&[("a", None), ("b", Some("a")), ("c", Some("a")), ("d", None)]);
        outline.outdent_rows(&ids(&["b", "c"])).unwrap();
        assert_eq!(outline.root_order(), &ids(&["a", "b", "c", "d"])[..]);
        assert!(outline.row("a").unwrap().row_order().is_empty());
    }

    #[test]
    fn split_moves_tail_and_children_to_new_row() {
        let mut outline = outline_with(&[("a", None), ("child", Some("a"))]);
        outline
            .update_row_strings("a", RowStrings::TopicMarkdown(Some("Hello World".to_string())))
            .unwrap();

        outline.split_row("a", 5, "n").unwrap();

        assert_eq!(outline.row("a").unwrap().topic(), Some("Hello"));
        assert_eq!(outline.row("n").unwrap().topic(), Some(" World"));
        assert_eq!(outline.root_order(), &ids(&["a", "n"])[..]);
        assert_eq!(outline.row("n").unwrap().row_order(), &ids(&["child"])[..]);
        assert!(outline.row("a").unwrap().row_order().is_empty());
        assert!(outline.is_split_row_unavailable("a", 6));
    }

    #[test]
    fn move_rejects_target_inside_moved_rows() {
        let mut outline = outline_with(&[("a", None), ("b", Some("a")), ("c", None)]);
        assert!(outline.is_move_rows_unavailable(&ids(&["a"]), &Container::from("b"), 0));
        assert_eq!(
            outline.move_rows(&ids(&["a"]), &Container::from("b"), 0),
            Err(OutlineError::Unavailable(OperationKind::MoveRows))
        );

        outline.move_rows(&ids(&["c"]), &Container::Root, 0).unwrap();
        assert_eq!(outline.root_order(), &ids(&["c", "a"])[..]);
    }

    #[test]
    fn move_counts_index_before_detaching() {
        let mut outline = outline_with(&[("a", None), ("b", None), ("c", None), ("d", None)]);
        outline.move_rows(&ids(&["a"]), &Container::Root, 3).unwrap();
        assert_eq!(outline.root_order(), &ids(&["b", "c", "a", "d"])[..]);
    }

    #[test]
    fn paste_and_create_without_anchor_both_go_to_the_top() {
        let mut outline = outline_with(&[("a", None), ("b", None)]);
        let groups = vec![single(Row::with_id("p", None, None))];
        outline.insert_row_groups(groups, None).unwrap();
        outline
            .create_row_after(None, Row::with_id("n", None, None))
            .unwrap();
        assert_eq!(outline.root_order(), &ids(&["n", "p", "a", "b"])[..]);
    }

    #[test]
    fn created_rows_are_detached_until_placed() {
        let mut outline = outline_with(&[("a", None)]);
        let row = outline.create_row(Some("topic".to_string()), None);
        let id = row.id().to_string();
        assert!(outline.row(&id).is_none());

        outline.create_row_after(Some("a"), row).unwrap();
        assert_eq!(outline.root_order(), &["a".to_string(), id.clone()][..]);
        assert_eq!(outline.row(&id).unwrap().topic(), Some("topic"));
    }

    #[test]
    fn create_row_after_expanded_parent_becomes_first_child() {
        let mut outline = outline_with(&[("a", None), ("b", Some("a"))]);
        outline
            .create_row_after(Some("a"), Row::with_id("n", None, None))
            .unwrap();
        assert_eq!(outline.row("a").unwrap().row_order(), &ids(&["n", "b"])[..]);

        outline
            .create_row_after(Some("b"), Row::with_id("m", None, None))
            .unwrap();
        assert_eq!(outline.row("a").unwrap().row_order(), &ids(&["n", "b", "m"])[..]);
    }

    #[test]
    fn notes_predicates_match_mutators() {
        let mut outline = outline_with(&[("a", None)]);
        assert!(outline.is_delete_notes_unavailable(&ids(&["a"])));
        outline.create_notes(&ids(&["a"])).unwrap();
        assert_eq!(outline.row("a").unwrap().note(), Some(""));
        assert!(outline.is_create_notes_unavailable(&ids(&["a"])));
        outline.delete_notes(&ids(&["a"])).unwrap();
        assert!(outline.row("a").unwrap().is_note_empty());
    }

    #[test]
    fn tags_are_ordered_and_unique() {
        let mut outline = outline_with(&[]);
        outline.add_tag("t1").unwrap();
        outline.add_tag("t2").unwrap();
        assert_eq!(
            outline.add_tag("t1"),
            Err(OutlineError::Unavailable(OperationKind::AddTag))
        );
        outline.remove_tag("t1").unwrap();
        assert_eq!(outline.tag_ids(), &ids(&["t2"])[..]);
        assert!(outline.remove_tag("t1").is_err());
    }
}
