//! Undoable outline operations.
//!
//! # Responsibility
//! - Describe one user-level edit with everything needed to redo it.
//! - Dispatch the edit to the matching `Outline` mutator.
//!
//! # Invariants
//! - Applying the same operation twice to equal outlines yields equal
//!   trees: new rows, split rows and pasted groups carry their ids.

use crate::model::edit::{RowEdit, RowGroup};
use crate::model::image::Image;
use crate::model::outline::{OperationKind, Outline, OutlineResult};
use crate::model::row::{Container, Row, RowId, RowStrings};
use uuid::Uuid;

/// One undoable edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateRowAfter { after: Option<RowId>, row: Row },
    CreateRowBefore { before: RowId, row: Row },
    CreateRowInside { parent: RowId, row: Row },
    DeleteRows { row_ids: Vec<RowId> },
    DeleteAllRows,
    IndentRows { row_ids: Vec<RowId> },
    OutdentRows { row_ids: Vec<RowId> },
    CompleteRows { row_ids: Vec<RowId> },
    UncompleteRows { row_ids: Vec<RowId> },
    CreateNotes { row_ids: Vec<RowId> },
    DeleteNotes { row_ids: Vec<RowId> },
    ExpandRows { row_ids: Vec<RowId> },
    CollapseRows { row_ids: Vec<RowId> },
    ExpandAll { containers: Vec<Container> },
    CollapseAll { containers: Vec<Container> },
    SplitRow {
        row_id: RowId,
        position: usize,
        new_row_id: RowId,
    },
    MoveRows {
        row_ids: Vec<RowId>,
        to: Container,
        index: usize,
    },
    /// Groups are already re-identified; see [`Operation::paste_rows`].
    PasteRows {
        groups: Vec<RowGroup>,
        after: Option<RowId>,
    },
    UpdateText { row_id: RowId, strings: RowStrings },
    ImportText {
        row_id: RowId,
        topic: Option<String>,
        note: Option<String>,
        images: Vec<Image>,
    },
    AddTag { tag_id: String },
    RemoveTag { tag_id: String },
}

impl Operation {
    /// Split with a freshly generated id for the new row.
    pub fn split_row(row_id: impl Into<RowId>, position: usize) -> Self {
        Self::SplitRow {
            row_id: row_id.into(),
            position,
            new_row_id: Uuid::new_v4().to_string(),
        }
    }

    /// Paste with fresh ids for every row and image, fixed once so redo
    /// recreates the same rows.
    pub fn paste_rows(outline: &Outline, groups: &[RowGroup], after: Option<RowId>) -> Self {
        let account_id = outline.account_id();
        let groups = groups
            .iter()
            .map(|group| group.reidentified(account_id, outline.outline_uuid()))
            .collect();
        Self::PasteRows { groups, after }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateRowAfter { .. } | Self::CreateRowBefore { .. } | Self::CreateRowInside { .. } => {
                OperationKind::CreateRow
            }
            Self::DeleteRows { .. } => OperationKind::DeleteRows,
            Self::DeleteAllRows => OperationKind::DeleteAllRows,
            Self::IndentRows { .. } => OperationKind::IndentRows,
            Self::OutdentRows { .. } => OperationKind::OutdentRows,
            Self::CompleteRows { .. } => OperationKind::CompleteRows,
            Self::UncompleteRows { .. } => OperationKind::UncompleteRows,
            Self::CreateNotes { .. } => OperationKind::CreateNotes,
            Self::DeleteNotes { .. } => OperationKind::DeleteNotes,
            Self::ExpandRows { .. } => OperationKind::ExpandRows,
            Self::CollapseRows { .. } => OperationKind::CollapseRows,
            Self::ExpandAll { .. } => OperationKind::ExpandAll,
            Self::CollapseAll { .. } => OperationKind::CollapseAll,
            Self::SplitRow { .. } => OperationKind::SplitRow,
            Self::MoveRows { .. } => OperationKind::MoveRows,
            Self::PasteRows { .. } => OperationKind::PasteRows,
            Self::UpdateText { .. } | Self::ImportText { .. } => OperationKind::UpdateText,
            Self::AddTag { .. } => OperationKind::AddTag,
            Self::RemoveTag { .. } => OperationKind::RemoveTag,
        }
    }

    /// Whether the operation is currently unavailable on `outline`.
    pub fn is_unavailable(&self, outline: &Outline) -> bool {
        match self {
            Self::DeleteRows { row_ids } => outline.is_delete_rows_unavailable(row_ids),
            Self::DeleteAllRows => outline.root_order().is_empty(),
            Self::IndentRows { row_ids } => outline.is_indent_rows_unavailable(row_ids),
            Self::OutdentRows { row_ids } => outline.is_outdent_rows_unavailable(row_ids),
            Self::CompleteRows { row_ids } => outline.is_complete_unavailable(row_ids),
            Self::UncompleteRows { row_ids } => outline.is_uncomplete_unavailable(row_ids),
            Self::CreateNotes { row_ids } => outline.is_create_notes_unavailable(row_ids),
            Self::DeleteNotes { row_ids } => outline.is_delete_notes_unavailable(row_ids),
            Self::ExpandRows { row_ids } => outline.is_expand_unavailable(row_ids),
            Self::CollapseRows { row_ids } => outline.is_collapse_unavailable(row_ids),
            Self::ExpandAll { containers } => outline.is_expand_all_unavailable(containers),
            Self::CollapseAll { containers } => outline.is_collapse_all_unavailable(containers),
            Self::SplitRow {
                row_id, position, ..
            } => outline.is_split_row_unavailable(row_id, *position),
            Self::MoveRows { row_ids, to, index } => {
                outline.is_move_rows_unavailable(row_ids, to, *index)
            }
            Self::PasteRows { groups, .. } => outline.is_paste_rows_unavailable(groups),
            Self::AddTag { tag_id } => outline.has_tag(tag_id),
            Self::RemoveTag { tag_id } => !outline.has_tag(tag_id),
            Self::CreateRowAfter { .. }
            | Self::CreateRowBefore { .. }
            | Self::CreateRowInside { .. }
            | Self::UpdateText { .. }
            | Self::ImportText { .. } => !outline.is_loaded(),
        }
    }

    /// Runs the matching outline mutator and returns its recorded edits.
    pub(crate) fn apply(&self, outline: &mut Outline) -> OutlineResult<Vec<RowEdit>> {
        match self {
            Self::CreateRowAfter { after, row } => outline.create_row_after(after.as_deref(), row.clone()),
            Self::CreateRowBefore { before, row } => outline.create_row_before(before, row.clone()),
            Self::CreateRowInside { parent, row } => outline.create_row_inside(parent, row.clone()),
            Self::DeleteRows { row_ids } => outline.delete_rows(row_ids),
            Self::DeleteAllRows => outline.delete_all_rows(),
            Self::IndentRows { row_ids } => outline.indent_rows(row_ids),
            Self::OutdentRows { row_ids } => outline.outdent_rows(row_ids),
            Self::CompleteRows { row_ids } => outline.complete_rows(row_ids),
            Self::UncompleteRows { row_ids } => outline.uncomplete_rows(row_ids),
            Self::CreateNotes { row_ids } => outline.create_notes(row_ids),
            Self::DeleteNotes { row_ids } => outline.delete_notes(row_ids),
            Self::ExpandRows { row_ids } => outline.expand_rows(row_ids),
            Self::CollapseRows { row_ids } => outline.collapse_rows(row_ids),
            Self::ExpandAll { containers } => outline.expand_all(containers),
            Self::CollapseAll { containers } => outline.collapse_all(containers),
            Self::SplitRow {
                row_id,
                position,
                new_row_id,
            } => outline.split_row(row_id, *position, new_row_id.clone()),
            Self::MoveRows { row_ids, to, index } => outline.move_rows(row_ids, to, *index),
            Self::PasteRows { groups, after } => {
                outline.insert_row_groups(groups.clone(), after.as_deref())
            }
            Self::UpdateText { row_id, strings } => {
                outline.update_row_strings(row_id, strings.clone())
            }
            Self::ImportText {
                row_id,
                topic,
                note,
                images,
            } => outline.import_row_text(row_id, topic.clone(), note.clone(), images.clone()),
            Self::AddTag { tag_id } => outline.add_tag(tag_id),
            Self::RemoveTag { tag_id } => outline.remove_tag(tag_id),
        }
    }

    /// Row the cursor lands on after the operation is performed.
    pub fn cursor_row(&self) -> Option<&str> {
        match self {
            Self::CreateRowAfter { row, .. }
            | Self::CreateRowBefore { row, .. }
            | Self::CreateRowInside { row, .. } => Some(row.id()),
            Self::SplitRow { new_row_id, .. } => Some(new_row_id.as_str()),
            Self::PasteRows { groups, .. } => groups.first().and_then(RowGroup::top_row_id),
            Self::IndentRows { row_ids }
            | Self::OutdentRows { row_ids }
            | Self::MoveRows { row_ids, .. } => row_ids.first().map(String::as_str),
            Self::UpdateText { row_id, .. } | Self::ImportText { row_id, .. } => Some(row_id.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Operation;
    use crate::model::outline::test_support::outline_with;
    use crate::model::outline::OperationKind;
    use crate::model::row::Row;

    #[test]
    fn paste_ids_are_fixed_at_construction() {
        let outline = outline_with(&[("a", None), ("b", Some("a"))]);
        let groups = outline.copy_rows(&["a".to_string()]).unwrap();

        let operation = Operation::paste_rows(&outline, &groups, Some("a".to_string()));
        let Operation::PasteRows { groups: fresh, .. } = &operation else {
            panic!("expected paste operation");
        };
        assert_ne!(fresh[0].top_row_id(), Some("a"));
        assert_eq!(operation.cursor_row(), fresh[0].top_row_id());
        assert_eq!(operation.clone(), operation);
    }

    #[test]
    fn availability_follows_outline_predicates() {
        let outline = outline_with(&[("a", None), ("b", None)]);
        let indent_first = Operation::IndentRows {
            row_ids: vec!["a".to_string()],
        };
        let indent_second = Operation::IndentRows {
            row_ids: vec!["b".to_string()],
        };
        assert!(indent_first.is_unavailable(&outline));
        assert!(!indent_second.is_unavailable(&outline));
        assert!(Operation::RemoveTag {
            tag_id: "t".to_string()
        }
        .is_unavailable(&outline));
    }

    #[test]
    fn create_variants_share_one_kind() {
        let row = Row::with_id("n", None, None);
        let after = Operation::CreateRowAfter {
            after: None,
            row: row.clone(),
        };
        let inside = Operation::CreateRowInside {
            parent: "a".to_string(),
            row,
        };
        assert_eq!(after.kind(), OperationKind::CreateRow);
        assert_eq!(inside.kind(), OperationKind::CreateRow);
        assert_eq!(Operation::split_row("a", 1).kind(), OperationKind::SplitRow);
    }
}
