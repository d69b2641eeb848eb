//! Primitive row edits and captured row groups.
//!
//! # Responsibility
//! - Record every primitive mutation an outline applies, with the pre-state
//!   needed to invert it exactly.
//! - Capture a row with all descendants and images for deletion and
//!   copy/paste.
//!
//! # Invariants
//! - `RowGroup::rows` is in pre-order; `rows[0]` is the group's top row.
//! - Each `RowGroup` row's `row_order` only names rows of the same group.

use crate::model::entity_id::{AccountId, EntityId};
use crate::model::image::Image;
use crate::model::row::{Container, Row, RowId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One primitive mutation recorded by an outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEdit {
    /// A row group was inserted with its top row at `container[index]`.
    Inserted {
        container: Container,
        index: usize,
        row_id: RowId,
    },
    /// A row group was removed from `container[index]`.
    Deleted {
        container: Container,
        index: usize,
        group: RowGroup,
    },
    Moved {
        row_id: RowId,
        from: Container,
        from_index: usize,
        to: Container,
        to_index: usize,
    },
    ExpandedChanged {
        row_id: RowId,
        was_expanded: bool,
    },
    CompleteChanged {
        row_id: RowId,
        was_complete: bool,
    },
    /// Topic/note text or images were replaced; fields hold the old values.
    TextChanged {
        row_id: RowId,
        topic: Option<String>,
        note: Option<String>,
        images: Vec<Image>,
    },
    TagAdded {
        tag_id: String,
        index: usize,
    },
    TagRemoved {
        tag_id: String,
        index: usize,
    },
}

impl RowEdit {
    /// Row the edit is about, if any.
    pub fn row_id(&self) -> Option<&str> {
        match self {
            Self::Inserted { row_id, .. }
            | Self::Moved { row_id, .. }
            | Self::ExpandedChanged { row_id, .. }
            | Self::CompleteChanged { row_id, .. }
            | Self::TextChanged { row_id, .. } => Some(row_id),
            Self::Deleted { group, .. } => group.top_row_id(),
            Self::TagAdded { .. } | Self::TagRemoved { .. } => None,
        }
    }

    /// Containers whose child list changed.
    pub fn containers(&self) -> Vec<&Container> {
        match self {
            Self::Inserted { container, .. } | Self::Deleted { container, .. } => vec![container],
            Self::Moved { from, to, .. } => vec![from, to],
            _ => Vec::new(),
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Inserted { .. } | Self::Deleted { .. } | Self::Moved { .. }
        )
    }

    pub fn is_expansion(&self) -> bool {
        matches!(self, Self::ExpandedChanged { .. })
    }
}

/// A row with all of its descendants and their images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowGroup {
    pub rows: Vec<Row>,
    #[serde(default)]
    pub images: Vec<Image>,
}

impl RowGroup {
    pub fn top_row_id(&self) -> Option<&str> {
        self.rows.first().map(Row::id)
    }

    pub fn top_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Builds one single-row group per non-blank line of plain text.
    pub fn from_text(text: &str) -> Vec<RowGroup> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| RowGroup {
                rows: vec![Row::new(Some(line.to_string()), None)],
                images: Vec::new(),
            })
            .collect()
    }

    /// Returns a copy where every row and image has a fresh id.
    ///
    /// Images are rebound to `account_id`/`outline_uuid` so the group can
    /// be pasted into another outline.
    pub fn reidentified(&self, account_id: AccountId, outline_uuid: &str) -> RowGroup {
        let fresh_ids = self
            .rows
            .iter()
            .map(|row| (row.id().to_string(), Uuid::new_v4().to_string()))
            .collect::<HashMap<_, _>>();
        let lookup = |id: &str| {
            fresh_ids
                .get(id)
                .cloned()
                .unwrap_or_else(|| id.to_string())
        };

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut copy = row.clone();
                copy.set_id(lookup(row.id()));
                copy.set_row_order(row.row_order().iter().map(|id| lookup(id.as_str())).collect());
                copy.set_shadow_table_index(None);
                copy
            })
            .collect();

        let images = self
            .images
            .iter()
            .filter_map(|image| {
                let row_uuid = lookup(image.id.row_uuid()?);
                Some(Image::new(
                    EntityId::image(
                        account_id,
                        outline_uuid,
                        row_uuid,
                        Uuid::new_v4().to_string(),
                    ),
                    image.is_in_notes,
                    image.offset,
                    image.data.clone(),
                ))
            })
            .collect();

        RowGroup { rows, images }
    }
}

#[cfg(test)]
mod tests {
    use super::RowGroup;
    use crate::model::entity_id::EntityId;
    use crate::model::image::Image;
    use crate::model::row::Row;

    fn group() -> RowGroup {
        let mut parent = Row::with_id("p", Some("parent".to_string()), None);
        parent.row_order_mut().push("c".to_string());
        let child = Row::with_id("c", Some("child".to_string()), None);
        RowGroup {
            rows: vec![parent, child],
            images: vec![Image::new(
                EntityId::image(1, "o", "c", "img"),
                false,
                2,
                vec![7],
            )],
        }
    }

    #[test]
    fn reidentified_group_keeps_shape_with_fresh_ids() {
        let original = group();
        let copy = original.reidentified(2, "other");

        assert_eq!(copy.rows.len(), 2);
        assert_ne!(copy.rows[0].id(), "p");
        assert_ne!(copy.rows[1].id(), "c");
        assert_eq!(copy.rows[0].row_order(), &[copy.rows[1].id().to_string()]);
        assert_eq!(copy.rows[1].topic(), Some("child"));

        let image = &copy.images[0];
        assert_eq!(image.id.row_uuid(), Some(copy.rows[1].id()));
        assert_eq!(image.id.outline_uuid(), Some("other"));
        assert_ne!(image.image_uuid(), "img");
        assert_eq!(image.offset, 2);
    }

    #[test]
    fn from_text_skips_blank_lines() {
        let groups = RowGroup::from_text("one\n\n  two  \n");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].rows[0].topic(), Some("two"));
    }
}
