//! Row domain model.
//!
//! # Responsibility
//! - Represent one outline bullet line and its ordered child ids.
//! - Provide row-local derived state (expandable, completable, ...).
//!
//! # Invariants
//! - `row_order` is the single source of truth for the row's children.
//! - `parent` is a back-reference by id, never an ownership edge.
//! - `shadow_table_index` is only meaningful while the owning outline's
//!   shadow table is current; read it through `Outline::shadow_table_index`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row identifier, unique within one outline.
pub type RowId = String;

/// Holder of an ordered list of rows: the outline root or another row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Container {
    #[default]
    Root,
    Row(RowId),
}

impl Container {
    pub fn row_id(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Row(id) => Some(id),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }
}

impl From<&str> for Container {
    fn from(value: &str) -> Self {
        Self::Row(value.to_string())
    }
}

/// One outline row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    id: RowId,
    #[serde(rename = "syncID", default, skip_serializing_if = "Option::is_none")]
    sync_id: Option<String>,
    #[serde(default = "default_expanded")]
    is_expanded: bool,
    #[serde(default)]
    is_complete: bool,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    note: Option<String>,
    row_order: Vec<RowId>,
    #[serde(skip)]
    parent: Container,
    #[serde(skip)]
    shadow_table_index: Option<usize>,
}

fn default_expanded() -> bool {
    true
}

impl Row {
    /// Creates an expanded, incomplete row with a generated id.
    pub fn new(topic: Option<String>, note: Option<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), topic, note)
    }

    /// Creates a row with a caller-provided id.
    ///
    /// Used by paste/redo paths where the identity already exists.
    pub fn with_id(id: impl Into<RowId>, topic: Option<String>, note: Option<String>) -> Self {
        Self {
            id: id.into(),
            sync_id: None,
            is_expanded: true,
            is_complete: false,
            topic,
            note,
            row_order: Vec::new(),
            parent: Container::Root,
            shadow_table_index: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sync_id(&self) -> Option<&str> {
        self.sync_id.as_deref()
    }

    pub fn is_expanded(&self) -> bool {
        self.is_expanded
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    /// Topic text with images split out.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Note text with images split out.
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn row_order(&self) -> &[RowId] {
        &self.row_order
    }

    pub fn parent(&self) -> &Container {
        &self.parent
    }

    pub fn row_count(&self) -> usize {
        self.row_order.len()
    }

    pub fn is_expandable(&self) -> bool {
        self.row_count() > 0 && !self.is_expanded
    }

    pub fn is_collapsable(&self) -> bool {
        self.row_count() > 0 && self.is_expanded
    }

    pub fn is_completable(&self) -> bool {
        !self.is_complete
    }

    pub fn is_uncompletable(&self) -> bool {
        self.is_complete
    }

    pub fn is_note_empty(&self) -> bool {
        self.note.is_none()
    }

    /// Container view of this row, used when it holds children.
    pub fn as_container(&self) -> Container {
        Container::Row(self.id.clone())
    }

    /// Returns a copy with `sync_id` set.
    pub fn with_sync_id(mut self, sync_id: impl Into<String>) -> Self {
        self.sync_id = Some(sync_id.into());
        self
    }

    pub(crate) fn set_id(&mut self, id: RowId) {
        self.id = id;
    }

    pub(crate) fn set_expanded(&mut self, value: bool) {
        self.is_expanded = value;
    }

    pub(crate) fn set_complete(&mut self, value: bool) {
        self.is_complete = value;
    }

    pub(crate) fn set_topic(&mut self, value: Option<String>) {
        self.topic = value;
    }

    pub(crate) fn set_note(&mut self, value: Option<String>) {
        self.note = value;
    }

    pub(crate) fn set_parent(&mut self, parent: Container) {
        self.parent = parent;
    }

    pub(crate) fn row_order_mut(&mut self) -> &mut Vec<RowId> {
        &mut self.row_order
    }

    pub(crate) fn set_row_order(&mut self, order: Vec<RowId>) {
        self.row_order = order;
    }

    pub(crate) fn cached_shadow_table_index(&self) -> Option<usize> {
        self.shadow_table_index
    }

    pub(crate) fn set_shadow_table_index(&mut self, index: Option<usize>) {
        self.shadow_table_index = index;
    }
}

/// Replacement text for a row, as markdown with image references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStrings {
    TopicMarkdown(Option<String>),
    NoteMarkdown(Option<String>),
    Both(Option<String>, Option<String>),
}
