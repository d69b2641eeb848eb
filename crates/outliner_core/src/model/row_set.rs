//! Paged-out form of an outline's rows.
//!
//! # Responsibility
//! - Carry rows, root order and images between an outline and its store.
//! - Report rows that could not be decoded without aborting the load.

use crate::model::image::Image;
use crate::model::row::{Row, RowId};
use std::fmt::{Display, Formatter};

/// One persisted row that failed to decode.
///
/// Its stored child order is kept so its children can be reattached in its
/// place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub row_id: RowId,
    pub reason: String,
    pub row_order: Vec<RowId>,
}

impl Display for RejectedRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "row `{}` rejected: {}", self.row_id, self.reason)
    }
}

/// Rows of one outline as exchanged with a `RowStore`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub root_order: Vec<RowId>,
    pub rows: Vec<Row>,
    pub images: Vec<Image>,
    pub rejected: Vec<RejectedRow>,
}

impl RowSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|row| row.id() == id)
    }
}

/// Outcome of loading a `RowSet` into an outline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Order entries naming rows that do not exist, or naming a row twice.
    pub pruned_references: Vec<RowId>,
    /// Rows present in the set but unreachable from the root.
    pub unreachable: Vec<RowId>,
    pub rejected: Vec<RejectedRow>,
    /// Children of rejected rows, moved up into the rejected row's place.
    pub reparented: Vec<RowId>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.pruned_references.is_empty() && self.unreachable.is_empty() && self.rejected.is_empty()
    }
}
