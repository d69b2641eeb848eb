//! Shadow table projection of an outline's row tree.
//!
//! # Responsibility
//! - Flatten the row tree into the ordered list of visible rows.
//! - Patch an existing projection after expand/collapse without a full walk.
//!
//! # Invariants
//! - Traversal is depth-first pre-order over `row_order`.
//! - Normal mode: a row is listed iff every ancestor is expanded and, when
//!   filtered, the row itself is not complete. A hidden row hides its subtree.
//! - Search mode: exactly the rows of the forced-visible set are listed.
//! - Order entries naming missing rows are skipped with a warning.

use crate::model::outline::Outline;
use crate::model::row::{Row, RowId};
use log::warn;
use std::collections::HashSet;

/// Ordered ids of the currently visible rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadowTable {
    rows: Vec<RowId>,
}

impl ShadowTable {
    pub fn new(rows: Vec<RowId>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[RowId] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.rows.get(index).map(String::as_str)
    }

    pub fn index_of(&self, row_id: &str) -> Option<usize> {
        self.rows.iter().position(|id| id == row_id)
    }

    pub fn into_rows(self) -> Vec<RowId> {
        self.rows
    }
}

/// One visible row with its display position and indent level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowTableEntry {
    pub row_id: RowId,
    pub index: usize,
    pub level: usize,
}

#[derive(Clone, Copy)]
enum Visibility<'a> {
    Normal { filtered: bool },
    Search { visible: &'a HashSet<RowId> },
}

impl Visibility<'_> {
    fn of(outline: &Outline) -> Visibility<'_> {
        match outline.search_visible() {
            Some(visible) => Visibility::Search { visible },
            None => Visibility::Normal {
                filtered: outline.is_filtered(),
            },
        }
    }

    fn includes(&self, row: &Row) -> bool {
        match self {
            Self::Normal { filtered } => !(*filtered && row.is_complete()),
            Self::Search { visible } => visible.contains(row.id()),
        }
    }

    fn descends(&self, row: &Row) -> bool {
        match self {
            Self::Normal { .. } => row.is_expanded(),
            Self::Search { .. } => true,
        }
    }
}

/// Projects the whole outline.
pub fn project(outline: &Outline) -> ShadowTable {
    let mut rows = Vec::new();
    walk(outline, outline.root_order(), Visibility::of(outline), &mut rows);
    ShadowTable::new(rows)
}

/// Visible descendants of `row_id`, assuming the row itself is visible.
pub fn project_descendants(outline: &Outline, row_id: &str) -> Vec<RowId> {
    let mut rows = Vec::new();
    let visibility = Visibility::of(outline);
    if let Some(row) = outline.row(row_id) {
        if visibility.descends(row) {
            walk(outline, row.row_order(), visibility, &mut rows);
        }
    }
    rows
}

fn walk(outline: &Outline, order: &[RowId], visibility: Visibility<'_>, out: &mut Vec<RowId>) {
    let mut stack = order.iter().rev().collect::<Vec<_>>();
    while let Some(id) = stack.pop() {
        let Some(row) = outline.row(id) else {
            warn!(
                "event=shadow_project module=shadow status=skipped error_code=row_missing row={}",
                id
            );
            continue;
        };
        if !visibility.includes(row) {
            continue;
        }
        out.push(id.clone());
        if visibility.descends(row) {
            stack.extend(row.row_order().iter().rev());
        }
    }
}

/// Replaces the descendant run following `row_id` with its current
/// projection.
///
/// Used after a row's expansion flag changed. Rows not present in `table`
/// are left alone since an ancestor already hides them. Returns `false`
/// when the outline is in search mode and the caller must project fully.
pub fn resplice_descendants(outline: &Outline, table: &mut ShadowTable, row_id: &str) -> bool {
    if outline.search_visible().is_some() {
        return false;
    }
    let Some(index) = table.index_of(row_id) else {
        return true;
    };

    let start = index + 1;
    let end = table.rows[start..]
        .iter()
        .position(|id| !outline.is_descendant(id, row_id))
        .map_or(table.rows.len(), |offset| start + offset);

    let replacement = project_descendants(outline, row_id);
    table.rows.splice(start..end, replacement);
    true
}

/// Entries of `table` with their indent levels.
pub fn entries(outline: &Outline, table: &ShadowTable) -> Vec<ShadowTableEntry> {
    table
        .rows()
        .iter()
        .enumerate()
        .map(|(index, row_id)| ShadowTableEntry {
            row_id: row_id.clone(),
            index,
            level: outline.level(row_id),
        })
        .collect()
}
