//! Outline document aggregate.
//!
//! # Responsibility
//! - Own every row of one document keyed by id, plus the root order.
//! - Keep structure, shadow table and dirty tracking consistent under edits.
//! - Record each mutation as `RowEdit`s so it can be reverted exactly.
//!
//! # Invariants
//! - Ids reachable from `root_order` are exactly the keys of `keyed_rows`.
//! - Every row's `parent` names the container whose order lists it.
//! - Every mutation runs inside one change batch.
//! - The shadow table is only read through the outline; cached indices are
//!   hidden while it is stale.
//!
//! # See also
//! - `crate::shadow` for projection and diffing.
//! - `crate::command` for the undoable wrapper around the mutators.

mod ops;
mod tree;
mod view;

use crate::model::entity_id::{AccountId, EntityId};
use crate::model::image::Image;
use crate::model::row::{Container, Row, RowId};
use crate::model::row_set::{LoadReport, RowSet};
use crate::model::text::RenderCache;
use crate::search::SearchMatches;
use crate::shadow::ShadowTable;
use crate::sync::change::{ChangeObserver, DirtyTracker};
use log::{info, warn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Result type for outline operations.
pub type OutlineResult<T> = Result<T, OutlineError>;

/// Operation names used in availability errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreateRow,
    DeleteRows,
    DeleteAllRows,
    IndentRows,
    OutdentRows,
    CompleteRows,
    UncompleteRows,
    CreateNotes,
    DeleteNotes,
    ExpandRows,
    CollapseRows,
    ExpandAll,
    CollapseAll,
    SplitRow,
    MoveRows,
    PasteRows,
    UpdateText,
    AddTag,
    RemoveTag,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateRow => "create_row",
            Self::DeleteRows => "delete_rows",
            Self::DeleteAllRows => "delete_all_rows",
            Self::IndentRows => "indent_rows",
            Self::OutdentRows => "outdent_rows",
            Self::CompleteRows => "complete_rows",
            Self::UncompleteRows => "uncomplete_rows",
            Self::CreateNotes => "create_notes",
            Self::DeleteNotes => "delete_notes",
            Self::ExpandRows => "expand_rows",
            Self::CollapseRows => "collapse_rows",
            Self::ExpandAll => "expand_all",
            Self::CollapseAll => "collapse_all",
            Self::SplitRow => "split_row",
            Self::MoveRows => "move_rows",
            Self::PasteRows => "paste_rows",
            Self::UpdateText => "update_text",
            Self::AddTag => "add_tag",
            Self::RemoveTag => "remove_tag",
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by outline mutators and queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineError {
    RowNotFound(RowId),
    ContainerNotFound(Container),
    /// Tree state contradicts the aggregate invariants.
    StructuralInvariantViolation(String),
    /// Preconditions of the operation are not met; nothing was changed.
    Unavailable(OperationKind),
    /// Rows are paged out.
    NotLoaded(EntityId),
}

impl Display for OutlineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RowNotFound(id) => write!(f, "row not found: {id}"),
            Self::ContainerNotFound(container) => write!(f, "container not found: {container:?}"),
            Self::StructuralInvariantViolation(message) => {
                write!(f, "structural invariant violated: {message}")
            }
            Self::Unavailable(operation) => write!(f, "operation unavailable: {operation}"),
            Self::NotLoaded(id) => write!(f, "outline is not loaded: {id}"),
        }
    }
}

impl Error for OutlineError {}

/// Opaque editor resume position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorCoordinates {
    pub row_id: RowId,
    pub is_in_notes: bool,
    pub selection_start: usize,
    pub selection_length: usize,
}

/// Outline metadata as persisted apart from its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineRecord {
    pub id: EntityId,
    pub title: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub tag_ids: Vec<String>,
    pub is_filtered: bool,
    pub is_notes_hidden: bool,
    pub cursor_coordinates: Option<CursorCoordinates>,
    pub vertical_scroll_state: Option<i64>,
}

#[derive(Debug)]
struct ActiveSearch {
    text: String,
    matches: SearchMatches,
}

/// One outline document.
#[derive(Debug)]
pub struct Outline {
    id: EntityId,
    title: Option<String>,
    created_at: i64,
    updated_at: i64,
    tag_ids: Vec<String>,
    keyed_rows: HashMap<RowId, Row>,
    root_order: Vec<RowId>,
    images: HashMap<RowId, Vec<Image>>,
    is_filtered: bool,
    is_notes_hidden: bool,
    shadow_table: Option<ShadowTable>,
    shadow_stale: bool,
    search: Option<ActiveSearch>,
    cursor_coordinates: Option<CursorCoordinates>,
    vertical_scroll_state: Option<i64>,
    is_loaded: bool,
    changes: DirtyTracker,
    render_cache: RenderCache,
    generation: u64,
    next_generation: u64,
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

impl Outline {
    /// Creates an empty, loaded outline with the given id.
    pub fn new(id: EntityId, title: Option<String>) -> Self {
        let now = now_epoch_ms();
        let mut outline = Self::from_record(OutlineRecord {
            id,
            title,
            created_at: now,
            updated_at: now,
            tag_ids: Vec::new(),
            is_filtered: false,
            is_notes_hidden: false,
            cursor_coordinates: None,
            vertical_scroll_state: None,
        });
        outline.is_loaded = true;
        outline.shadow_table = Some(ShadowTable::default());
        outline.shadow_stale = false;
        outline
    }

    /// Creates an empty, loaded outline with a fresh uuid in `folder_id`.
    pub fn create(account_id: AccountId, folder_id: &str, title: Option<String>) -> Self {
        let id = EntityId::outline(account_id, folder_id, Uuid::new_v4().to_string());
        info!("event=outline_create module=outline status=ok outline={}", id);
        Self::new(id, title)
    }

    /// Rebuilds an outline from persisted metadata. Rows stay paged out
    /// until `load` is called.
    pub fn from_record(record: OutlineRecord) -> Self {
        let changes = DirtyTracker::new(record.id.clone());
        Self {
            id: record.id,
            title: record.title,
            created_at: record.created_at,
            updated_at: record.updated_at,
            tag_ids: record.tag_ids,
            keyed_rows: HashMap::new(),
            root_order: Vec::new(),
            images: HashMap::new(),
            is_filtered: record.is_filtered,
            is_notes_hidden: record.is_notes_hidden,
            shadow_table: None,
            shadow_stale: true,
            search: None,
            cursor_coordinates: record.cursor_coordinates,
            vertical_scroll_state: record.vertical_scroll_state,
            is_loaded: false,
            changes,
            render_cache: RenderCache::default(),
            generation: 0,
            next_generation: 1,
        }
    }

    /// Persistable metadata snapshot.
    pub fn record(&self) -> OutlineRecord {
        OutlineRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            tag_ids: self.tag_ids.clone(),
            is_filtered: self.is_filtered,
            is_notes_hidden: self.is_notes_hidden,
            cursor_coordinates: self.cursor_coordinates.clone(),
            vertical_scroll_state: self.vertical_scroll_state,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn account_id(&self) -> AccountId {
        self.id.account_id()
    }

    pub fn outline_uuid(&self) -> &str {
        self.id.outline_uuid().unwrap_or_default()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
        self.updated_at = now_epoch_ms();
        let id = self.id.clone();
        self.changes.mark(id);
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn tag_ids(&self) -> &[String] {
        &self.tag_ids
    }

    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tag_ids.iter().any(|id| id == tag_id)
    }

    pub fn is_filtered(&self) -> bool {
        self.is_filtered
    }

    pub fn is_notes_hidden(&self) -> bool {
        self.is_notes_hidden
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn cursor_coordinates(&self) -> Option<&CursorCoordinates> {
        self.cursor_coordinates.as_ref()
    }

    pub fn set_cursor_coordinates(&mut self, coordinates: Option<CursorCoordinates>) {
        self.cursor_coordinates = coordinates;
    }

    pub fn vertical_scroll_state(&self) -> Option<i64> {
        self.vertical_scroll_state
    }

    pub fn set_vertical_scroll_state(&mut self, state: Option<i64>) {
        self.vertical_scroll_state = state;
    }

    /// Edit generation; changes on every mutation and on revert.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn restore_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    fn bump_generation(&mut self) {
        self.generation = self.next_generation;
        self.next_generation += 1;
        self.updated_at = now_epoch_ms();
    }

    pub fn row(&self, id: &str) -> Option<&Row> {
        self.keyed_rows.get(id)
    }

    pub fn root_order(&self) -> &[RowId] {
        &self.root_order
    }

    /// Number of rows in the document, visible or not.
    pub fn row_count(&self) -> usize {
        self.keyed_rows.len()
    }

    /// Child order of a container.
    pub fn rows_in(&self, container: &Container) -> OutlineResult<&[RowId]> {
        match container {
            Container::Root => Ok(&self.root_order),
            Container::Row(id) => self
                .keyed_rows
                .get(id)
                .map(Row::row_order)
                .ok_or_else(|| OutlineError::ContainerNotFound(container.clone())),
        }
    }

    /// Images of one row, topic and note, in no particular order.
    pub fn images_of(&self, row_id: &str) -> &[Image] {
        self.images.get(row_id).map_or(&[], Vec::as_slice)
    }

    /// Entity id of a row of this outline.
    pub fn row_entity_id(&self, row_id: &str) -> EntityId {
        EntityId::row(self.account_id(), self.outline_uuid(), row_id)
    }

    pub fn set_change_observer(&mut self, observer: Option<Arc<dyn ChangeObserver>>) {
        self.changes.set_observer(observer);
    }

    /// Opens a change batch; batches nest.
    pub fn begin_batch(&mut self) {
        self.changes.begin();
    }

    /// Closes a change batch; the outermost close notifies the observer.
    pub fn end_batch(&mut self) {
        self.changes.end();
    }

    pub fn mark_dirty(&mut self, id: EntityId) {
        self.changes.mark(id);
    }

    pub fn mark_dirty_rows<I, S>(&mut self, row_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for row_id in row_ids {
            let id = self.row_entity_id(row_id.as_ref());
            self.changes.mark(id);
        }
    }

    fn ensure_loaded(&self) -> OutlineResult<()> {
        if self.is_loaded {
            Ok(())
        } else {
            Err(OutlineError::NotLoaded(self.id.clone()))
        }
    }

    /// Pages rows in and rebuilds the shadow table.
    ///
    /// Order entries naming unknown rows, duplicates and rows unreachable
    /// from the root are dropped and reported instead of failing the load.
    /// Children of a rejected row take its place in its parent's order.
    pub fn load(&mut self, set: RowSet) -> LoadReport {
        let RowSet {
            root_order,
            rows,
            images,
            rejected,
        } = set;

        let mut claim = RowClaim {
            available: rows
                .into_iter()
                .map(|row| (row.id().to_string(), row))
                .collect(),
            orphaned_orders: rejected
                .iter()
                .map(|rejected| (rejected.row_id.clone(), rejected.row_order.clone()))
                .collect(),
            seen: HashSet::new(),
            keyed_rows: HashMap::new(),
            report: LoadReport {
                rejected,
                ..LoadReport::default()
            },
        };
        let root_order = claim.children(&root_order, &Container::Root);
        let RowClaim {
            available,
            keyed_rows,
            mut report,
            ..
        } = claim;

        report.unreachable = available.into_keys().collect();
        report.unreachable.sort();
        for id in &report.unreachable {
            warn!(
                "event=outline_load module=outline status=pruned error_code=row_unreachable outline={} row={}",
                self.id, id
            );
        }
        for id in &report.reparented {
            warn!(
                "event=outline_load module=outline status=reparented error_code=parent_rejected outline={} row={}",
                self.id, id
            );
        }
        for id in &report.pruned_references {
            warn!(
                "event=outline_load module=outline status=pruned error_code=dangling_reference outline={} row={}",
                self.id, id
            );
        }

        let mut keyed_images: HashMap<RowId, Vec<Image>> = HashMap::new();
        for image in images {
            match image.id.row_uuid() {
                Some(row_id) if keyed_rows.contains_key(row_id) => {
                    keyed_images.entry(row_id.to_string()).or_default().push(image);
                }
                _ => warn!(
                    "event=outline_load module=outline status=pruned error_code=image_orphaned outline={} image={}",
                    self.id, image.id
                ),
            }
        }

        report.loaded = keyed_rows.len();
        self.keyed_rows = keyed_rows;
        self.root_order = root_order;
        self.images = keyed_images;
        self.render_cache.clear();
        self.is_loaded = true;
        self.shadow_table = None;
        self.rebuild_shadow_table();

        info!(
            "event=outline_load module=outline status=ok outline={} rows={} rejected={}",
            self.id,
            report.loaded,
            report.rejected.len()
        );
        report
    }

    /// Pages rows out and returns them.
    ///
    /// Open batches are closed so pending dirty ids reach the observer,
    /// and the observer is asked to flush before rows are released.
    pub fn unload(&mut self) -> RowSet {
        self.changes.close_all();
        self.changes.flush();
        let set = self.row_set();

        self.keyed_rows.clear();
        self.root_order.clear();
        self.images.clear();
        self.render_cache.clear();
        self.shadow_table = None;
        self.shadow_stale = true;
        self.search = None;
        self.is_loaded = false;

        info!(
            "event=outline_unload module=outline status=ok outline={} rows={}",
            self.id,
            set.rows.len()
        );
        set
    }

    /// Snapshot of all rows in display order, with their images.
    pub fn row_set(&self) -> RowSet {
        let rows = self
            .rows_in_tree_order()
            .into_iter()
            .filter_map(|id| self.keyed_rows.get(id).cloned())
            .map(|mut row| {
                row.set_shadow_table_index(None);
                row
            })
            .collect::<Vec<_>>();
        let images = rows
            .iter()
            .flat_map(|row| self.images_of(row.id()).iter().cloned())
            .collect();
        RowSet {
            root_order: self.root_order.clone(),
            rows,
            images,
            rejected: Vec::new(),
        }
    }
}

/// Working state of `Outline::load`.
struct RowClaim {
    available: HashMap<RowId, Row>,
    /// Child order of rejected rows, keyed by the rejected id.
    orphaned_orders: HashMap<RowId, Vec<RowId>>,
    seen: HashSet<RowId>,
    keyed_rows: HashMap<RowId, Row>,
    report: LoadReport,
}

impl RowClaim {
    /// Claims the rows named by `order` for one container, then recurses
    /// into their children. A rejected row is replaced in place by its own
    /// children.
    fn children(&mut self, order: &[RowId], container: &Container) -> Vec<RowId> {
        let mut queue = order.iter().cloned().collect::<VecDeque<_>>();
        let mut kept = Vec::with_capacity(order.len());
        let mut pending = Vec::new();
        while let Some(id) = queue.pop_front() {
            if !self.seen.insert(id.clone()) {
                self.report.pruned_references.push(id);
                continue;
            }
            match self.available.remove(&id) {
                Some(mut row) => {
                    row.set_parent(container.clone());
                    row.set_shadow_table_index(None);
                    pending.push(row);
                    kept.push(id);
                }
                None => {
                    if let Some(orphans) = self.orphaned_orders.remove(&id) {
                        self.report.reparented.extend(orphans.iter().cloned());
                        for orphan in orphans.into_iter().rev() {
                            queue.push_front(orphan);
                        }
                    }
                    self.report.pruned_references.push(id);
                }
            }
        }

        for mut row in pending {
            let children = row.row_order().to_vec();
            let kept_children = self.children(&children, &row.as_container());
            row.set_row_order(kept_children);
            self.keyed_rows.insert(row.id().to_string(), row);
        }
        kept
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Outline;
    use crate::model::entity_id::EntityId;
    use crate::model::row::{Container, Row};

    /// Builds an outline from `(id, parent)` pairs in insertion order.
    pub fn outline_with(rows: &[(&str, Option<&str>)]) -> Outline {
        let mut outline = Outline::new(EntityId::outline(1, "f", "o"), Some("test".to_string()));
        for (id, parent) in rows {
            let container = parent.map_or(Container::Root, Container::from);
            let row = Row::with_id(*id, Some(id.to_uppercase()), None);
            outline.append_row(row, &container).unwrap();
        }
        outline.rebuild_shadow_table();
        outline
    }
}
