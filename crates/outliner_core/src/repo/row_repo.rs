//! Outline persistence contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist outline metadata, tag associations, rows, child order and
//!   images.
//! - Decode rows one at a time so a damaged row is rejected without
//!   failing the whole load.
//!
//! # Invariants
//! - `save_rows` replaces the stored tree of an outline atomically.
//! - Rows come back in the order they were saved; child order is kept per
//!   container.
//! - Deleting an outline removes its rows, order, images and tags.
//! - Account-level cascades (tag removal, folder deletion) reach every
//!   stored outline of the account, not only those held in memory.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::entity_id::{AccountId, EntityId};
use crate::model::image::Image;
use crate::model::outline::{CursorCoordinates, OutlineRecord};
use crate::model::row::{Row, RowId};
use crate::model::row_set::{RejectedRow, RowSet};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Parent key used in `row_order` for the outline root.
const ROOT_PARENT: &str = "";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Outline record does not exist.
    NotFound(EntityId),
    /// Id is not an outline id.
    NotAnOutline(EntityId),
    /// Persisted outline metadata cannot be decoded.
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "outline not found: {id}"),
            Self::NotAnOutline(id) => write!(f, "not an outline id: {id}"),
            Self::InvalidData(message) => write!(f, "invalid outline data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "row store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "row store requires table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "row store requires column `{column}` in table `{table}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence collaborator for outlines.
pub trait RowStore {
    /// Inserts or replaces outline metadata and tag associations.
    fn save_outline(&self, record: &OutlineRecord) -> StoreResult<()>;
    fn load_outline(&self, id: &EntityId) -> StoreResult<Option<OutlineRecord>>;
    /// Outline records of one account, optionally narrowed to a folder,
    /// oldest first.
    fn list_outlines(
        &self,
        account_id: AccountId,
        folder_id: Option<&str>,
    ) -> StoreResult<Vec<OutlineRecord>>;
    /// Replaces the stored rows of an existing outline.
    fn save_rows(&self, id: &EntityId, rows: &RowSet) -> StoreResult<()>;
    /// Loads rows; undecodable rows are listed in `RowSet::rejected`.
    fn load_rows(&self, id: &EntityId) -> StoreResult<RowSet>;
    /// Returns whether an outline was deleted.
    fn delete_outline(&self, id: &EntityId) -> StoreResult<bool>;
    /// Strips a tag from every stored outline of an account. Returns the
    /// outlines that carried it.
    fn remove_tag(&self, account_id: AccountId, tag_id: &str) -> StoreResult<Vec<EntityId>>;
    /// Deletes every stored outline of a folder together with its rows.
    /// Returns the deleted outline ids.
    fn delete_outlines_in_folder(
        &self,
        account_id: AccountId,
        folder_id: &str,
    ) -> StoreResult<Vec<EntityId>>;
}

/// SQLite-backed row store.
pub struct SqliteRowStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRowStore<'conn> {
    /// Wraps a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_ready(conn)?;
        Ok(Self { conn })
    }
}

impl RowStore for SqliteRowStore<'_> {
    fn save_outline(&self, record: &OutlineRecord) -> StoreResult<()> {
        let folder_id = record
            .id
            .folder_id()
            .ok_or_else(|| StoreError::NotAnOutline(record.id.clone()))?;
        let key = record.id.to_string();
        let cursor = record.cursor_coordinates.as_ref();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO outlines (
                outline_id, account_id, folder_id, title, created_at, updated_at,
                is_filtered, is_notes_hidden, cursor_row_id, cursor_is_in_notes,
                cursor_selection_start, cursor_selection_length, vertical_scroll_state
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT (outline_id) DO UPDATE SET
                title = excluded.title,
                updated_at = excluded.updated_at,
                is_filtered = excluded.is_filtered,
                is_notes_hidden = excluded.is_notes_hidden,
                cursor_row_id = excluded.cursor_row_id,
                cursor_is_in_notes = excluded.cursor_is_in_notes,
                cursor_selection_start = excluded.cursor_selection_start,
                cursor_selection_length = excluded.cursor_selection_length,
                vertical_scroll_state = excluded.vertical_scroll_state;",
            params![
                key,
                record.id.account_id(),
                folder_id,
                record.title,
                record.created_at,
                record.updated_at,
                record.is_filtered,
                record.is_notes_hidden,
                cursor.map(|value| value.row_id.as_str()),
                cursor.map(|value| value.is_in_notes),
                cursor.map(|value| value.selection_start as i64),
                cursor.map(|value| value.selection_length as i64),
                record.vertical_scroll_state,
            ],
        )?;
        tx.execute("DELETE FROM outline_tags WHERE outline_id = ?1;", [&key])?;
        for (position, tag_id) in record.tag_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO outline_tags (outline_id, tag_id, position) VALUES (?1, ?2, ?3);",
                params![key, tag_id, position as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load_outline(&self, id: &EntityId) -> StoreResult<Option<OutlineRecord>> {
        let key = id.to_string();
        let found = self
            .conn
            .query_row(
                &format!("SELECT {OUTLINE_COLUMNS} FROM outlines WHERE outline_id = ?1;"),
                [&key],
                read_outline_columns,
            )
            .optional()?;
        found
            .map(|columns| self.finish_record(columns))
            .transpose()
    }

    fn list_outlines(
        &self,
        account_id: AccountId,
        folder_id: Option<&str>,
    ) -> StoreResult<Vec<OutlineRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OUTLINE_COLUMNS}
             FROM outlines
             WHERE account_id = ?1 AND (?2 IS NULL OR folder_id = ?2)
             ORDER BY created_at ASC, outline_id ASC;"
        ))?;
        let columns = stmt
            .query_map(params![account_id, folder_id], read_outline_columns)?
            .collect::<Result<Vec<_>, _>>()?;
        columns
            .into_iter()
            .map(|columns| self.finish_record(columns))
            .collect()
    }

    fn save_rows(&self, id: &EntityId, rows: &RowSet) -> StoreResult<()> {
        let key = id.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !outline_exists(&tx, &key)? {
            return Err(StoreError::NotFound(id.clone()));
        }
        for table in ["rows", "row_order", "row_images"] {
            tx.execute(&format!("DELETE FROM {table} WHERE outline_id = ?1;"), [&key])?;
        }

        insert_order(&tx, &key, ROOT_PARENT, &rows.root_order)?;
        for row in &rows.rows {
            tx.execute(
                "INSERT INTO rows (outline_id, row_id, sync_id, is_expanded, is_complete, topic, note)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    key,
                    row.id(),
                    row.sync_id(),
                    row.is_expanded(),
                    row.is_complete(),
                    row.topic(),
                    row.note(),
                ],
            )?;
            insert_order(&tx, &key, row.id(), row.row_order())?;
        }
        for image in &rows.images {
            let row_id = image.id.row_uuid().ok_or_else(|| {
                StoreError::InvalidData(format!("image id `{}` has no owning row", image.id))
            })?;
            tx.execute(
                "INSERT INTO row_images (outline_id, row_id, image_uuid, is_in_notes, char_offset, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    key,
                    row_id,
                    image.image_uuid(),
                    image.is_in_notes,
                    image.offset as i64,
                    image.data,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load_rows(&self, id: &EntityId) -> StoreResult<RowSet> {
        let key = id.to_string();
        let outline_uuid = id
            .outline_uuid()
            .ok_or_else(|| StoreError::NotAnOutline(id.clone()))?;
        if !outline_exists(self.conn, &key)? {
            return Err(StoreError::NotFound(id.clone()));
        }

        let mut orders = load_orders(self.conn, &key)?;
        let mut set = RowSet {
            root_order: orders.remove(ROOT_PARENT).unwrap_or_default(),
            ..RowSet::default()
        };

        let mut stmt = self.conn.prepare(
            "SELECT rowid, row_id, sync_id, is_expanded, is_complete, topic, note
             FROM rows
             WHERE outline_id = ?1
             ORDER BY rowid ASC;",
        )?;
        let mut cursor = stmt.query([&key])?;
        while let Some(stored) = cursor.next()? {
            match decode_row(stored) {
                Ok(mut row) => {
                    row.set_row_order(orders.remove(row.id()).unwrap_or_default());
                    set.rows.push(row);
                }
                Err(mut rejected) => {
                    rejected.row_order = orders.remove(&rejected.row_id).unwrap_or_default();
                    warn!(
                        "event=load_rows module=repo status=rejected outline={} row={} error={}",
                        key, rejected.row_id, rejected.reason
                    );
                    set.rejected.push(rejected);
                }
            }
        }

        set.images = load_images(self.conn, &key, id.account_id(), outline_uuid)?;
        Ok(set)
    }

    fn delete_outline(&self, id: &EntityId) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM outlines WHERE outline_id = ?1;", [id.to_string()])?;
        Ok(changed > 0)
    }

    fn remove_tag(&self, account_id: AccountId, tag_id: &str) -> StoreResult<Vec<EntityId>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let keys = select_keys(
            &tx,
            "SELECT outline_tags.outline_id
             FROM outline_tags
             JOIN outlines ON outlines.outline_id = outline_tags.outline_id
             WHERE outlines.account_id = ?1 AND outline_tags.tag_id = ?2
             ORDER BY outline_tags.outline_id ASC;",
            params![account_id, tag_id],
        )?;
        for key in &keys {
            tx.execute(
                "DELETE FROM outline_tags WHERE outline_id = ?1 AND tag_id = ?2;",
                params![key, tag_id],
            )?;
        }
        tx.commit()?;
        keys.iter().map(|key| parse_outline_key(key)).collect()
    }

    fn delete_outlines_in_folder(
        &self,
        account_id: AccountId,
        folder_id: &str,
    ) -> StoreResult<Vec<EntityId>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let keys = select_keys(
            &tx,
            "SELECT outline_id
             FROM outlines
             WHERE account_id = ?1 AND folder_id = ?2
             ORDER BY outline_id ASC;",
            params![account_id, folder_id],
        )?;
        tx.execute(
            "DELETE FROM outlines WHERE account_id = ?1 AND folder_id = ?2;",
            params![account_id, folder_id],
        )?;
        tx.commit()?;
        keys.iter().map(|key| parse_outline_key(key)).collect()
    }
}

impl SqliteRowStore<'_> {
    fn finish_record(&self, columns: OutlineColumns) -> StoreResult<OutlineRecord> {
        let id = parse_outline_key(&columns.key)?;
        let mut stmt = self.conn.prepare(
            "SELECT tag_id FROM outline_tags WHERE outline_id = ?1 ORDER BY position ASC;",
        )?;
        let tag_ids = stmt
            .query_map([&columns.key], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let cursor_coordinates = match columns.cursor {
            (Some(row_id), Some(is_in_notes), Some(start), Some(length)) => {
                Some(CursorCoordinates {
                    row_id,
                    is_in_notes,
                    selection_start: to_usize(start, "outlines.cursor_selection_start")?,
                    selection_length: to_usize(length, "outlines.cursor_selection_length")?,
                })
            }
            _ => None,
        };
        Ok(OutlineRecord {
            id,
            title: columns.title,
            created_at: columns.created_at,
            updated_at: columns.updated_at,
            tag_ids,
            is_filtered: columns.is_filtered,
            is_notes_hidden: columns.is_notes_hidden,
            cursor_coordinates,
            vertical_scroll_state: columns.vertical_scroll_state,
        })
    }
}

const OUTLINE_COLUMNS: &str = "outline_id, title, created_at, updated_at, is_filtered, \
     is_notes_hidden, cursor_row_id, cursor_is_in_notes, cursor_selection_start, \
     cursor_selection_length, vertical_scroll_state";

struct OutlineColumns {
    key: String,
    title: Option<String>,
    created_at: i64,
    updated_at: i64,
    is_filtered: bool,
    is_notes_hidden: bool,
    cursor: (Option<String>, Option<bool>, Option<i64>, Option<i64>),
    vertical_scroll_state: Option<i64>,
}

fn read_outline_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutlineColumns> {
    Ok(OutlineColumns {
        key: row.get("outline_id")?,
        title: row.get("title")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        is_filtered: row.get("is_filtered")?,
        is_notes_hidden: row.get("is_notes_hidden")?,
        cursor: (
            row.get("cursor_row_id")?,
            row.get("cursor_is_in_notes")?,
            row.get("cursor_selection_start")?,
            row.get("cursor_selection_length")?,
        ),
        vertical_scroll_state: row.get("vertical_scroll_state")?,
    })
}

fn decode_row(stored: &rusqlite::Row<'_>) -> Result<Row, RejectedRow> {
    let fallback_id = stored
        .get::<_, i64>("rowid")
        .map_or_else(|_| "#?".to_string(), |rowid| format!("#{rowid}"));
    let row_id: RowId = stored.get("row_id").map_err(|err| RejectedRow {
        row_id: fallback_id,
        reason: format!("row_id: {err}"),
        row_order: Vec::new(),
    })?;
    let reject = |column: &str, reason: String| RejectedRow {
        row_id: row_id.clone(),
        reason: format!("{column}: {reason}"),
        row_order: Vec::new(),
    };

    let sync_id = stored
        .get::<_, Option<String>>("sync_id")
        .map_err(|err| reject("sync_id", err.to_string()))?;
    let is_expanded = stored_flag(stored, "is_expanded").map_err(|err| reject("is_expanded", err))?;
    let is_complete = stored_flag(stored, "is_complete").map_err(|err| reject("is_complete", err))?;
    let topic = stored
        .get::<_, Option<String>>("topic")
        .map_err(|err| reject("topic", err.to_string()))?;
    let note = stored
        .get::<_, Option<String>>("note")
        .map_err(|err| reject("note", err.to_string()))?;

    let mut row = Row::with_id(row_id.clone(), topic, note);
    if let Some(sync_id) = sync_id {
        row = row.with_sync_id(sync_id);
    }
    row.set_expanded(is_expanded);
    row.set_complete(is_complete);
    Ok(row)
}

fn stored_flag(stored: &rusqlite::Row<'_>, column: &str) -> Result<bool, String> {
    match stored.get::<_, i64>(column).map_err(|err| err.to_string())? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(format!("expected 0 or 1, got {other}")),
    }
}

fn insert_order(tx: &Transaction<'_>, key: &str, parent: &str, children: &[RowId]) -> StoreResult<()> {
    for (position, child) in children.iter().enumerate() {
        tx.execute(
            "INSERT INTO row_order (outline_id, parent_id, position, child_id) VALUES (?1, ?2, ?3, ?4);",
            params![key, parent, position as i64, child],
        )?;
    }
    Ok(())
}

fn load_orders(conn: &Connection, key: &str) -> StoreResult<HashMap<String, Vec<RowId>>> {
    let mut stmt = conn.prepare(
        "SELECT parent_id, child_id
         FROM row_order
         WHERE outline_id = ?1
         ORDER BY parent_id ASC, position ASC;",
    )?;
    let mut orders: HashMap<String, Vec<RowId>> = HashMap::new();
    let mut cursor = stmt.query([key])?;
    while let Some(entry) = cursor.next()? {
        let parent: String = entry.get(0)?;
        let child: String = entry.get(1)?;
        orders.entry(parent).or_default().push(child);
    }
    Ok(orders)
}

fn load_images(
    conn: &Connection,
    key: &str,
    account_id: AccountId,
    outline_uuid: &str,
) -> StoreResult<Vec<Image>> {
    let mut stmt = conn.prepare(
        "SELECT row_id, image_uuid, is_in_notes, char_offset, data
         FROM row_images
         WHERE outline_id = ?1
         ORDER BY rowid ASC;",
    )?;
    let mut images = Vec::new();
    let mut cursor = stmt.query([key])?;
    while let Some(entry) = cursor.next()? {
        let decoded = (|| -> rusqlite::Result<Image> {
            let row_id: String = entry.get("row_id")?;
            let image_uuid: String = entry.get("image_uuid")?;
            let offset: i64 = entry.get("char_offset")?;
            Ok(Image::new(
                EntityId::image(account_id, outline_uuid, row_id, image_uuid),
                entry.get("is_in_notes")?,
                usize::try_from(offset).unwrap_or_default(),
                entry.get("data")?,
            ))
        })();
        match decoded {
            Ok(image) => images.push(image),
            Err(err) => warn!(
                "event=load_images module=repo status=skipped outline={} error={}",
                key, err
            ),
        }
    }
    Ok(images)
}

fn parse_outline_key(key: &str) -> StoreResult<EntityId> {
    key.parse::<EntityId>()
        .map_err(|err| StoreError::InvalidData(format!("outlines.outline_id: {err}")))
}

fn select_keys<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let keys = stmt
        .query_map(params, |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}

fn outline_exists(conn: &Connection, key: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM outlines WHERE outline_id = ?1);",
        [key],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn to_usize(value: i64, column: &str) -> StoreResult<usize> {
    usize::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("negative value {value} in {column}")))
}

fn ensure_store_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 5] = [
        ("outlines", &["outline_id", "account_id", "folder_id", "title", "updated_at"]),
        ("outline_tags", &["outline_id", "tag_id", "position"]),
        ("rows", &["outline_id", "row_id", "is_expanded", "is_complete", "topic", "note"]),
        ("row_order", &["outline_id", "parent_id", "position", "child_id"]),
        ("row_images", &["outline_id", "row_id", "image_uuid", "char_offset", "data"]),
    ];
    for (table, columns) in required {
        let present = table_columns(conn, table)?;
        if present.is_empty() {
            return Err(StoreError::MissingRequiredTable(table));
        }
        if let Some(column) = columns
            .iter()
            .find(|column| !present.iter().any(|name| name.as_str() == **column))
        {
            return Err(StoreError::MissingRequiredColumn {
                table,
                column: *column,
            });
        }
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}
