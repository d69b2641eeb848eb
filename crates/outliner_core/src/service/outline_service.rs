//! Outline lifecycle use-case service.
//!
//! # Responsibility
//! - Create, open, save, close and delete outlines against a `RowStore`.
//! - Wire every managed outline to one shared `DirtyRegistry`.
//! - Run account cascades (tag and folder deletion) against the store and
//!   the held outlines together.
//!
//! # Invariants
//! - `close_outline` saves before paging rows out; a failed save leaves
//!   the outline loaded.
//! - A successful save clears the outline's dirty entries.
//! - Cascades touch the store first; the account changes only after the
//!   store succeeded.

use crate::model::entity_id::{AccountId, EntityId};
use crate::model::outline::Outline;
use crate::model::row_set::LoadReport;
use crate::repo::row_repo::{RowStore, StoreError};
use crate::service::account::{AccountContext, AccountError};
use crate::sync::change::ChangeObserver;
use crate::sync::dirty::DirtyRegistry;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type OutlineServiceResult<T> = Result<T, OutlineServiceError>;

#[derive(Debug)]
pub enum OutlineServiceError {
    OutlineNotFound(EntityId),
    Account(AccountError),
    Store(StoreError),
}

impl Display for OutlineServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutlineNotFound(id) => write!(f, "outline not found: {id}"),
            Self::Account(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OutlineServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Account(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::OutlineNotFound(_) => None,
        }
    }
}

impl From<StoreError> for OutlineServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::OutlineNotFound(id),
            other => Self::Store(other),
        }
    }
}

impl From<AccountError> for OutlineServiceError {
    fn from(value: AccountError) -> Self {
        Self::Account(value)
    }
}

/// Outline lifecycle facade.
pub struct OutlineService<S: RowStore> {
    store: S,
    registry: Arc<DirtyRegistry>,
}

impl<S: RowStore> OutlineService<S> {
    pub fn new(store: S) -> Self {
        Self::with_registry(store, Arc::new(DirtyRegistry::new()))
    }

    pub fn with_registry(store: S, registry: Arc<DirtyRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &Arc<DirtyRegistry> {
        &self.registry
    }

    /// Creates an empty outline and persists it right away.
    pub fn create_outline(
        &self,
        account_id: AccountId,
        folder_id: &str,
        title: Option<String>,
    ) -> OutlineServiceResult<Outline> {
        let mut outline = Outline::create(account_id, folder_id, title);
        self.attach(&mut outline);
        self.save_outline(&outline)?;
        Ok(outline)
    }

    /// Loads metadata and rows. Damaged rows are skipped and reported.
    pub fn open_outline(&self, id: &EntityId) -> OutlineServiceResult<(Outline, LoadReport)> {
        let record = self
            .store
            .load_outline(id)?
            .ok_or_else(|| OutlineServiceError::OutlineNotFound(id.clone()))?;
        let mut outline = Outline::from_record(record);
        self.attach(&mut outline);
        let rows = self.store.load_rows(id)?;
        let report = outline.load(rows);
        if !report.is_clean() {
            warn!(
                "event=outline_open module=service status=partial outline={} rejected={} reparented={} pruned={} unreachable={}",
                id,
                report.rejected.len(),
                report.reparented.len(),
                report.pruned_references.len(),
                report.unreachable.len()
            );
        }
        Ok((outline, report))
    }

    /// Persists metadata, and rows when loaded.
    pub fn save_outline(&self, outline: &Outline) -> OutlineServiceResult<()> {
        let result = self.store.save_outline(&outline.record()).and_then(|()| {
            if outline.is_loaded() {
                self.store.save_rows(outline.id(), &outline.row_set())
            } else {
                Ok(())
            }
        });
        match result {
            Ok(()) => {
                self.registry.take(outline.id());
                info!(
                    "event=outline_save module=service status=ok outline={} rows={}",
                    outline.id(),
                    outline.row_count()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=outline_save module=service status=error outline={} error={}",
                    outline.id(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Saves only when the registry has pending changes. Returns whether a
    /// save happened.
    pub fn save_if_dirty(&self, outline: &Outline) -> OutlineServiceResult<bool> {
        if !self.registry.is_dirty(outline.id()) {
            return Ok(false);
        }
        self.save_outline(outline)?;
        Ok(true)
    }

    /// Saves, then pages rows out.
    pub fn close_outline(&self, outline: &mut Outline) -> OutlineServiceResult<()> {
        self.save_outline(outline)?;
        if outline.is_loaded() {
            outline.unload();
        }
        self.registry.take(outline.id());
        Ok(())
    }

    pub fn delete_outline(&self, id: &EntityId) -> OutlineServiceResult<()> {
        if !self.store.delete_outline(id)? {
            return Err(OutlineServiceError::OutlineNotFound(id.clone()));
        }
        self.registry.take(id);
        info!("event=outline_delete module=service status=ok outline={}", id);
        Ok(())
    }

    /// Outline metadata of one account, optionally narrowed to a folder.
    pub fn list_outlines(
        &self,
        account_id: AccountId,
        folder_id: Option<&str>,
    ) -> OutlineServiceResult<Vec<EntityId>> {
        Ok(self
            .store
            .list_outlines(account_id, folder_id)?
            .into_iter()
            .map(|record| record.id)
            .collect())
    }

    /// Deletes an account tag and strips it from every outline that
    /// carries it, stored or held. Returns the changed outline ids.
    pub fn delete_tag(
        &self,
        account: &mut AccountContext,
        tag_id: &str,
    ) -> OutlineServiceResult<Vec<EntityId>> {
        if account.tag(tag_id).is_none() {
            return Err(AccountError::TagNotFound(tag_id.to_string()).into());
        }
        let mut changed = self.store.remove_tag(account.account_id(), tag_id)?;
        changed.extend(account.delete_tag(tag_id)?);
        changed.sort();
        changed.dedup();
        info!(
            "event=tag_delete module=service status=ok account={} tag={} outlines={}",
            account.account_id(),
            tag_id,
            changed.len()
        );
        Ok(changed)
    }

    /// Deletes a folder with every outline in it, stored or held. Returns
    /// the deleted outline ids.
    pub fn delete_folder(
        &self,
        account: &mut AccountContext,
        folder_id: &str,
    ) -> OutlineServiceResult<Vec<EntityId>> {
        if account.folder(folder_id).is_none() {
            return Err(AccountError::FolderNotFound(folder_id.to_string()).into());
        }
        let mut deleted = self
            .store
            .delete_outlines_in_folder(account.account_id(), folder_id)?;
        deleted.extend(
            account
                .delete_folder(folder_id)?
                .into_iter()
                .map(|outline| outline.id().clone()),
        );
        deleted.sort();
        deleted.dedup();
        for id in &deleted {
            self.registry.take(id);
        }
        info!(
            "event=folder_delete module=service status=ok account={} folder={} outlines={}",
            account.account_id(),
            folder_id,
            deleted.len()
        );
        Ok(deleted)
    }

    fn attach(&self, outline: &mut Outline) {
        let registry: Arc<dyn ChangeObserver> = self.registry.clone();
        outline.set_change_observer(Some(registry));
    }
}
