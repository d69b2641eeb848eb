//! Account context: folders, tags and the outlines they own.
//!
//! # Responsibility
//! - Own folder and tag lists for one account.
//! - Hold open outlines and apply account-level cascades to them.
//!
//! # Invariants
//! - Every held outline belongs to this account and to an existing folder.
//! - Tag names are unique per account, compared case-insensitively.
//! - Deleting a tag removes it from every held outline; deleting a folder
//!   drops its outlines.
//!
//! # See also
//! - `OutlineService::delete_tag` and `OutlineService::delete_folder`
//!   extend both cascades to stored outlines.

use crate::model::entity_id::{AccountId, EntityId};
use crate::model::outline::Outline;
use crate::model::tag::Tag;
use log::info;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type AccountResult<T> = Result<T, AccountError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// Name is blank after trim.
    InvalidName,
    FolderNotFound(String),
    TagNotFound(String),
    DuplicateTagName(String),
    OutlineNotFound(EntityId),
    /// Outline id names another account or is not an outline id.
    ForeignOutline(EntityId),
}

impl Display for AccountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "name must not be blank"),
            Self::FolderNotFound(id) => write!(f, "folder not found: {id}"),
            Self::TagNotFound(id) => write!(f, "tag not found: {id}"),
            Self::DuplicateTagName(name) => write!(f, "tag already exists: {name}"),
            Self::OutlineNotFound(id) => write!(f, "outline not found: {id}"),
            Self::ForeignOutline(id) => write!(f, "outline does not belong to this account: {id}"),
        }
    }
}

impl Error for AccountError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: EntityId,
    pub name: String,
}

impl Folder {
    pub fn folder_id(&self) -> &str {
        self.id.folder_id().unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct AccountContext {
    account_id: AccountId,
    folders: Vec<Folder>,
    tags: Vec<Tag>,
    outlines: BTreeMap<EntityId, Outline>,
}

impl AccountContext {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            folders: Vec::new(),
            tags: Vec::new(),
            outlines: BTreeMap::new(),
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn id(&self) -> EntityId {
        EntityId::account(self.account_id)
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn folder(&self, folder_id: &str) -> Option<&Folder> {
        self.folders.iter().find(|folder| folder.folder_id() == folder_id)
    }

    pub fn create_folder(&mut self, name: &str) -> AccountResult<EntityId> {
        let name = normalize_name(name)?;
        let id = EntityId::folder(self.account_id, Uuid::new_v4().to_string());
        self.folders.push(Folder {
            id: id.clone(),
            name,
        });
        Ok(id)
    }

    pub fn rename_folder(&mut self, folder_id: &str, name: &str) -> AccountResult<()> {
        let name = normalize_name(name)?;
        let folder = self
            .folders
            .iter_mut()
            .find(|folder| folder.folder_id() == folder_id)
            .ok_or_else(|| AccountError::FolderNotFound(folder_id.to_string()))?;
        folder.name = name;
        Ok(())
    }

    /// Removes a folder and returns the outlines it held.
    pub fn delete_folder(&mut self, folder_id: &str) -> AccountResult<Vec<Outline>> {
        let index = self
            .folders
            .iter()
            .position(|folder| folder.folder_id() == folder_id)
            .ok_or_else(|| AccountError::FolderNotFound(folder_id.to_string()))?;
        self.folders.remove(index);

        let doomed = self
            .outlines
            .keys()
            .filter(|id| id.folder_id() == Some(folder_id))
            .cloned()
            .collect::<Vec<_>>();
        let removed = doomed
            .iter()
            .filter_map(|id| self.outlines.remove(id))
            .collect::<Vec<_>>();
        info!(
            "event=folder_delete module=account status=ok account={} folder={} outlines={}",
            self.account_id,
            folder_id,
            removed.len()
        );
        Ok(removed)
    }

    /// Creates an empty outline in `folder_id` and holds it.
    pub fn create_outline(&mut self, folder_id: &str, title: Option<String>) -> AccountResult<EntityId> {
        if self.folder(folder_id).is_none() {
            return Err(AccountError::FolderNotFound(folder_id.to_string()));
        }
        let outline = Outline::create(self.account_id, folder_id, title);
        let id = outline.id().clone();
        self.outlines.insert(id.clone(), outline);
        Ok(id)
    }

    /// Holds an outline built elsewhere, e.g. opened from a store.
    pub fn insert_outline(&mut self, outline: Outline) -> AccountResult<()> {
        let id = outline.id().clone();
        let folder_id = match &id {
            EntityId::Outline {
                account_id,
                folder_id,
                ..
            } if *account_id == self.account_id => folder_id.clone(),
            _ => return Err(AccountError::ForeignOutline(id)),
        };
        if self.folder(&folder_id).is_none() {
            return Err(AccountError::FolderNotFound(folder_id));
        }
        self.outlines.insert(id, outline);
        Ok(())
    }

    pub fn outline(&self, id: &EntityId) -> Option<&Outline> {
        self.outlines.get(id)
    }

    pub fn outline_mut(&mut self, id: &EntityId) -> Option<&mut Outline> {
        self.outlines.get_mut(id)
    }

    pub fn outlines(&self) -> impl Iterator<Item = &Outline> {
        self.outlines.values()
    }

    pub fn outlines_in<'a>(&'a self, folder_id: &'a str) -> impl Iterator<Item = &'a Outline> + 'a {
        self.outlines
            .values()
            .filter(move |outline| outline.id().folder_id() == Some(folder_id))
    }

    pub fn remove_outline(&mut self, id: &EntityId) -> AccountResult<Outline> {
        self.outlines
            .remove(id)
            .ok_or_else(|| AccountError::OutlineNotFound(id.clone()))
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, tag_id: &str) -> Option<&Tag> {
        self.tags.iter().find(|tag| tag.id == tag_id)
    }

    pub fn tag_named(&self, name: &str) -> Option<&Tag> {
        let name = name.trim();
        self.tags.iter().find(|tag| tag.name.eq_ignore_ascii_case(name))
    }

    pub fn create_tag(&mut self, name: &str) -> AccountResult<Tag> {
        let name = normalize_name(name)?;
        if self.tag_named(&name).is_some() {
            return Err(AccountError::DuplicateTagName(name));
        }
        let tag = Tag::new(&name);
        self.tags.push(tag.clone());
        Ok(tag)
    }

    pub fn rename_tag(&mut self, tag_id: &str, name: &str) -> AccountResult<()> {
        let name = normalize_name(name)?;
        if self
            .tag_named(&name)
            .is_some_and(|existing| existing.id != tag_id)
        {
            return Err(AccountError::DuplicateTagName(name));
        }
        let tag = self
            .tags
            .iter_mut()
            .find(|tag| tag.id == tag_id)
            .ok_or_else(|| AccountError::TagNotFound(tag_id.to_string()))?;
        tag.name = name;
        Ok(())
    }

    /// Associates an existing tag with a held outline.
    pub fn tag_outline(&mut self, outline_id: &EntityId, tag_id: &str) -> AccountResult<bool> {
        if self.tag(tag_id).is_none() {
            return Err(AccountError::TagNotFound(tag_id.to_string()));
        }
        let outline = self
            .outlines
            .get_mut(outline_id)
            .ok_or_else(|| AccountError::OutlineNotFound(outline_id.clone()))?;
        Ok(outline.add_tag(tag_id).is_ok())
    }

    pub fn outlines_tagged<'a>(&'a self, tag_id: &'a str) -> impl Iterator<Item = &'a Outline> + 'a {
        self.outlines
            .values()
            .filter(move |outline| outline.has_tag(tag_id))
    }

    /// Deletes a tag and strips it from every held outline, loaded or not.
    /// Returns the ids of the outlines that changed.
    pub fn delete_tag(&mut self, tag_id: &str) -> AccountResult<Vec<EntityId>> {
        let index = self
            .tags
            .iter()
            .position(|tag| tag.id == tag_id)
            .ok_or_else(|| AccountError::TagNotFound(tag_id.to_string()))?;
        self.tags.remove(index);

        let mut changed = Vec::new();
        for outline in self.outlines.values_mut() {
            if outline.remove_tag(tag_id).is_ok() {
                changed.push(outline.id().clone());
            }
        }
        info!(
            "event=tag_delete module=account status=ok account={} outlines={}",
            self.account_id,
            changed.len()
        );
        Ok(changed)
    }
}

fn normalize_name(name: &str) -> AccountResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(AccountError::InvalidName)
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{AccountContext, AccountError};
    use crate::model::outline::Outline;

    #[test]
    fn folder_delete_drops_its_outlines() {
        let mut account = AccountContext::new(7);
        let keep = account.create_folder("Keep").unwrap();
        let drop = account.create_folder("Drop").unwrap();
        let kept = account
            .create_outline(keep.folder_id().unwrap(), None)
            .unwrap();
        account
            .create_outline(drop.folder_id().unwrap(), None)
            .unwrap();

        let removed = account.delete_folder(drop.folder_id().unwrap()).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(account.outlines().count(), 1);
        assert!(account.outline(&kept).is_some());
    }

    #[test]
    fn tag_names_are_unique_ignoring_case() {
        let mut account = AccountContext::new(7);
        account.create_tag(" Work ").unwrap();
        assert_eq!(
            account.create_tag("work"),
            Err(AccountError::DuplicateTagName("work".to_string()))
        );
        assert_eq!(account.create_tag("  "), Err(AccountError::InvalidName));
    }

    #[test]
    fn foreign_outlines_are_rejected() {
        let mut account = AccountContext::new(7);
        let folder = account.create_folder("F").unwrap();
        let foreign = Outline::create(8, folder.folder_id().unwrap(), None);
        assert!(matches!(
            account.insert_outline(foreign),
            Err(AccountError::ForeignOutline(_))
        ));
    }
}
