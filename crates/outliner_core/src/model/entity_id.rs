//! Typed hierarchical identifiers.
//!
//! # Responsibility
//! - Identify accounts, folders, outlines, rows and images with one value type.
//! - Provide a stable text form used as persisted key.
//!
//! # Invariants
//! - Equality, hashing and ordering are structural.
//! - The ownership path of an id is derived from its fields only.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Numeric account discriminator (local, cloud, ...).
pub type AccountId = i64;

/// Identifier for every addressable entity of the outliner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityId {
    Account {
        account_id: AccountId,
    },
    Folder {
        account_id: AccountId,
        folder_id: String,
    },
    Outline {
        account_id: AccountId,
        folder_id: String,
        outline_uuid: String,
    },
    Row {
        account_id: AccountId,
        outline_uuid: String,
        row_uuid: String,
    },
    Image {
        account_id: AccountId,
        outline_uuid: String,
        row_uuid: String,
        image_uuid: String,
    },
}

impl EntityId {
    pub fn account(account_id: AccountId) -> Self {
        Self::Account { account_id }
    }

    pub fn folder(account_id: AccountId, folder_id: impl Into<String>) -> Self {
        Self::Folder {
            account_id,
            folder_id: folder_id.into(),
        }
    }

    pub fn outline(
        account_id: AccountId,
        folder_id: impl Into<String>,
        outline_uuid: impl Into<String>,
    ) -> Self {
        Self::Outline {
            account_id,
            folder_id: folder_id.into(),
            outline_uuid: outline_uuid.into(),
        }
    }

    pub fn row(
        account_id: AccountId,
        outline_uuid: impl Into<String>,
        row_uuid: impl Into<String>,
    ) -> Self {
        Self::Row {
            account_id,
            outline_uuid: outline_uuid.into(),
            row_uuid: row_uuid.into(),
        }
    }

    pub fn image(
        account_id: AccountId,
        outline_uuid: impl Into<String>,
        row_uuid: impl Into<String>,
        image_uuid: impl Into<String>,
    ) -> Self {
        Self::Image {
            account_id,
            outline_uuid: outline_uuid.into(),
            row_uuid: row_uuid.into(),
            image_uuid: image_uuid.into(),
        }
    }

    pub fn account_id(&self) -> AccountId {
        match self {
            Self::Account { account_id }
            | Self::Folder { account_id, .. }
            | Self::Outline { account_id, .. }
            | Self::Row { account_id, .. }
            | Self::Image { account_id, .. } => *account_id,
        }
    }

    /// Folder component, present on folder and outline ids.
    pub fn folder_id(&self) -> Option<&str> {
        match self {
            Self::Folder { folder_id, .. } | Self::Outline { folder_id, .. } => Some(folder_id),
            _ => None,
        }
    }

    /// Outline component, present on outline, row and image ids.
    pub fn outline_uuid(&self) -> Option<&str> {
        match self {
            Self::Outline { outline_uuid, .. }
            | Self::Row { outline_uuid, .. }
            | Self::Image { outline_uuid, .. } => Some(outline_uuid),
            _ => None,
        }
    }

    pub fn row_uuid(&self) -> Option<&str> {
        match self {
            Self::Row { row_uuid, .. } | Self::Image { row_uuid, .. } => Some(row_uuid),
            _ => None,
        }
    }

    pub fn image_uuid(&self) -> Option<&str> {
        match self {
            Self::Image { image_uuid, .. } => Some(image_uuid),
            _ => None,
        }
    }

    /// Owning account id value.
    pub fn owning_account(&self) -> EntityId {
        Self::account(self.account_id())
    }

    /// Owning folder of a folder or outline id.
    pub fn owning_folder(&self) -> Option<EntityId> {
        self.folder_id()
            .map(|folder_id| Self::folder(self.account_id(), folder_id))
    }

    /// Owning row of an image id.
    pub fn owning_row(&self) -> Option<EntityId> {
        match self {
            Self::Image {
                account_id,
                outline_uuid,
                row_uuid,
                ..
            } => Some(Self::row(*account_id, outline_uuid.as_str(), row_uuid.as_str())),
            _ => None,
        }
    }

    /// Returns whether `self` belongs to the outline identified by `outline`.
    pub fn is_owned_by_outline(&self, outline: &EntityId) -> bool {
        match (self.outline_uuid(), outline) {
            (
                Some(uuid),
                Self::Outline {
                    account_id,
                    outline_uuid,
                    ..
                },
            ) => self.account_id() == *account_id && uuid == outline_uuid,
            _ => false,
        }
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Account { account_id } => write!(f, "account:{account_id}"),
            Self::Folder {
                account_id,
                folder_id,
            } => write!(f, "folder:{account_id}:{folder_id}"),
            Self::Outline {
                account_id,
                folder_id,
                outline_uuid,
            } => write!(f, "outline:{account_id}:{folder_id}:{outline_uuid}"),
            Self::Row {
                account_id,
                outline_uuid,
                row_uuid,
            } => write!(f, "row:{account_id}:{outline_uuid}:{row_uuid}"),
            Self::Image {
                account_id,
                outline_uuid,
                row_uuid,
                image_uuid,
            } => write!(
                f,
                "image:{account_id}:{outline_uuid}:{row_uuid}:{image_uuid}"
            ),
        }
    }
}

/// Text form of an id could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdParseError(pub String);

impl Display for EntityIdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid entity id `{}`", self.0)
    }
}

impl Error for EntityIdParseError {}

impl FromStr for EntityId {
    type Err = EntityIdParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || EntityIdParseError(value.to_string());
        let parts = value.split(':').collect::<Vec<_>>();
        let (kind, rest) = parts.split_first().ok_or_else(invalid)?;
        let (account, fields) = rest.split_first().ok_or_else(invalid)?;
        let account_id = account.parse::<AccountId>().map_err(|_| invalid())?;
        if fields.iter().any(|field| field.is_empty()) {
            return Err(invalid());
        }

        match (*kind, fields) {
            ("account", []) => Ok(Self::account(account_id)),
            ("folder", [folder_id]) => Ok(Self::folder(account_id, *folder_id)),
            ("outline", [folder_id, outline_uuid]) => {
                Ok(Self::outline(account_id, *folder_id, *outline_uuid))
            }
            ("row", [outline_uuid, row_uuid]) => {
                Ok(Self::row(account_id, *outline_uuid, *row_uuid))
            }
            ("image", [outline_uuid, row_uuid, image_uuid]) => Ok(Self::image(
                account_id,
                *outline_uuid,
                *row_uuid,
                *image_uuid,
            )),
            _ => Err(invalid()),
        }
    }
}
