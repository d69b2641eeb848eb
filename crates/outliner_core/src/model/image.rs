//! Row image attachment model.
//!
//! # Invariants
//! - An image is owned by exactly one row (`id` is an `EntityId::Image`).
//! - `offset` is a char offset into the owning topic or note text.

use crate::model::entity_id::EntityId;
use serde::{Deserialize, Serialize};

/// Image attachment stored apart from the row text and spliced in on render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: EntityId,
    /// `true` when the image lives in the note, `false` for the topic.
    pub is_in_notes: bool,
    pub offset: usize,
    pub data: Vec<u8>,
}

impl Image {
    pub fn new(id: EntityId, is_in_notes: bool, offset: usize, data: Vec<u8>) -> Self {
        Self {
            id,
            is_in_notes,
            offset,
            data,
        }
    }

    /// Image uuid component, empty when `id` is not an image id.
    pub fn image_uuid(&self) -> &str {
        self.id.image_uuid().unwrap_or_default()
    }

    /// Copies this image onto another row, keeping the image uuid.
    pub fn reassigned(&self, account_id: i64, outline_uuid: &str, row_uuid: &str) -> Self {
        Self {
            id: EntityId::image(account_id, outline_uuid, row_uuid, self.image_uuid()),
            is_in_notes: self.is_in_notes,
            offset: self.offset,
            data: self.data.clone(),
        }
    }
}
