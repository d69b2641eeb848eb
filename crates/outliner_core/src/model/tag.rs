//! Account-level tag model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag owned by an account and referenced by outlines through `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

impl Tag {
    /// Creates a tag with a generated id and a trimmed name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.as_ref().trim().to_string(),
        }
    }
}
