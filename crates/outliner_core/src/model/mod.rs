//! Outline domain model.
//!
//! # Responsibility
//! - Define rows, images, tags and their identities.
//! - Own the `Outline` aggregate and the primitive edits it records.
//!
//! # Invariants
//! - Every entity is identified by a structural `EntityId`.
//! - Rows refer to their parent by value, never by owning pointer.

pub mod edit;
pub mod entity_id;
pub mod image;
pub mod outline;
pub mod row;
pub mod row_set;
pub mod tag;
pub mod text;
