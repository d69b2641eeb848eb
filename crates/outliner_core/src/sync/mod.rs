//! Change notification surface for persistence and sync collaborators.
//!
//! # Responsibility
//! - Batch dirty entity ids per logical operation (`change`).
//! - Provide an in-crate observer that accumulates them (`dirty`).
//!
//! # See also
//! - `crate::service::outline_service` for the save driver.

pub mod change;
pub mod dirty;
