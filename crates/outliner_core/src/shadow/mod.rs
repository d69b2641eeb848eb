//! Shadow table: the flattened, visibility-filtered view of an outline.
//!
//! # Responsibility
//! - Project the row tree into display order (`projector`).
//! - Describe the change between two projections (`diff`).
//!
//! # See also
//! - `crate::model::outline::Outline::refresh_shadow_table`

pub mod diff;
pub mod projector;

pub use diff::{diff_projections, ShadowTableChanges};
pub use projector::{ShadowTable, ShadowTableEntry};
