//! In-memory outline search.
//!
//! # Responsibility
//! - Match query text against row topics and notes.
//! - Compute the forced-visible set used by search-mode projection.
//!
//! # See also
//! - `crate::model::outline::Outline::search`

pub mod matcher;

pub use matcher::{search_outline, SearchError, SearchHit, SearchMatches, SearchResult};
