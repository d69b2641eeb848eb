//! Outline editing engine.
//! This crate is the single source of truth for row-tree, shadow table and
//! undo invariants.

pub mod command;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod shadow;
pub mod sync;

pub use command::{
    Command, CommandError, CommandHistory, CommandOutcome, CommandResult, CommandState, Operation,
    HISTORY_MAX_ENTRIES,
};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LogLevel, LoggingError};
pub use model::edit::{RowEdit, RowGroup};
pub use model::entity_id::{AccountId, EntityId, EntityIdParseError};
pub use model::image::Image;
pub use model::outline::{
    CursorCoordinates, OperationKind, Outline, OutlineError, OutlineRecord, OutlineResult,
};
pub use model::row::{Container, Row, RowId, RowStrings};
pub use model::row_set::{LoadReport, RejectedRow, RowSet};
pub use model::tag::Tag;
pub use repo::row_repo::{RowStore, SqliteRowStore, StoreError, StoreResult};
pub use search::{search_outline, SearchError, SearchHit, SearchMatches, SearchResult};
pub use service::account::{AccountContext, AccountError, Folder};
pub use service::outline_service::{OutlineService, OutlineServiceError};
pub use shadow::{ShadowTable, ShadowTableChanges, ShadowTableEntry};
pub use sync::change::{ChangeBatch, ChangeObserver};
pub use sync::dirty::DirtyRegistry;

/// Minimal health-check API for embedders.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
