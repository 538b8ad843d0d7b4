//! Core domain logic for the blockview block store.
//!
//! Keeps the primary block table and its full-text mirrors consistent,
//! and renders attribute views over indexed blocks.

pub mod cache;
pub mod config;
pub mod db;
pub mod document;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod search;
pub mod service;

pub use cache::{parse_ial, BlockIal, ContentCache};
pub use config::{IndexConfig, KernelConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use document::{
    BlockLocation, ContentResolver, DocumentSource, DocumentTree, InMemoryDocumentSource,
    ResolveError, TreeNode,
};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::av::{
    AttributeView, AttributeViewError, Cell, CellValue, Key, KeyType, KeyValues, LayoutType, View,
};
pub use model::block::{Block, BlockId};
pub use notify::{EventBus, ViewEvent};
pub use repo::{RepoError, RepoResult};
pub use search::fts::{search_blocks, BlockSearchHit, BlockSearchQuery, SearchError, SearchResult};
pub use service::av_service::{AttributeViewStore, AvError, AvResult, BlockAttributeViewKeys};
pub use service::cell_mutator::CellMutator;
pub use service::index_service::{IndexCoordinator, IndexOutcome};
pub use service::view_renderer::{ViewPayload, ViewRenderer};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns the newest schema version this build can open.
pub fn schema_version() -> u32 {
    db::migrations::latest_version()
}
