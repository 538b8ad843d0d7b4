//! Domain model for blocks and attribute views.
//!
//! # Responsibility
//! - Define the block row shape shared by the primary table and FTS mirrors.
//! - Define attribute views, keys, rows and cells with their mutation rules.
//!
//! # Invariants
//! - Blocks and attribute views are identified by stable string ids.
//! - Attribute view cells are sparse and typed by their key.

pub mod av;
pub mod block;
