//! Full-text search entry points.
//!
//! # Responsibility
//! - Expose block queries backed by the two SQLite FTS5 mirrors.
//! - Keep result shaping inside core.

pub mod fts;
