//! Attribute view repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist attribute views as JSON documents keyed by id.
//! - Maintain the block -> attribute view binding index.
//! - Store mirror registrations, history entries and snapshots.
//!
//! # Invariants
//! - `save` rewrites the binding index from `row_ids` in the same
//!   connection scope, so bindings never outlive the document that
//!   declares them.
//! - History and snapshot rows are append-only.

use crate::model::av::AttributeView;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Repository interface for attribute view documents.
pub trait AttributeViewRepository {
    fn load(&self, id: &str) -> RepoResult<Option<AttributeView>>;
    /// Inserts or replaces the document and rebuilds its block bindings.
    fn save(&self, av: &AttributeView) -> RepoResult<()>;
    /// Deletes the document; bindings and mirrors cascade. Returns whether it existed.
    fn delete(&self, id: &str) -> RepoResult<bool>;
    /// Lists ids of attribute views binding `block_id` as a row, sorted.
    fn ids_for_block(&self, block_id: &str) -> RepoResult<Vec<String>>;
    fn insert_mirror(&self, mirror_id: &str, av_id: &str) -> RepoResult<()>;
    /// Returns the canonical id registered for `mirror_id`.
    fn mirror_target(&self, mirror_id: &str) -> RepoResult<Option<String>>;
    /// Fails when an entry already exists for `(av.id, created)`.
    fn insert_history(&self, av: &AttributeView, created: &str) -> RepoResult<()>;
    fn load_history(&self, av_id: &str, created: &str) -> RepoResult<Option<AttributeView>>;
    fn insert_snapshot(&self, snapshot: &str, av: &AttributeView) -> RepoResult<()>;
    fn load_snapshot(&self, snapshot: &str, av_id: &str) -> RepoResult<Option<AttributeView>>;
}

/// SQLite-backed attribute view repository.
pub struct SqliteAttributeViewRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttributeViewRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AttributeViewRepository for SqliteAttributeViewRepository<'_> {
    fn load(&self, id: &str) -> RepoResult<Option<AttributeView>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM attribute_views WHERE id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|raw| decode(id, &raw)).transpose()
    }

    fn save(&self, av: &AttributeView) -> RepoResult<()> {
        let data = serde_json::to_string(av)?;
        self.conn.execute(
            "INSERT INTO attribute_views (id, name, data)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                data = excluded.data,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![av.id, av.name, data],
        )?;

        self.conn.execute(
            "DELETE FROM attribute_view_blocks WHERE av_id = ?1;",
            [av.id.as_str()],
        )?;
        let mut insert = self.conn.prepare(
            "INSERT OR IGNORE INTO attribute_view_blocks (block_id, av_id) VALUES (?1, ?2);",
        )?;
        for row_id in &av.row_ids {
            insert.execute(params![row_id, av.id])?;
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM attribute_views WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn ids_for_block(&self, block_id: &str) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT av_id FROM attribute_view_blocks WHERE block_id = ?1 ORDER BY av_id ASC;",
        )?;
        let mut rows = stmt.query([block_id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    fn insert_mirror(&self, mirror_id: &str, av_id: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO attribute_view_mirrors (mirror_id, av_id) VALUES (?1, ?2)
             ON CONFLICT(mirror_id) DO UPDATE SET av_id = excluded.av_id;",
            params![mirror_id, av_id],
        )?;
        Ok(())
    }

    fn mirror_target(&self, mirror_id: &str) -> RepoResult<Option<String>> {
        let target = self
            .conn
            .query_row(
                "SELECT av_id FROM attribute_view_mirrors WHERE mirror_id = ?1;",
                [mirror_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(target)
    }

    fn insert_history(&self, av: &AttributeView, created: &str) -> RepoResult<()> {
        let data = serde_json::to_string(av)?;
        self.conn.execute(
            "INSERT INTO attribute_view_history (av_id, created, data)
             VALUES (?1, ?2, ?3);",
            params![av.id, created, data],
        )?;
        Ok(())
    }

    fn load_history(&self, av_id: &str, created: &str) -> RepoResult<Option<AttributeView>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM attribute_view_history WHERE av_id = ?1 AND created = ?2;",
                params![av_id, created],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|raw| decode(av_id, &raw)).transpose()
    }

    fn insert_snapshot(&self, snapshot: &str, av: &AttributeView) -> RepoResult<()> {
        let data = serde_json::to_string(av)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO attribute_view_snapshots (snapshot, av_id, data)
             VALUES (?1, ?2, ?3);",
            params![snapshot, av.id, data],
        )?;
        Ok(())
    }

    fn load_snapshot(&self, snapshot: &str, av_id: &str) -> RepoResult<Option<AttributeView>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM attribute_view_snapshots WHERE snapshot = ?1 AND av_id = ?2;",
                params![snapshot, av_id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|raw| decode(av_id, &raw)).transpose()
    }
}

fn decode(id: &str, raw: &str) -> RepoResult<AttributeView> {
    serde_json::from_str(raw).map_err(|err| {
        RepoError::InvalidData(format!("attribute view `{id}` cannot be decoded: {err}"))
    })
}
