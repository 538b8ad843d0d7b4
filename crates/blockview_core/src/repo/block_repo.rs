//! Block repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Read and write block rows in the primary table and the FTS mirrors.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every statement targets exactly one [`BlockTable`]; fan-out across
//!   tables is the index coordinator's job.
//! - All three tables are keyed by `id` with identical column names.

use crate::db::{BLOCKS_FTS_CASE_INSENSITIVE_TABLE, BLOCKS_FTS_TABLE, BLOCKS_TABLE};
use crate::model::block::Block;
use crate::repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension, Row};

const BLOCK_COLUMNS: &str = "id, parent_id, root_id, hash, box, path, hpath, name, alias, memo, \
     tag, content, fcontent, markdown, length, type, subtype, ial, sort, created, updated";

/// One of the tables holding a copy of every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTable {
    /// Source of truth.
    Blocks,
    /// FTS mirror matched case-sensitively.
    Fts,
    /// FTS mirror matched case-insensitively.
    FtsCaseInsensitive,
}

impl BlockTable {
    pub fn name(self) -> &'static str {
        match self {
            Self::Blocks => BLOCKS_TABLE,
            Self::Fts => BLOCKS_FTS_TABLE,
            Self::FtsCaseInsensitive => BLOCKS_FTS_CASE_INSENSITIVE_TABLE,
        }
    }

    /// Tables maintained under the given search mode, in write order.
    pub fn maintained(case_sensitive: bool) -> &'static [BlockTable] {
        if case_sensitive {
            &[Self::Blocks, Self::Fts]
        } else {
            &[Self::Blocks, Self::Fts, Self::FtsCaseInsensitive]
        }
    }
}

/// Repository interface for block rows.
pub trait BlockRepository {
    /// Writes a block row, replacing any row with the same id.
    fn put_block(&self, table: BlockTable, block: &Block) -> RepoResult<()>;
    /// Loads one block from the primary table.
    fn get_block(&self, id: &str) -> RepoResult<Option<Block>>;
    /// Loads `(content, fcontent)` of one block from `table`.
    fn get_content(&self, table: BlockTable, id: &str) -> RepoResult<Option<(String, String)>>;
    /// Overwrites `content`, `fcontent` and `updated`. Returns changed rows.
    fn set_root_content(
        &self,
        table: BlockTable,
        id: &str,
        content: &str,
        updated: &str,
    ) -> RepoResult<usize>;
    /// Overwrites `content` only. Returns changed rows.
    fn set_content(&self, table: BlockTable, id: &str, content: &str) -> RepoResult<usize>;
    /// Deletes a block row. Returns changed rows.
    fn delete_block(&self, table: BlockTable, id: &str) -> RepoResult<usize>;
}

/// SQLite-backed block repository. Accepts a connection or a transaction.
pub struct SqliteBlockRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBlockRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl BlockRepository for SqliteBlockRepository<'_> {
    fn put_block(&self, table: BlockTable, block: &Block) -> RepoResult<()> {
        self.delete_block(table, &block.id)?;
        self.conn.execute(
            &format!(
                "INSERT INTO {} ({BLOCK_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21);",
                table.name()
            ),
            params![
                block.id,
                block.parent_id,
                block.root_id,
                block.hash,
                block.box_id,
                block.path,
                block.hpath,
                block.name,
                block.alias,
                block.memo,
                block.tag,
                block.content,
                block.fcontent,
                block.markdown,
                block.length,
                block.kind,
                block.subtype,
                block.ial,
                block.sort,
                block.created,
                block.updated,
            ],
        )?;
        Ok(())
    }

    fn get_block(&self, id: &str) -> RepoResult<Option<Block>> {
        let block = self
            .conn
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM {BLOCKS_TABLE} WHERE id = ?1;"),
                [id],
                parse_block_row,
            )
            .optional()?;
        Ok(block)
    }

    fn get_content(&self, table: BlockTable, id: &str) -> RepoResult<Option<(String, String)>> {
        let content = self
            .conn
            .query_row(
                &format!("SELECT content, fcontent FROM {} WHERE id = ?1;", table.name()),
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(content)
    }

    fn set_root_content(
        &self,
        table: BlockTable,
        id: &str,
        content: &str,
        updated: &str,
    ) -> RepoResult<usize> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET content = ?1, fcontent = ?2, updated = ?3 WHERE id = ?4;",
                table.name()
            ),
            params![content, content, updated, id],
        )?;
        Ok(changed)
    }

    fn set_content(&self, table: BlockTable, id: &str, content: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            &format!("UPDATE {} SET content = ?1 WHERE id = ?2;", table.name()),
            params![content, id],
        )?;
        Ok(changed)
    }

    fn delete_block(&self, table: BlockTable, id: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", table.name()),
            [id],
        )?;
        Ok(changed)
    }
}

fn parse_block_row(row: &Row<'_>) -> rusqlite::Result<Block> {
    Ok(Block {
        id: row.get("id")?,
        parent_id: row.get("parent_id")?,
        root_id: row.get("root_id")?,
        hash: row.get("hash")?,
        box_id: row.get("box")?,
        path: row.get("path")?,
        hpath: row.get("hpath")?,
        name: row.get("name")?,
        alias: row.get("alias")?,
        memo: row.get("memo")?,
        tag: row.get("tag")?,
        content: row.get("content")?,
        fcontent: row.get("fcontent")?,
        markdown: row.get("markdown")?,
        length: row.get("length")?,
        kind: row.get("type")?,
        subtype: row.get("subtype")?,
        ial: row.get("ial")?,
        sort: row.get("sort")?,
        created: row.get("created")?,
        updated: row.get("updated")?,
    })
}
