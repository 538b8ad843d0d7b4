//! Block index coordination across the primary table and FTS mirrors.
//!
//! # Responsibility
//! - Fan every content mutation out to `blocks`, `blocks_fts` and, unless
//!   the store is case-sensitive-only, `blocks_fts_case_insensitive`.
//! - Keep the content cache coherent with committed writes.
//! - Re-derive block content from document trees on demand.
//!
//! # Invariants
//! - Writes for one logical update run in one immediate transaction in the
//!   order primary, case-sensitive, case-insensitive. The first failure
//!   aborts the rest and the transaction rolls back when dropped.
//! - The cache is touched only after commit.
//! - A block that cannot be resolved from its document is skipped by
//!   `index_node`, never reported as an error.

use crate::cache::{parse_ial, BlockIal, ContentCache};
use crate::config::IndexConfig;
use crate::document::{ContentResolver, DocumentSource, ResolveError};
use crate::model::block::Block;
use crate::repo::block_repo::{BlockRepository, BlockTable, SqliteBlockRepository};
use crate::repo::RepoResult;
use log::{debug, error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::sync::Arc;
use std::time::Instant;

/// Result of one `index_node` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Content was recomputed and written to every maintained table.
    Indexed,
    /// The block could not be resolved; nothing was written.
    Skipped(ResolveError),
}

/// Applies block content mutations atomically across all index tables.
#[derive(Clone)]
pub struct IndexCoordinator {
    config: IndexConfig,
    cache: Arc<ContentCache>,
    resolver: ContentResolver,
}

impl IndexCoordinator {
    pub fn new(
        config: IndexConfig,
        cache: Arc<ContentCache>,
        documents: Arc<dyn DocumentSource>,
    ) -> Self {
        let resolver = ContentResolver::new(documents, config.asset_base.clone());
        Self {
            config,
            cache,
            resolver,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Writes blocks into every maintained table, replacing existing rows.
    pub fn insert_blocks(&self, conn: &mut Connection, blocks: &[Block]) -> RepoResult<()> {
        let started_at = Instant::now();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let repo = SqliteBlockRepository::new(&tx);
            for block in blocks {
                for &table in self.tables() {
                    repo.put_block(table, block)?;
                }
            }
        }
        tx.commit()?;

        for block in blocks {
            self.cache.put_block(block);
            self.cache.remove_block_ial(&block.id);
        }
        info!(
            "event=blocks_insert module=index status=ok count={} duration_ms={}",
            blocks.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Removes blocks from every maintained table. Returns removed primary rows.
    pub fn delete_blocks(&self, conn: &mut Connection, ids: &[String]) -> RepoResult<usize> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut removed = 0;
        {
            let repo = SqliteBlockRepository::new(&tx);
            for id in ids {
                for &table in self.tables() {
                    let changed = repo.delete_block(table, id)?;
                    if table == BlockTable::Blocks {
                        removed += changed;
                    }
                }
            }
        }
        tx.commit()?;

        for id in ids {
            self.cache.remove_block(id);
            self.cache.remove_block_ial(id);
        }
        info!(
            "event=blocks_delete module=index status=ok requested={} removed={}",
            ids.len(),
            removed
        );
        Ok(removed)
    }

    /// Reads a block through the cache, populating it on a miss.
    pub fn get_block(&self, conn: &Connection, id: &str) -> RepoResult<Option<Block>> {
        if let Some(block) = self.cache.get_block(id) {
            return Ok(Some(block));
        }
        let block = SqliteBlockRepository::new(conn).get_block(id)?;
        if let Some(block) = block.as_ref() {
            self.cache.put_block(block);
        }
        Ok(block)
    }

    /// Reads a block's parsed inline attribute list through the cache.
    pub fn get_block_ial(&self, conn: &Connection, id: &str) -> RepoResult<Option<BlockIal>> {
        if let Some(ial) = self.cache.get_block_ial(id) {
            return Ok(Some(ial));
        }
        let Some(block) = self.get_block(conn, id)? else {
            return Ok(None);
        };
        let ial = parse_ial(&block.ial);
        self.cache.put_block_ial(id, ial.clone());
        Ok(Some(ial))
    }

    /// Overwrites `content` and `fcontent` of a root block in every index.
    ///
    /// On success the block and its inline attribute list are evicted from
    /// the cache rather than repopulated.
    pub fn update_root_content(
        &self,
        conn: &mut Connection,
        id: &str,
        content: &str,
        updated: &str,
    ) -> RepoResult<()> {
        self.write_all(conn, "root_content_update", id, |repo, table| {
            repo.set_root_content(table, id, content, updated)
        })?;
        self.cache.remove_block(id);
        self.cache.remove_block_ial(id);
        Ok(())
    }

    /// Overwrites `content` of a single block in every index.
    ///
    /// On success the cache holds `block` so the next read skips storage.
    /// A block missing from the primary table is evicted instead.
    pub fn update_block_content(&self, conn: &mut Connection, block: &Block) -> RepoResult<()> {
        let primary_rows = self.write_all(conn, "block_content_update", &block.id, |repo, table| {
            repo.set_content(table, &block.id, &block.content)
        })?;
        if primary_rows > 0 {
            self.cache.put_block(block);
        } else {
            self.cache.remove_block(&block.id);
        }
        Ok(())
    }

    /// Recomputes a block's `content` from its document tree.
    ///
    /// Unknown blocks, unloadable documents and vanished nodes are skipped.
    pub fn index_node(&self, conn: &mut Connection, id: &str) -> RepoResult<IndexOutcome> {
        let content = match self.resolver.resolve_block(id) {
            Ok(content) => content,
            Err(reason) => {
                debug!(
                    "event=index_node module=index status=skip block_id={} reason={}",
                    id, reason
                );
                return Ok(IndexOutcome::Skipped(reason));
            }
        };

        self.write_all(conn, "index_node", id, |repo, table| {
            repo.set_content(table, id, &content)
        })?;
        self.cache.remove_block(id);
        Ok(IndexOutcome::Indexed)
    }

    /// Renders a block's canonical text for a direct request.
    ///
    /// Unlike [`index_node`](Self::index_node), resolution failures are
    /// returned to the caller.
    pub fn block_content(&self, id: &str) -> Result<String, ResolveError> {
        self.resolver.resolve_block(id)
    }

    fn tables(&self) -> &'static [BlockTable] {
        BlockTable::maintained(self.config.case_sensitive)
    }

    /// Runs `write` against every maintained table in one transaction.
    /// Returns the rows changed in the primary table.
    fn write_all(
        &self,
        conn: &mut Connection,
        event: &'static str,
        id: &str,
        write: impl Fn(&dyn BlockRepository, BlockTable) -> RepoResult<usize>,
    ) -> RepoResult<usize> {
        let started_at = Instant::now();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut primary_rows = 0;
        {
            let repo = SqliteBlockRepository::new(&tx);
            let repo: &dyn BlockRepository = &repo;
            for &table in self.tables() {
                match write(repo, table) {
                    Ok(0) => debug!(
                        "event={} module=index status=miss block_id={} table={}",
                        event,
                        id,
                        table.name()
                    ),
                    Ok(changed) => {
                        if table == BlockTable::Blocks {
                            primary_rows = changed;
                        }
                    }
                    Err(err) => {
                        error!(
                            "event={} module=index status=error block_id={} table={} duration_ms={} error={}",
                            event,
                            id,
                            table.name(),
                            started_at.elapsed().as_millis(),
                            err
                        );
                        return Err(err);
                    }
                }
            }
        }
        tx.commit()?;

        info!(
            "event={} module=index status=ok block_id={} tables={} duration_ms={}",
            event,
            id,
            self.tables().len(),
            started_at.elapsed().as_millis()
        );
        Ok(primary_rows)
    }
}
