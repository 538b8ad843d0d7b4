//! Attribute view store use-cases.
//!
//! # Responsibility
//! - Load, save and remove attribute view documents.
//! - Resolve mirror ids to their canonical attribute view.
//! - Apply single-cell updates and answer per-block key summaries.
//! - Pin read-only history entries and content-addressed snapshots.
//!
//! # Invariants
//! - Every write runs in one immediate transaction; cached IALs of the
//!   affected rows are evicted only after commit.
//! - Mirrors are read-only. Writes must target the canonical id.
//! - `update_cell` never creates rows or keys.

use crate::cache::ContentCache;
use crate::model::av::{AttributeView, AttributeViewError, KeyValues};
use crate::repo::av_repo::{AttributeViewRepository, SqliteAttributeViewRepository};
use crate::repo::RepoError;
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type AvResult<T> = Result<T, AvError>;

/// Service error for attribute view use-cases.
#[derive(Debug)]
pub enum AvError {
    AttributeViewNotFound(String),
    ViewNotFound { av_id: String, view_id: String },
    HistoryNotFound { av_id: String, created: String },
    /// A history entry is already pinned under this marker.
    HistoryExists { av_id: String, created: String },
    SnapshotNotFound { av_id: String, snapshot: String },
    /// Write attempted through a mirror id.
    MirrorNotWritable(String),
    /// Mirror registration would shadow or loop onto an attribute view.
    InvalidMirror { mirror_id: String, reason: String },
    Model(AttributeViewError),
    Repo(RepoError),
}

impl Display for AvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AttributeViewNotFound(id) => write!(f, "attribute view not found: {id}"),
            Self::ViewNotFound { av_id, view_id } => {
                write!(f, "view `{view_id}` not found in attribute view {av_id}")
            }
            Self::HistoryNotFound { av_id, created } => {
                write!(f, "history `{created}` not found for attribute view {av_id}")
            }
            Self::HistoryExists { av_id, created } => {
                write!(f, "history `{created}` already recorded for attribute view {av_id}")
            }
            Self::SnapshotNotFound { av_id, snapshot } => {
                write!(f, "snapshot `{snapshot}` not found for attribute view {av_id}")
            }
            Self::MirrorNotWritable(id) => {
                write!(f, "attribute view {id} is a mirror; write to its canonical id")
            }
            Self::InvalidMirror { mirror_id, reason } => {
                write!(f, "invalid mirror `{mirror_id}`: {reason}")
            }
            Self::Model(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AttributeViewError> for AvError {
    fn from(value: AttributeViewError) -> Self {
        Self::Model(value)
    }
}

impl From<RepoError> for AvError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for AvError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

/// Keys of one attribute view together with one block's cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockAttributeViewKeys {
    #[serde(rename = "avID")]
    pub av_id: String,
    pub av_name: String,
    #[serde(rename = "blockID")]
    pub block_id: String,
    pub key_values: Vec<KeyValues>,
}

/// Attribute view store facade over the SQLite repository.
#[derive(Clone)]
pub struct AttributeViewStore {
    cache: Arc<ContentCache>,
}

impl AttributeViewStore {
    pub fn new(cache: Arc<ContentCache>) -> Self {
        Self { cache }
    }

    /// Inserts or replaces an attribute view and rebuilds its row bindings.
    ///
    /// Ids registered as mirrors are rejected.
    pub fn save_attribute_view(&self, conn: &mut Connection, av: &AttributeView) -> AvResult<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let repo = SqliteAttributeViewRepository::new(&tx);
            if repo.mirror_target(&av.id)?.is_some() {
                return Err(AvError::InvalidMirror {
                    mirror_id: av.id.clone(),
                    reason: "id is registered as a mirror".to_string(),
                });
            }
            repo.save(av)?;
        }
        tx.commit()?;

        for row_id in &av.row_ids {
            self.cache.remove_block_ial(row_id);
        }
        info!(
            "event=av_save module=av status=ok av_id={} rows={} views={}",
            av.id,
            av.row_ids.len(),
            av.views.len()
        );
        Ok(())
    }

    /// Loads an attribute view by its canonical id.
    pub fn get_attribute_view(&self, conn: &Connection, av_id: &str) -> AvResult<AttributeView> {
        SqliteAttributeViewRepository::new(conn)
            .load(av_id)?
            .ok_or_else(|| AvError::AttributeViewNotFound(av_id.to_string()))
    }

    /// Removes an attribute view with its bindings and mirrors.
    pub fn remove_attribute_view(&self, conn: &mut Connection, av_id: &str) -> AvResult<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let repo = SqliteAttributeViewRepository::new(&tx);
        let av = repo
            .load(av_id)?
            .ok_or_else(|| AvError::AttributeViewNotFound(av_id.to_string()))?;
        repo.delete(av_id)?;
        tx.commit()?;

        for row_id in &av.row_ids {
            self.cache.remove_block_ial(row_id);
        }
        info!("event=av_remove module=av status=ok av_id={}", av_id);
        Ok(())
    }

    /// Registers `mirror_id` as a read-only alias of `av_id`.
    pub fn register_mirror(
        &self,
        conn: &mut Connection,
        mirror_id: &str,
        av_id: &str,
    ) -> AvResult<()> {
        if mirror_id.trim().is_empty() || mirror_id == av_id {
            return Err(AvError::InvalidMirror {
                mirror_id: mirror_id.to_string(),
                reason: "mirror id must be distinct and non-blank".to_string(),
            });
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let repo = SqliteAttributeViewRepository::new(&tx);
            if repo.load(av_id)?.is_none() {
                return Err(AvError::AttributeViewNotFound(av_id.to_string()));
            }
            if repo.load(mirror_id)?.is_some() {
                return Err(AvError::InvalidMirror {
                    mirror_id: mirror_id.to_string(),
                    reason: "id already names an attribute view".to_string(),
                });
            }
            repo.insert_mirror(mirror_id, av_id)?;
        }
        tx.commit()?;

        info!(
            "event=av_mirror_register module=av status=ok mirror_id={} av_id={}",
            mirror_id, av_id
        );
        Ok(())
    }

    /// Returns true only for ids registered as mirrors.
    pub fn is_mirror(&self, conn: &Connection, id: &str) -> AvResult<bool> {
        Ok(SqliteAttributeViewRepository::new(conn)
            .mirror_target(id)?
            .is_some())
    }

    /// Maps a mirror id to its canonical id; other ids map to themselves.
    pub fn canonical_id(&self, conn: &Connection, id: &str) -> AvResult<String> {
        Ok(SqliteAttributeViewRepository::new(conn)
            .mirror_target(id)?
            .unwrap_or_else(|| id.to_string()))
    }

    /// Loads the attribute view behind `id` and reports whether `id` is a mirror.
    pub fn resolve(&self, conn: &Connection, id: &str) -> AvResult<(AttributeView, bool)> {
        let repo = SqliteAttributeViewRepository::new(conn);
        let target = repo.mirror_target(id)?;
        let is_mirror = target.is_some();
        let canonical = target.unwrap_or_else(|| id.to_string());
        let av = repo
            .load(&canonical)?
            .ok_or(AvError::AttributeViewNotFound(canonical))?;
        Ok((av, is_mirror))
    }

    /// Lists every attribute view binding `block_id`, with that block's cells.
    pub fn get_block_attribute_view_keys(
        &self,
        conn: &Connection,
        block_id: &str,
    ) -> AvResult<Vec<BlockAttributeViewKeys>> {
        let repo = SqliteAttributeViewRepository::new(conn);
        let mut summaries = Vec::new();
        for av_id in repo.ids_for_block(block_id)? {
            let Some(av) = repo.load(&av_id)? else {
                continue;
            };
            summaries.push(BlockAttributeViewKeys {
                key_values: av.key_values_for_row(block_id),
                av_id: av.id,
                av_name: av.name,
                block_id: block_id.to_string(),
            });
        }
        Ok(summaries)
    }

    /// Applies one typed cell update and returns the row block's key summary.
    pub fn update_cell(
        &self,
        conn: &mut Connection,
        av_id: &str,
        key_id: &str,
        row_id: &str,
        cell_id: &str,
        value: &serde_json::Value,
    ) -> AvResult<Vec<BlockAttributeViewKeys>> {
        let started_at = Instant::now();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let repo = SqliteAttributeViewRepository::new(&tx);
            if repo.mirror_target(av_id)?.is_some() {
                return Err(AvError::MirrorNotWritable(av_id.to_string()));
            }
            let mut av = repo
                .load(av_id)?
                .ok_or_else(|| AvError::AttributeViewNotFound(av_id.to_string()))?;
            if let Err(err) = av.update_cell(key_id, row_id, cell_id, value) {
                error!(
                    "event=av_cell_update module=av status=error av_id={} key_id={} row_id={} error={}",
                    av_id, key_id, row_id, err
                );
                return Err(err.into());
            }
            repo.save(&av)?;
        }
        tx.commit()?;

        self.cache.remove_block_ial(row_id);
        info!(
            "event=av_cell_update module=av status=ok av_id={} key_id={} row_id={} duration_ms={}",
            av_id,
            key_id,
            row_id,
            started_at.elapsed().as_millis()
        );
        self.get_block_attribute_view_keys(conn, row_id)
    }

    /// Pins the current state of an attribute view under `created`.
    ///
    /// An entry already pinned under `created` is never replaced.
    pub fn record_history(&self, conn: &mut Connection, av_id: &str, created: &str) -> AvResult<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let repo = SqliteAttributeViewRepository::new(&tx);
            let av = repo
                .load(av_id)?
                .ok_or_else(|| AvError::AttributeViewNotFound(av_id.to_string()))?;
            if repo.load_history(av_id, created)?.is_some() {
                return Err(AvError::HistoryExists {
                    av_id: av_id.to_string(),
                    created: created.to_string(),
                });
            }
            repo.insert_history(&av, created)?;
        }
        tx.commit()?;
        info!(
            "event=av_history_record module=av status=ok av_id={} created={}",
            av_id, created
        );
        Ok(())
    }

    /// Loads a history entry. Mirror ids read the canonical history.
    pub fn load_history(
        &self,
        conn: &Connection,
        av_id: &str,
        created: &str,
    ) -> AvResult<AttributeView> {
        let canonical = self.canonical_id(conn, av_id)?;
        SqliteAttributeViewRepository::new(conn)
            .load_history(&canonical, created)?
            .ok_or_else(|| AvError::HistoryNotFound {
                av_id: av_id.to_string(),
                created: created.to_string(),
            })
    }

    /// Pins the current state of an attribute view and returns its token.
    ///
    /// The token is the SHA-256 of the serialized state, so identical
    /// states share one snapshot.
    pub fn create_snapshot(&self, conn: &mut Connection, av_id: &str) -> AvResult<String> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let token = {
            let repo = SqliteAttributeViewRepository::new(&tx);
            let av = repo
                .load(av_id)?
                .ok_or_else(|| AvError::AttributeViewNotFound(av_id.to_string()))?;
            let token = snapshot_token(&av)?;
            repo.insert_snapshot(&token, &av)?;
            token
        };
        tx.commit()?;
        info!(
            "event=av_snapshot_create module=av status=ok av_id={} snapshot={}",
            av_id, token
        );
        Ok(token)
    }

    /// Loads a snapshot. Mirror ids read the canonical snapshot.
    pub fn load_snapshot(
        &self,
        conn: &Connection,
        snapshot: &str,
        av_id: &str,
    ) -> AvResult<AttributeView> {
        let canonical = self.canonical_id(conn, av_id)?;
        SqliteAttributeViewRepository::new(conn)
            .load_snapshot(snapshot, &canonical)?
            .ok_or_else(|| AvError::SnapshotNotFound {
                av_id: av_id.to_string(),
                snapshot: snapshot.to_string(),
            })
    }
}

fn snapshot_token(av: &AttributeView) -> AvResult<String> {
    let data = serde_json::to_vec(av).map_err(RepoError::from)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(format!("{:x}", hasher.finalize()))
}
