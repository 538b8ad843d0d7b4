//! SQLite FTS5 block search over the case-sensitive and case-insensitive
//! mirrors.
//!
//! # Responsibility
//! - Provide keyword search over block content without runtime case
//!   folding; the mirror table decides case behavior.
//! - Return typed hits with stable block ids.
//!
//! # Invariants
//! - Case-insensitive queries fall back to the case-sensitive mirror when
//!   the store runs in case-sensitive-only mode.
//! - Result ordering is deterministic by rank, then `id`.
//! - Trigram tokenization means terms shorter than three characters never
//!   match.

use crate::config::IndexConfig;
use crate::db::DbError;
use crate::repo::block_repo::BlockTable;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for query parsing and DB interaction.
#[derive(Debug)]
pub enum SearchError {
    /// User-provided query cannot be parsed by FTS5 syntax.
    InvalidQuery {
        query: String,
        message: String,
    },
    Db(DbError),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidQuery { .. } => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Search options for full-text query behavior.
#[derive(Debug, Clone)]
pub struct BlockSearchQuery {
    /// User query text.
    pub text: String,
    /// Match letter case exactly.
    pub case_sensitive: bool,
    /// Restrict hits to one document.
    pub root_id: Option<String>,
    /// Maximum number of hits to return.
    pub limit: u32,
    /// Whether to pass text directly as raw FTS5 expression.
    pub raw_fts_syntax: bool,
}

impl BlockSearchQuery {
    /// Creates a case-insensitive query with default limit.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            case_sensitive: false,
            root_id: None,
            limit: 64,
            raw_fts_syntax: false,
        }
    }
}

/// Single search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSearchHit {
    pub id: String,
    pub root_id: String,
    pub box_id: String,
    pub path: String,
    pub kind: String,
    pub snippet: String,
}

/// Picks the mirror serving a query under the configured search mode.
pub fn search_table(config: &IndexConfig, case_sensitive: bool) -> BlockTable {
    if case_sensitive || config.case_sensitive {
        BlockTable::Fts
    } else {
        BlockTable::FtsCaseInsensitive
    }
}

/// Searches block content and returns ranked hits.
///
/// Returns an empty list for blank queries or a zero limit.
pub fn search_blocks(
    conn: &Connection,
    config: &IndexConfig,
    query: &BlockSearchQuery,
) -> SearchResult<Vec<BlockSearchHit>> {
    let Some(match_expr) = build_match_expression(query) else {
        return Ok(Vec::new());
    };
    if query.limit == 0 {
        return Ok(Vec::new());
    }

    let table = search_table(config, query.case_sensitive).name();
    let mut sql = format!(
        "SELECT
            id,
            root_id,
            box,
            path,
            type,
            snippet({table}, 11, '<mark>', '</mark>', '...', 16) AS snippet
         FROM {table}
         WHERE {table} MATCH ?"
    );
    let mut bind_values: Vec<Value> = vec![Value::Text(format!("content : ({match_expr})"))];

    if let Some(root_id) = query.root_id.as_ref() {
        sql.push_str(" AND root_id = ?");
        bind_values.push(Value::Text(root_id.clone()));
    }

    sql.push_str(" ORDER BY rank, id ASC LIMIT ?");
    bind_values.push(Value::Integer(i64::from(query.limit)));

    debug!(
        "event=block_search module=search status=start table={} limit={}",
        table, query.limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query(params_from_iter(bind_values))
        .map_err(|err| map_query_error(err, &match_expr))?;
    let mut hits = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|err| map_query_error(err, &match_expr))?
    {
        hits.push(parse_search_hit(row)?);
    }

    Ok(hits)
}

fn parse_search_hit(row: &Row<'_>) -> SearchResult<BlockSearchHit> {
    Ok(BlockSearchHit {
        id: row.get("id")?,
        root_id: row.get("root_id")?,
        box_id: row.get("box")?,
        path: row.get("path")?,
        kind: row.get("type")?,
        snippet: row.get("snippet")?,
    })
}

fn build_match_expression(query: &BlockSearchQuery) -> Option<String> {
    let text = query.text.trim();
    if text.is_empty() {
        return None;
    }
    if query.raw_fts_syntax {
        return Some(text.to_string());
    }

    let terms = text
        .split_whitespace()
        .map(escape_fts_term)
        .collect::<Vec<_>>();
    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" AND "))
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }
    SearchError::Db(DbError::Sqlite(err))
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}
