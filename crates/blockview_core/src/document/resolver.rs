//! Canonical searchable text extraction.
//!
//! # Responsibility
//! - Resolve a block id to its node in the owning document tree.
//! - Render a node (and its descendants) to the plain text stored in the
//!   block index, with asset references made absolute.
//!
//! # Invariants
//! - Resolution has no side effects; callers decide whether a failure is
//!   fatal or a no-op.
//! - Rendering is deterministic for the same node and asset base.

use super::{DocumentSource, TreeNode};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ASSETS_PREFIX: &str = "assets/";

static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(!?)\[([^\]]*)\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#).expect("valid link regex")
});
static IAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{:[^}]*\}").expect("valid ial regex"));
static BLOCK_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]+|>[ \t]?|[-*+][ \t]+(?:\[[ xX]\][ \t]+)?|\d+\.[ \t]+)")
        .expect("valid block marker regex")
});
static INLINE_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*{1,3}|~~|==|`+|__").expect("valid inline marker regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Content extraction failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The block has no known owning document.
    BlockNotIndexed(String),
    /// The owning document could not be loaded.
    TreeUnavailable { box_id: String, path: String },
    /// The document no longer contains the block.
    NodeNotFound(String),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlockNotIndexed(id) => write!(f, "block location not found: {id}"),
            Self::TreeUnavailable { box_id, path } => {
                write!(f, "document tree unavailable: {box_id}{path}")
            }
            Self::NodeNotFound(id) => write!(f, "node not found in document tree: {id}"),
        }
    }
}

impl Error for ResolveError {}

/// Extracts canonical text for blocks from their document trees.
#[derive(Clone)]
pub struct ContentResolver {
    documents: Arc<dyn DocumentSource>,
    asset_base: PathBuf,
}

impl ContentResolver {
    pub fn new(documents: Arc<dyn DocumentSource>, asset_base: impl Into<PathBuf>) -> Self {
        Self {
            documents,
            asset_base: asset_base.into(),
        }
    }

    /// Renders the node `block_id` of the document at `(box_id, path)`.
    pub fn resolve(&self, box_id: &str, path: &str, block_id: &str) -> Result<String, ResolveError> {
        let tree = self
            .documents
            .load_tree(box_id, path)
            .ok_or_else(|| ResolveError::TreeUnavailable {
                box_id: box_id.to_string(),
                path: path.to_string(),
            })?;
        let node = tree
            .find_node(block_id)
            .ok_or_else(|| ResolveError::NodeNotFound(block_id.to_string()))?;
        Ok(render_node_text(node, &self.asset_base))
    }

    /// Locates the owning document of `block_id`, then renders the node.
    pub fn resolve_block(&self, block_id: &str) -> Result<String, ResolveError> {
        let location = self
            .documents
            .block_location(block_id)
            .ok_or_else(|| ResolveError::BlockNotIndexed(block_id.to_string()))?;
        self.resolve(&location.box_id, &location.path, block_id)
    }
}

/// Renders a node and its descendants to searchable plain text.
///
/// Markdown markers are dropped, links reduce to their label, images to
/// their alt text, and `assets/...` destinations are appended as absolute
/// paths under `asset_base`.
pub fn render_node_text(node: &TreeNode, asset_base: &Path) -> String {
    let mut parts = Vec::new();
    collect_text(node, asset_base, &mut parts);
    parts.join(" ")
}

fn collect_text(node: &TreeNode, asset_base: &Path, parts: &mut Vec<String>) {
    let text = render_markdown_text(&node.markdown, asset_base);
    if !text.is_empty() {
        parts.push(text);
    }
    for child in &node.children {
        collect_text(child, asset_base, parts);
    }
}

fn render_markdown_text(markdown: &str, asset_base: &Path) -> String {
    let without_ial = IAL_RE.replace_all(markdown, " ");
    let source = BLOCK_MARKER_RE.replace_all(&without_ial, "");

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for caps in LINK_RE.captures_iter(&source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&INLINE_MARKER_RE.replace_all(&source[last..whole.start()], ""));
        out.push(' ');
        out.push_str(&INLINE_MARKER_RE.replace_all(&caps[2], ""));
        let destination = &caps[3];
        if destination.starts_with(ASSETS_PREFIX) {
            out.push(' ');
            out.push_str(&absolute_asset_path(destination, asset_base));
        }
        out.push(' ');
        last = whole.end();
    }
    out.push_str(&INLINE_MARKER_RE.replace_all(&source[last..], ""));

    WHITESPACE_RE.replace_all(&out, " ").trim().to_string()
}

fn absolute_asset_path(destination: &str, asset_base: &Path) -> String {
    asset_base
        .join(destination)
        .to_string_lossy()
        .replace('\\', "/")
}
