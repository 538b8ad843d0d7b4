//! Document tree access for content extraction.
//!
//! # Responsibility
//! - Define the minimal document tree shape the indexer needs.
//! - Define the [`DocumentSource`] seam through which trees are located and
//!   loaded; parsing and on-disk loading live behind it.
//!
//! # Invariants
//! - A missing location or tree is reported as `None`, never as a panic.

pub mod resolver;

use dashmap::DashMap;

pub use resolver::{render_node_text, ContentResolver, ResolveError};

/// Where a block's owning document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocation {
    pub box_id: String,
    pub path: String,
}

/// One node of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: String,
    /// Markdown source of this node alone, children excluded.
    pub markdown: String,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(id: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            markdown: markdown.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(
        id: impl Into<String>,
        markdown: impl Into<String>,
        children: Vec<TreeNode>,
    ) -> Self {
        Self {
            id: id.into(),
            markdown: markdown.into(),
            children,
        }
    }

    fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    fn visit_ids<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(self.id.as_str());
        for child in &self.children {
            child.visit_ids(out);
        }
    }
}

/// A loaded document: the root node plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTree {
    pub box_id: String,
    pub path: String,
    pub root: TreeNode,
}

impl DocumentTree {
    pub fn find_node(&self, id: &str) -> Option<&TreeNode> {
        self.root.find(id)
    }

    /// Returns every node id in document order.
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.root.visit_ids(&mut ids);
        ids
    }
}

/// Locates and loads document trees.
pub trait DocumentSource: Send + Sync {
    /// Returns the owning document location of a block, if indexed.
    fn block_location(&self, block_id: &str) -> Option<BlockLocation>;
    /// Loads the document stored at `(box_id, path)`.
    fn load_tree(&self, box_id: &str, path: &str) -> Option<DocumentTree>;
}

/// Document source backed by in-process maps.
#[derive(Debug, Default)]
pub struct InMemoryDocumentSource {
    trees: DashMap<(String, String), DocumentTree>,
    locations: DashMap<String, BlockLocation>,
}

impl InMemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a tree and indexes the location of each of its nodes.
    pub fn insert_tree(&self, tree: DocumentTree) {
        let location = BlockLocation {
            box_id: tree.box_id.clone(),
            path: tree.path.clone(),
        };
        for id in tree.node_ids() {
            self.locations.insert(id.to_string(), location.clone());
        }
        self.trees
            .insert((tree.box_id.clone(), tree.path.clone()), tree);
    }

    /// Drops a tree but keeps node locations, like a file deleted on disk
    /// before the block index caught up.
    pub fn remove_tree(&self, box_id: &str, path: &str) -> Option<DocumentTree> {
        self.trees
            .remove(&(box_id.to_string(), path.to_string()))
            .map(|(_, tree)| tree)
    }

    pub fn forget_block(&self, block_id: &str) {
        self.locations.remove(block_id);
    }
}

impl DocumentSource for InMemoryDocumentSource {
    fn block_location(&self, block_id: &str) -> Option<BlockLocation> {
        self.locations
            .get(block_id)
            .map(|entry| entry.value().clone())
    }

    fn load_tree(&self, box_id: &str, path: &str) -> Option<DocumentTree> {
        self.trees
            .get(&(box_id.to_string(), path.to_string()))
            .map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentSource, DocumentTree, InMemoryDocumentSource, TreeNode};

    fn tree() -> DocumentTree {
        DocumentTree {
            box_id: "box".to_string(),
            path: "/doc.sy".to_string(),
            root: TreeNode::with_children(
                "doc",
                "# Title",
                vec![TreeNode::with_children(
                    "list",
                    "",
                    vec![TreeNode::leaf("item", "- nested")],
                )],
            ),
        }
    }

    #[test]
    fn find_node_walks_descendants() {
        let tree = tree();
        assert_eq!(tree.find_node("item").map(|n| n.markdown.as_str()), Some("- nested"));
        assert!(tree.find_node("missing").is_none());
        assert_eq!(tree.node_ids(), vec!["doc", "list", "item"]);
    }

    #[test]
    fn removed_tree_keeps_stale_locations() {
        let source = InMemoryDocumentSource::new();
        source.insert_tree(tree());
        assert!(source.block_location("item").is_some());

        source.remove_tree("box", "/doc.sy");
        assert!(source.block_location("item").is_some());
        assert!(source.load_tree("box", "/doc.sy").is_none());
    }
}
