//! Block domain model.
//!
//! # Responsibility
//! - Define the canonical row shape shared by the primary block table and
//!   both FTS mirrors.
//!
//! # Invariants
//! - `id` is globally unique and never reused for another block.
//! - `content` and `fcontent` of a root block are always written together.
//! - Index copies of a block equal the primary copy after every committed
//!   write.

use serde::{Deserialize, Serialize};

/// Stable block identifier.
pub type BlockId = String;

/// One addressable content unit (paragraph, heading, document root...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    pub parent_id: String,
    /// Owning document (root block) id. Equals `id` for root blocks.
    pub root_id: String,
    pub hash: String,
    /// Containing box (notebook) id.
    #[serde(rename = "box")]
    pub box_id: String,
    pub path: String,
    /// Human-readable path.
    pub hpath: String,
    pub name: String,
    pub alias: String,
    pub memo: String,
    pub tag: String,
    /// Searchable plain-text content.
    pub content: String,
    /// Content with block references expanded.
    pub fcontent: String,
    pub markdown: String,
    pub length: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: String,
    /// Inline attribute list in serialized form.
    pub ial: String,
    pub sort: i64,
    pub created: String,
    pub updated: String,
}

impl Block {
    /// Creates a block with the given id and content, all other fields empty.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Returns whether this block is the root of its document.
    pub fn is_root(&self) -> bool {
        !self.id.is_empty() && self.id == self.root_id
    }
}

#[cfg(test)]
mod tests {
    use super::Block;

    #[test]
    fn root_detection_requires_matching_root_id() {
        let mut block = Block::new("doc-1", "title");
        assert!(!block.is_root());
        block.root_id = "doc-1".to_string();
        assert!(block.is_root());
    }

    #[test]
    fn serializes_box_and_type_with_external_names() {
        let mut block = Block::new("b1", "x");
        block.box_id = "box-a".to_string();
        block.kind = "p".to_string();
        let json = serde_json::to_value(&block).expect("block should serialize");
        assert_eq!(json["box"], "box-a");
        assert_eq!(json["type"], "p");
        assert_eq!(json["rootId"], "");
    }
}
