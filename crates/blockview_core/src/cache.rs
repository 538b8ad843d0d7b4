//! Process-wide block content cache.
//!
//! # Responsibility
//! - Shadow recently written or read blocks keyed by id.
//! - Shadow parsed inline attribute lists (IAL) keyed by block id.
//!
//! # Invariants
//! - The cache is never a source of truth; a miss always falls back to
//!   storage.
//! - Only the index coordinator and the attribute view store mutate it,
//!   and only after the write that produced the change has committed.

use crate::model::block::Block;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static IAL_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([^\s="]+)="([^"]*)""#).expect("valid ial attribute regex"));

/// Parsed inline attribute list of one block.
pub type BlockIal = BTreeMap<String, String>;

/// Shared concurrent cache of blocks and their inline attribute lists.
#[derive(Debug, Default)]
pub struct ContentCache {
    blocks: DashMap<String, Block>,
    ials: DashMap<String, BlockIal>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_block(&self, id: &str) -> Option<Block> {
        self.blocks.get(id).map(|entry| entry.value().clone())
    }

    pub fn put_block(&self, block: &Block) {
        self.blocks.insert(block.id.clone(), block.clone());
    }

    pub fn remove_block(&self, id: &str) {
        self.blocks.remove(id);
    }

    pub fn get_block_ial(&self, id: &str) -> Option<BlockIal> {
        self.ials.get(id).map(|entry| entry.value().clone())
    }

    pub fn put_block_ial(&self, id: &str, ial: BlockIal) {
        self.ials.insert(id.to_string(), ial);
    }

    pub fn remove_block_ial(&self, id: &str) {
        self.ials.remove(id);
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

/// Parses a serialized inline attribute list such as
/// `{: id="b1" custom-avs="av1"}` into key/value pairs.
///
/// Malformed fragments are skipped.
pub fn parse_ial(raw: &str) -> BlockIal {
    let body = raw
        .trim()
        .trim_start_matches("{:")
        .trim_end_matches('}')
        .trim();
    IAL_ATTR_RE
        .captures_iter(body)
        .map(|caps| (caps[1].to_string(), caps[2].replace("&quot;", "\"")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_ial, ContentCache};
    use crate::model::block::Block;

    #[test]
    fn put_then_remove_block() {
        let cache = ContentCache::new();
        cache.put_block(&Block::new("b1", "Hello"));
        assert_eq!(cache.get_block("b1").map(|b| b.content), Some("Hello".to_string()));
        cache.remove_block("b1");
        assert!(cache.get_block("b1").is_none());
        assert_eq!(cache.block_count(), 0);
    }

    #[test]
    fn parse_ial_reads_quoted_pairs() {
        let ial = parse_ial(r#"{: id="b1" custom-avs="av1,av2" title="say &quot;hi&quot;"}"#);
        assert_eq!(ial.get("id").map(String::as_str), Some("b1"));
        assert_eq!(ial.get("custom-avs").map(String::as_str), Some("av1,av2"));
        assert_eq!(ial.get("title").map(String::as_str), Some("say \"hi\""));
    }

    #[test]
    fn parse_ial_tolerates_garbage() {
        assert!(parse_ial("").is_empty());
        assert!(parse_ial("{: broken=\"x}").is_empty());
        assert_eq!(
            parse_ial(r#"{: id="b1" stray value="v"}"#)
                .into_iter()
                .collect::<Vec<_>>(),
            vec![
                ("id".to_string(), "b1".to_string()),
                ("value".to_string(), "v".to_string())
            ]
        );
    }
}
