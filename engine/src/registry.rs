//! Node Registry (spec §4.3): a keyed catalog of `Node` implementations,
//! owned by the caller for the lifetime of the process (or however long
//! it likes) — never a global singleton. Mirrors the teacher's
//! `handlers: HashMap<NodeType, Box<dyn NodeHandler>>` in `executor.rs`,
//! generalized from a closed `NodeType` enum to an open string key.

use crate::error::{EngineError, Result};
use crate::node::{Node, NodeMetadata, NodeSource};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;

fn id_grammar_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]*$").unwrap())
}

/// Returns `true` if `id` matches the registry's identifier grammar
/// (spec §4.3): lowercase, starting with a letter, hyphen-separated.
pub fn is_valid_node_id(id: &str) -> bool {
    id_grammar_re().is_match(id)
}

/// Criteria for `NodeRegistry::list` (spec §4.3 "filter by source tag
/// ... or category"). `None` on a field means "don't filter on this".
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub source: Option<NodeSource>,
    pub category: Option<String>,
}

impl NodeFilter {
    pub fn by_source(source: NodeSource) -> Self {
        Self {
            source: Some(source),
            category: None,
        }
    }

    pub fn by_category(category: impl Into<String>) -> Self {
        Self {
            source: None,
            category: Some(category.into()),
        }
    }

    fn matches(&self, metadata: &NodeMetadata) -> bool {
        if let Some(source) = self.source {
            if metadata.source != source {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if metadata.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<dyn Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node under its own declared id (spec §4.3).
    ///
    /// Rejects an id that doesn't match the identifier grammar or whose
    /// declared edge set is empty with `InvalidNodeMetadataError`.
    /// Re-registering an id already present is allowed only when the new
    /// node's metadata is identical to the existing one (idempotent
    /// re-registration); any other metadata under the same id is a
    /// `DuplicateNodeError`.
    pub fn register(&mut self, node: Arc<dyn Node>) -> Result<()> {
        let id = node.id().to_string();
        if !is_valid_node_id(&id) {
            return Err(EngineError::InvalidNodeMetadata {
                id,
                reason: "id does not match the registry's identifier grammar".to_string(),
            });
        }
        if node.metadata().edges.is_empty() {
            return Err(EngineError::InvalidNodeMetadata {
                id,
                reason: "declared edge set must be non-empty".to_string(),
            });
        }

        if let Some(existing) = self.nodes.get(&id) {
            if existing.metadata() == node.metadata() {
                return Ok(());
            }
            return Err(EngineError::DuplicateNode(id));
        }

        self.nodes.insert(id, node);
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<dyn Node>> {
        self.nodes.get(id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn metadata(&self, id: &str) -> Option<&NodeMetadata> {
        self.nodes.get(id).map(|n| n.metadata())
    }

    /// Registered node metadata, sorted by id, optionally narrowed by
    /// `filter` (spec §4.3/§6.2's introspection contract for the
    /// reflection layer).
    pub fn list(&self, filter: Option<&NodeFilter>) -> Vec<&NodeMetadata> {
        let mut entries: Vec<&NodeMetadata> = self
            .nodes
            .values()
            .map(|n| n.metadata())
            .filter(|m| filter.map(|f| f.matches(m)).unwrap_or(true))
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }
}
