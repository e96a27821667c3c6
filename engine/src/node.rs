//! The Node contract (spec §3.3, §6.2). A node is a process-global,
//! stateless value identified by the registry key it is registered
//! under; it has no knowledge of the workflow tree around it.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// AI-facing hints, exposed by the registry's introspection API (§6.2)
/// for the out-of-scope reflection layer to render. Purely descriptive.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeHints {
    pub purpose: Option<String>,
    pub when_to_use: Option<String>,
    pub example_configuration: Option<Value>,
    pub state_reads: Vec<String>,
    pub state_writes: Vec<String>,
}

/// Where a node comes from, used by the registry's `list(filter)` (spec
/// §4.3) to let the reflection layer narrow its listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSource {
    #[default]
    Universal,
    Server,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub input_keys: Vec<String>,
    pub output_keys: Vec<String>,
    pub edges: Vec<String>,
    #[serde(default)]
    pub hints: NodeHints,
    #[serde(default)]
    pub source: NodeSource,
    #[serde(default)]
    pub category: Option<String>,
}

impl NodeMetadata {
    pub fn with_source(mut self, source: NodeSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Read-only view of state plus the write channel a node's `execute`
/// call is given (spec §3.3). Writes are buffered here and applied by
/// the engine in the order the node returned them (spec §4.6.3 step 5).
#[derive(Debug, Default)]
pub struct StateWrites {
    writes: Vec<(String, Value)>,
}

impl StateWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, path: impl Into<String>, value: Value) {
        self.writes.push((path.into(), value));
    }

    pub fn into_ordered(self) -> Vec<(String, Value)> {
        self.writes
    }
}

/// What a node's `execute` call returns: the edge to route on, the state
/// writes to apply (in order), and an optional free-form result object.
#[derive(Debug)]
pub struct NodeOutput {
    pub edge: String,
    pub writes: StateWrites,
    pub result: Option<Value>,
}

impl NodeOutput {
    pub fn edge(edge: impl Into<String>) -> Self {
        Self {
            edge: edge.into(),
            writes: StateWrites::new(),
            result: None,
        }
    }

    pub fn with_writes(mut self, writes: StateWrites) -> Self {
        self.writes = writes;
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// Read-only state access a node's `execute` may perform (spec §3.3).
/// A thin wrapper over a state snapshot rather than `&StateManager`
/// itself: nodes must not be able to write state except through the
/// `StateWrites` channel they return (spec §4.6.3 step 5, §4.6.5).
pub struct NodeStateView<'a> {
    snapshot: &'a Value,
}

impl<'a> NodeStateView<'a> {
    pub fn new(snapshot: &'a Value) -> Self {
        Self { snapshot }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = self.snapshot;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

/// The node contract (spec §3.3). Distinguished by registry identifier,
/// not by inheritance — this trait is the only polymorphism surface.
#[async_trait]
pub trait Node: Send + Sync {
    fn metadata(&self) -> &NodeMetadata;

    fn id(&self) -> &str {
        &self.metadata().id
    }

    async fn execute(
        &self,
        config: &Value,
        state: &NodeStateView<'_>,
    ) -> Result<NodeOutput>;
}

/// Convenience constructor for a node's declared metadata, used by
/// builtin nodes and by third-party node authors alike.
pub fn metadata(
    id: &str,
    name: &str,
    version: &str,
    description: &str,
    input_keys: &[&str],
    output_keys: &[&str],
    edges: &[&str],
) -> NodeMetadata {
    NodeMetadata {
        id: id.to_string(),
        name: name.to_string(),
        version: version.to_string(),
        description: description.to_string(),
        input_keys: input_keys.iter().map(|s| s.to_string()).collect(),
        output_keys: output_keys.iter().map(|s| s.to_string()).collect(),
        edges: edges.iter().map(|s| s.to_string()).collect(),
        hints: NodeHints::default(),
        source: NodeSource::default(),
        category: None,
    }
}

/// Helper used by node implementations to read a config key without
/// pulling in `serde_json::Map` plumbing at every call site.
pub fn config_get<'a>(config: &'a Value, key: &str) -> Option<&'a Value> {
    config.as_object()?.get(key)
}
