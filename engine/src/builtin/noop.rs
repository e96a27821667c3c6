use crate::error::Result;
use crate::node::{metadata, Node, NodeMetadata, NodeOutput, NodeStateView};
use async_trait::async_trait;
use serde_json::Value;

/// Always succeeds without touching state. Useful as a placeholder edge
/// target while a workflow document is still being authored.
pub struct NoopNode(NodeMetadata);

impl NoopNode {
    pub fn new() -> Self {
        Self(metadata("noop", "No-op", "1.0.0", "Does nothing; always routes to success.", &[], &[], &["success"]))
    }
}

impl Default for NoopNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for NoopNode {
    fn metadata(&self) -> &NodeMetadata {
        &self.0
    }

    async fn execute(&self, _config: &Value, _state: &NodeStateView<'_>) -> Result<NodeOutput> {
        Ok(NodeOutput::edge("success"))
    }
}
