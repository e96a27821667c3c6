use crate::error::Result;
use crate::node::{config_get, metadata, Node, NodeMetadata, NodeOutput, NodeStateView};
use async_trait::async_trait;
use serde_json::Value;

/// Emits a resolved message through `tracing`. Mirrors the teacher's
/// `handlers/task.rs` pattern of a single-purpose, stateless handler.
pub struct LogNode(NodeMetadata);

impl LogNode {
    pub fn new() -> Self {
        Self(metadata(
            "log",
            "Log",
            "1.0.0",
            "Writes a resolved message to the tracing log.",
            &["message", "level"],
            &[],
            &["success"],
        ))
    }
}

impl Default for LogNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for LogNode {
    fn metadata(&self) -> &NodeMetadata {
        &self.0
    }

    async fn execute(&self, config: &Value, _state: &NodeStateView<'_>) -> Result<NodeOutput> {
        let message = config_get(config, "message")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        match config_get(config, "level").and_then(|v| v.as_str()) {
            Some("warn") => tracing::warn!("{message}"),
            Some("error") => tracing::error!("{message}"),
            _ => tracing::info!("{message}"),
        }
        Ok(NodeOutput::edge("success"))
    }
}
