use crate::error::{EngineError, Result};
use crate::node::{config_get, metadata, Node, NodeMetadata, NodeOutput, NodeStateView, StateWrites};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Performs the arithmetic the resolver deliberately does not (spec §9
/// Open Questions): `"$.i + 1"`-style expressions resolve as literal
/// strings, so arithmetic lives here instead. Mirrors the teacher's
/// `handlers/decision.rs` shape of reading typed config and writing one
/// declared output key.
pub struct MathNode(NodeMetadata);

impl MathNode {
    pub fn new() -> Self {
        Self(metadata(
            "math",
            "Math",
            "1.0.0",
            "Applies an arithmetic operation over resolved numeric values.",
            &["operation", "values"],
            &["mathResult"],
            &["success", "error"],
        ))
    }
}

impl Default for MathNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for MathNode {
    fn metadata(&self) -> &NodeMetadata {
        &self.0
    }

    async fn execute(&self, config: &Value, _state: &NodeStateView<'_>) -> Result<NodeOutput> {
        let operation = config_get(config, "operation").and_then(|v| v.as_str()).unwrap_or("add");
        let values: Vec<f64> = config_get(config, "values")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_f64()).collect())
            .unwrap_or_default();

        let result = match operation {
            "add" => values.iter().sum(),
            "multiply" => values.iter().product(),
            "subtract" => values.split_first().map(|(h, t)| t.iter().fold(*h, |a, b| a - b)).unwrap_or(0.0),
            "max" => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            "min" => values.iter().cloned().fold(f64::INFINITY, f64::min),
            other => {
                return Err(EngineError::NodeExecution {
                    node_id: "math".to_string(),
                    path: String::new(),
                    message: format!("unsupported operation {other:?}"),
                })
            }
        };

        let result_value = numeric_result(result);
        let mut writes = StateWrites::new();
        writes.write("mathResult", result_value.clone());
        Ok(NodeOutput::edge("success").with_writes(writes).with_result(result_value))
    }
}

/// Renders an integral result as a JSON integer (`3`, not `3.0`) so that
/// template interpolation (`"got {{$.mathResult}}"`) stringifies it the
/// way a human-authored workflow expects; non-integral results keep
/// their full floating-point form.
fn numeric_result(result: f64) -> Value {
    if result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
        json!(result as i64)
    } else {
        json!(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn adds_resolved_values() {
        let node = MathNode::new();
        let state = Value::Null;
        let view = NodeStateView::new(&state);
        let output = node
            .execute(&json!({ "operation": "add", "values": [1, 2, 3] }), &view)
            .await
            .unwrap();
        assert_eq!(output.edge, "success");
        assert_eq!(output.result, Some(json!(6)));
    }

    #[tokio::test]
    async fn unsupported_operation_errors() {
        let node = MathNode::new();
        let state = Value::Null;
        let view = NodeStateView::new(&state);
        let err = node
            .execute(&json!({ "operation": "bogus", "values": [] }), &view)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NodeExecution { .. }));
    }
}
