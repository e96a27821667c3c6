//! End-to-end scenarios straight out of the component design's
//! worked examples: a loop that increments state via a builtin node
//! and a dedicated setter, terminating on a comparison edge.

use flowcore::builtin::MathNode;
use flowcore::node::{config_get, metadata, Node, NodeMetadata, NodeOutput, NodeStateView};
use flowcore::{EngineConfig, EngineError, ExecutionEngine, HookBus, NodeRegistry, Outcome, WorkflowDocument};
use serde_json::{json, Value};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

struct LessThanNode(NodeMetadata);

#[async_trait::async_trait]
impl Node for LessThanNode {
    fn metadata(&self) -> &NodeMetadata {
        &self.0
    }

    async fn execute(&self, config: &Value, _state: &NodeStateView<'_>) -> flowcore::Result<NodeOutput> {
        let i = config_get(config, "i").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let bound = config_get(config, "bound").and_then(|v| v.as_f64()).unwrap_or(0.0);
        Ok(NodeOutput::edge(if i < bound { "true" } else { "false" }))
    }
}

fn doc(workflow: Value, initial_state: Value) -> WorkflowDocument {
    WorkflowDocument {
        id: "loop-demo".to_string(),
        name: "Loop demo".to_string(),
        version: "1.0.0".to_string(),
        initial_state: Some(initial_state),
        workflow: workflow.as_array().unwrap().clone(),
    }
}

#[tokio::test]
async fn loop_increments_until_bound_then_exits() {
    let mut registry = NodeRegistry::new();
    registry
        .register(Arc::new(LessThanNode(metadata(
            "logic",
            "Logic",
            "1.0.0",
            "",
            &["i", "bound"],
            &[],
            &["true", "false"],
        ))))
        .unwrap();
    registry.register(Arc::new(MathNode::new())).unwrap();

    let d = doc(
        json!([
            { "logic...": {
                "i": "$.i", "bound": 3,
                "true?": [
                    { "math": { "operation": "add", "values": ["$.i", 1] } },
                    { "$.i": "$.mathResult" }
                ],
                "false?": null
            } }
        ]),
        json!({ "i": 0 }),
    );

    let engine = ExecutionEngine::new(EngineConfig::default());
    let parsed = engine.parse(&d, &registry).unwrap();
    let bus = HookBus::new(100);
    let result = engine
        .execute(&parsed, &registry, &bus, None, "exec-loop".to_string(), Arc::new(AtomicBool::new(false)))
        .await;

    assert_eq!(result.outcome, Outcome::Completed);
    assert_eq!(result.final_state["i"], json!(3));
    // one math invocation per loop iteration plus one logic invocation per
    // iteration including the final false-taking check: 3 iterations that
    // loop, plus the 4th that exits.
    assert_eq!(result.records.iter().filter(|r| r.node_type == "logic").count(), 4);
    assert_eq!(result.records.iter().filter(|r| r.node_type == "math").count(), 3);
}

#[tokio::test]
async fn unknown_node_is_rejected_at_parse_time() {
    let registry = NodeRegistry::new();
    let d = doc(json!([{ "nonexistent": {} }]), json!({}));
    let engine = ExecutionEngine::new(EngineConfig::default());
    let err = engine.parse(&d, &registry).unwrap_err();
    match err {
        EngineError::WorkflowValidation(issues) => {
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].path, "workflow[0]");
        }
        other => panic!("expected WorkflowValidation, got {other:?}"),
    }
}
