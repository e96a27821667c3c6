//! Workflow Parser/Validator (spec §4.4): turns a raw `WorkflowDocument`
//! into the parsed tree of §3.4, or collects a flat list of issues.
//! Mirrors the teacher's `compiler.rs` document-to-tree shape; the
//! grammar itself (node/setter/edge keys) is this specification's own.

use crate::document::{
    is_setter_key, is_valid_semver, parse_node_key, partition_body, WorkflowDocument,
};
use crate::error::{EngineError, Result, ValidationIssue};
use crate::registry::NodeRegistry;
use serde_json::Value;
use std::collections::HashMap;

/// One node invocation in the parsed tree (spec §3.4).
#[derive(Debug, Clone)]
pub struct Invocation {
    pub node_type: String,
    pub is_loop: bool,
    pub configuration: serde_json::Map<String, Value>,
    pub setters: Vec<(String, Value)>,
    pub edges: HashMap<String, ParsedStep>,
    pub source_path: String,
}

/// A node in the parsed tree: an invocation, a sequence of steps, a
/// state setter, or a terminal (spec §3.4).
#[derive(Debug, Clone)]
pub enum ParsedStep {
    Invocation(Box<Invocation>),
    Sequence(Vec<ParsedStep>),
    Setter {
        path: String,
        expression: Value,
        source_path: String,
    },
    Terminal,
}

#[derive(Debug, Clone)]
pub struct ParsedWorkflow {
    pub id: String,
    pub name: String,
    pub version: String,
    pub initial_state: Value,
    pub steps: Vec<ParsedStep>,
    /// Non-fatal issues collected while parsing (unmatched edge names,
    /// loop nodes with no null exit) — spec §4.4's "surfaced ... as
    /// warnings" rule. Parsing still succeeds when only warnings fire.
    pub warnings: Vec<ValidationIssue>,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

struct ParseCtx<'a> {
    registry: &'a NodeRegistry,
    max_depth: usize,
    issues: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

/// Parses a document into the internal tree. Fails with
/// `WorkflowValidationError` carrying every structural/semantic issue
/// found, not just the first (spec §4.4 "Outputs").
pub fn parse(doc: &WorkflowDocument, registry: &NodeRegistry, max_nesting_depth: usize) -> Result<ParsedWorkflow> {
    let mut ctx = ParseCtx {
        registry,
        max_depth: max_nesting_depth,
        issues: Vec::new(),
        warnings: Vec::new(),
    };
    check_header(doc, &mut ctx.issues);

    let steps: Vec<ParsedStep> = doc
        .workflow
        .iter()
        .enumerate()
        .map(|(i, v)| parse_step(v, &format!("workflow[{i}]"), 0, &mut ctx))
        .collect();

    if !ctx.issues.is_empty() {
        return Err(EngineError::WorkflowValidation(ctx.issues));
    }

    Ok(ParsedWorkflow {
        id: doc.id.clone(),
        name: doc.name.clone(),
        version: doc.version.clone(),
        initial_state: doc.initial_state.clone().unwrap_or_else(|| Value::Object(Default::default())),
        steps,
        warnings: ctx.warnings,
    })
}

/// Runs the same checks as `parse` without building a tree, suitable
/// for pre-flight validation (spec §4.4). Unlike `parse`, always runs to
/// completion and reports both errors and warnings.
pub fn validate(doc: &WorkflowDocument, registry: &NodeRegistry, max_nesting_depth: usize) -> ValidationReport {
    let mut ctx = ParseCtx {
        registry,
        max_depth: max_nesting_depth,
        issues: Vec::new(),
        warnings: Vec::new(),
    };
    check_header(doc, &mut ctx.issues);
    for (i, v) in doc.workflow.iter().enumerate() {
        parse_step(v, &format!("workflow[{i}]"), 0, &mut ctx);
    }

    ValidationReport {
        valid: ctx.issues.is_empty(),
        errors: ctx.issues,
        warnings: ctx.warnings,
    }
}

fn check_header(doc: &WorkflowDocument, issues: &mut Vec<ValidationIssue>) {
    if doc.id.trim().is_empty() {
        issues.push(ValidationIssue::new("id", "workflow id must not be empty"));
    }
    if doc.name.trim().is_empty() {
        issues.push(ValidationIssue::new("name", "workflow name must not be empty"));
    }
    if !is_valid_semver(&doc.version) {
        issues.push(ValidationIssue::new(
            "version",
            format!("{:?} is not a valid semantic version", doc.version),
        ));
    }
}

/// Parses one step (a workflow-array entry or an edge target object):
/// either a node-invocation object or a state-setter object, each with
/// exactly one top-level key (spec §3.1, §4.4).
fn parse_step(value: &Value, path: &str, depth: usize, ctx: &mut ParseCtx) -> ParsedStep {
    if depth > ctx.max_depth {
        ctx.issues.push(ValidationIssue::new(
            path,
            format!("nesting depth exceeds limit of {}", ctx.max_depth),
        ));
        return ParsedStep::Terminal;
    }

    let Some(map) = value.as_object() else {
        ctx.issues.push(ValidationIssue::new(path, "step must be a JSON object"));
        return ParsedStep::Terminal;
    };

    if map.len() != 1 {
        ctx.issues.push(ValidationIssue::new(
            path,
            format!("step must have exactly one top-level key, found {}", map.len()),
        ));
        return ParsedStep::Terminal;
    }

    let (key, body) = map.iter().next().unwrap();

    if is_setter_key(key) {
        return ParsedStep::Setter {
            path: key[2..].to_string(),
            expression: body.clone(),
            source_path: path.to_string(),
        };
    }

    parse_invocation(key, body, path, depth, ctx)
}

fn parse_invocation(
    raw_key: &str,
    body: &Value,
    path: &str,
    depth: usize,
    ctx: &mut ParseCtx,
) -> ParsedStep {
    let node_key = parse_node_key(raw_key);

    if !ctx.registry.has(&node_key.node_type) {
        ctx.issues.push(ValidationIssue::new(
            path,
            format!("unknown node type {:?}", node_key.node_type),
        ));
    }

    let partitioned = partition_body(body);
    let mut edges = HashMap::with_capacity(partitioned.edges.len());
    let mut has_null_exit = false;

    for (edge_name, target) in &partitioned.edges {
        if target.is_null() {
            has_null_exit = true;
        }
        let edge_path = format!("{path}.{edge_name}?");
        let parsed_target = parse_edge_target(target, &edge_path, depth + 1, ctx);
        edges.insert(edge_name.clone(), parsed_target);
    }

    if let Some(declared) = ctx.registry.metadata(&node_key.node_type) {
        let declared_edges: std::collections::HashSet<&str> =
            declared.edges.iter().map(|s| s.as_str()).collect();
        for edge_name in edges.keys() {
            if !declared_edges.is_empty() && !declared_edges.contains(edge_name.as_str()) {
                ctx.warnings.push(ValidationIssue::new(
                    format!("{path}.{edge_name}?"),
                    format!(
                        "edge {edge_name:?} is not declared by node {:?}",
                        node_key.node_type
                    ),
                ));
            }
        }
    }

    if node_key.is_loop && !has_null_exit {
        ctx.warnings.push(ValidationIssue::new(
            path,
            format!(
                "loop node {:?} declares no edge target that terminates (null)",
                node_key.node_type
            ),
        ));
    }

    ParsedStep::Invocation(Box::new(Invocation {
        node_type: node_key.node_type,
        is_loop: node_key.is_loop,
        configuration: partitioned.configuration,
        setters: partitioned.setters,
        edges,
        source_path: path.to_string(),
    }))
}

/// An edge target (spec §3.1): a node invocation, a sequence, a state
/// setter, or null.
fn parse_edge_target(value: &Value, path: &str, depth: usize, ctx: &mut ParseCtx) -> ParsedStep {
    if depth > ctx.max_depth {
        ctx.issues.push(ValidationIssue::new(
            path,
            format!("nesting depth exceeds limit of {}", ctx.max_depth),
        ));
        return ParsedStep::Terminal;
    }
    match value {
        Value::Null => ParsedStep::Terminal,
        Value::Array(items) => ParsedStep::Sequence(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| parse_step(v, &format!("{path}[{i}]"), depth + 1, ctx))
                .collect(),
        ),
        Value::Object(_) => parse_step(value, path, depth, ctx),
        _ => {
            ctx.issues.push(ValidationIssue::new(
                path,
                "edge target must be a node invocation, a sequence, a state setter, or null",
            ));
            ParsedStep::Terminal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{metadata, Node, NodeMetadata, NodeOutput, NodeStateView};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct StubNode(NodeMetadata);

    #[async_trait]
    impl Node for StubNode {
        fn metadata(&self) -> &NodeMetadata {
            &self.0
        }
        async fn execute(&self, _c: &Value, _s: &NodeStateView<'_>) -> Result<NodeOutput> {
            Ok(NodeOutput::edge("success"))
        }
    }

    fn registry_with(ids: &[&str]) -> NodeRegistry {
        let mut r = NodeRegistry::new();
        for id in ids {
            r.register(Arc::new(StubNode(metadata(
                id,
                id,
                "1.0.0",
                "",
                &[],
                &[],
                &["success", "error"],
            ))))
            .unwrap();
        }
        r
    }

    fn doc(workflow: Value) -> WorkflowDocument {
        WorkflowDocument {
            id: "wf".to_string(),
            name: "Workflow".to_string(),
            version: "1.0.0".to_string(),
            initial_state: Some(json!({"n": 1})),
            workflow: workflow.as_array().unwrap().clone(),
        }
    }

    #[test]
    fn parses_linear_success_scenario() {
        let registry = registry_with(&["math", "log"]);
        let d = doc(json!([
            { "math": { "operation": "add", "values": ["$.n", 2],
                        "success?": { "log": { "message": "got {{$.mathResult}}" } } } }
        ]));
        let parsed = parse(&d, &registry, 32).unwrap();
        assert_eq!(parsed.steps.len(), 1);
        match &parsed.steps[0] {
            ParsedStep::Invocation(inv) => {
                assert_eq!(inv.node_type, "math");
                assert!(!inv.is_loop);
                assert!(inv.edges.contains_key("success"));
            }
            other => panic!("expected invocation, got {other:?}"),
        }
    }

    #[test]
    fn unknown_node_rejected_with_path() {
        let registry = registry_with(&[]);
        let d = doc(json!([{ "nonexistent": {} }]));
        let err = parse(&d, &registry, 32).unwrap_err();
        match err {
            EngineError::WorkflowValidation(issues) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].path, "workflow[0]");
                assert!(issues[0].message.contains("nonexistent"));
            }
            other => panic!("expected WorkflowValidation, got {other:?}"),
        }
    }

    #[test]
    fn loop_marker_without_null_exit_warns() {
        let registry = registry_with(&["logic"]);
        let d = doc(json!([
            { "logic...": { "expr": "$.i", "true?": { "logic...": {} } } }
        ]));
        let parsed = parse(&d, &registry, 32).unwrap();
        assert!(matches!(&parsed.steps[0], ParsedStep::Invocation(_)));
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].message.contains("no edge target that terminates"));
    }

    #[test]
    fn unmatched_edge_name_warns_not_errors() {
        let registry = registry_with(&["math"]);
        let d = doc(json!([
            { "math": { "weird?": null } }
        ]));
        let report = validate(&d, &registry, 32);
        assert!(report.valid);
        assert_eq!(report.errors.len(), 0);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].message.contains("weird"));
    }

    #[test]
    fn setter_step_parses_path_and_expression() {
        let registry = registry_with(&[]);
        let d = doc(json!([{ "$.completed": true }]));
        let parsed = parse(&d, &registry, 32).unwrap();
        match &parsed.steps[0] {
            ParsedStep::Setter { path, expression, .. } => {
                assert_eq!(path, "completed");
                assert_eq!(expression, &json!(true));
            }
            other => panic!("expected setter, got {other:?}"),
        }
    }

    #[test]
    fn bad_version_rejected() {
        let registry = registry_with(&[]);
        let mut d = doc(json!([]));
        d.version = "v1".to_string();
        let err = parse(&d, &registry, 32).unwrap_err();
        assert!(matches!(err, EngineError::WorkflowValidation(_)));
    }

    #[test]
    fn multi_key_step_rejected() {
        let registry = registry_with(&["log"]);
        let d = doc(json!([{ "log": {}, "other": {} }]));
        let err = parse(&d, &registry, 32).unwrap_err();
        assert!(matches!(err, EngineError::WorkflowValidation(_)));
    }

    #[test]
    fn sequence_edge_target_parses_in_order() {
        let registry = registry_with(&["a", "b"]);
        let d = doc(json!([
            { "a": { "next?": [ { "b": {} }, { "$.done": true } ] } }
        ]));
        let parsed = parse(&d, &registry, 32).unwrap();
        match &parsed.steps[0] {
            ParsedStep::Invocation(inv) => match inv.edges.get("next").unwrap() {
                ParsedStep::Sequence(steps) => assert_eq!(steps.len(), 2),
                other => panic!("expected sequence, got {other:?}"),
            },
            other => panic!("expected invocation, got {other:?}"),
        }
    }
}
