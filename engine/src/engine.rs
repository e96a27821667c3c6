//! Execution Engine (spec §4.6): the single-threaded cooperative walker
//! that drives a parsed workflow to a terminal result. Grounded on the
//! teacher's `executor.rs` dispatch loop and `state_machine.rs`'s
//! graph-walking idiom, generalized from the teacher's DAG-with-joins
//! model to the specification's tree-with-named-edges model.

use crate::config::EngineConfig;
use crate::document::WorkflowDocument;
use crate::error::{EngineError, Result, Severity};
use crate::hookbus::{EventKind, HookBus, HookEvent};
use crate::node::{NodeStateView, StateWrites};
use crate::parser::{self, Invocation, ParsedStep, ParsedWorkflow};
use crate::registry::NodeRegistry;
use crate::resolver::Resolver;
use crate::state::StateManager;
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Cancelled,
    Error,
}

/// One node invocation's record in the terminal result (spec §4.6.2).
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeExecutionRecord {
    pub node_type: String,
    pub path: String,
    pub edge: Option<String>,
    pub duration_ms: u128,
    pub error: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub path: Option<String>,
    pub message: String,
}

/// The terminal result of a workflow execution (spec §4.6.2, §6.5).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionResult {
    pub outcome: Outcome,
    pub final_state: Value,
    pub terminal_edge: Option<String>,
    pub duration_ms: u128,
    pub records: Vec<NodeExecutionRecord>,
    pub error: Option<ErrorDetail>,
}

/// Whether a continuing subtree hit an explicit null edge (loop exit /
/// end-of-path) or ran to completion yielding an edge name with no
/// matching entry in its own body (spec §4.6.3 step 7/8).
#[derive(Debug, Clone)]
enum WalkResult {
    Null,
    Completed(Option<String>),
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generates a fresh execution identifier. Callers may supply their own
/// (spec §4.6.1 only requires "a generated execution identifier"), but
/// this covers the common case without every caller reaching for `uuid`
/// directly.
pub fn new_execution_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn is_locally_recoverable(err: &EngineError) -> bool {
    matches!(
        err,
        EngineError::StateShape { .. }
            | EngineError::StateKeyMissing { .. }
            | EngineError::ResolverDepth { .. }
            | EngineError::NodeExecution { .. }
    )
}

struct RunCtx<'a> {
    resolver: Resolver,
    registry: &'a NodeRegistry,
    bus: &'a HookBus,
    workflow_id: String,
    execution_id: String,
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
    node_timeout: Option<Duration>,
    max_loop_iterations: usize,
    records: Vec<NodeExecutionRecord>,
}

impl<'a> RunCtx<'a> {
    fn check_cancel(&self) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(EngineError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout);
            }
        }
        Ok(())
    }

    fn emit(&self, kind: EventKind, node_id: Option<String>, data: Value, severity: Option<Severity>) {
        self.bus.emit(HookEvent::new(
            kind,
            self.workflow_id.clone(),
            self.execution_id.clone(),
            node_id,
            now_ms(),
            data,
            severity,
        ));
    }
}

pub struct ExecutionEngine {
    config: EngineConfig,
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parses a raw document against `registry` using this engine's
    /// nesting-depth limit. A thin convenience wrapper so callers don't
    /// have to import `parser` directly.
    pub fn parse(&self, doc: &WorkflowDocument, registry: &NodeRegistry) -> Result<ParsedWorkflow> {
        parser::parse(doc, registry, self.config.max_nesting_depth)
    }

    /// Drives `workflow` to completion (spec §4.6).
    pub async fn execute(
        &self,
        workflow: &ParsedWorkflow,
        registry: &NodeRegistry,
        bus: &HookBus,
        initial_overlay: Option<Value>,
        execution_id: String,
        cancel: Arc<AtomicBool>,
    ) -> ExecutionResult {
        let start = Instant::now();
        let mut state = StateManager::initialize(Some(workflow.initial_state.clone()), initial_overlay);

        let mut ctx = RunCtx {
            resolver: Resolver::new(self.config.resolver_missing_key_policy, self.config.resolver_max_depth),
            registry,
            bus,
            workflow_id: workflow.id.clone(),
            execution_id,
            cancel,
            deadline: self.config.workflow_default_timeout.map(|d| Instant::now() + d),
            node_timeout: self.config.node_default_timeout,
            max_loop_iterations: self.config.max_loop_iterations,
            records: Vec::new(),
        };

        ctx.emit(EventKind::WorkflowBeforeStart, None, json!({}), None);

        let walk = run_sequence(self, &workflow.steps, &mut state, &mut ctx).await;

        let duration_ms = start.elapsed().as_millis();

        match walk {
            Ok(WalkResult::Null) => {
                ctx.emit(EventKind::WorkflowAfterEnd, None, json!({}), None);
                ExecutionResult {
                    outcome: Outcome::Completed,
                    final_state: state.snapshot(),
                    terminal_edge: None,
                    duration_ms,
                    records: ctx.records,
                    error: None,
                }
            }
            Ok(WalkResult::Completed(edge)) => {
                ctx.emit(EventKind::WorkflowAfterEnd, None, json!({}), None);
                ExecutionResult {
                    outcome: Outcome::Completed,
                    final_state: state.snapshot(),
                    terminal_edge: edge,
                    duration_ms,
                    records: ctx.records,
                    error: None,
                }
            }
            Err(EngineError::Cancelled) => {
                ctx.emit(EventKind::WorkflowCancelled, None, json!({}), Some(Severity::Medium));
                ExecutionResult {
                    outcome: Outcome::Cancelled,
                    final_state: state.snapshot(),
                    terminal_edge: None,
                    duration_ms,
                    records: ctx.records,
                    error: None,
                }
            }
            Err(err) => {
                let severity = err.severity();
                ctx.emit(
                    EventKind::WorkflowError,
                    None,
                    json!({ "message": err.to_string() }),
                    Some(severity),
                );
                ExecutionResult {
                    outcome: Outcome::Error,
                    final_state: state.snapshot(),
                    terminal_edge: None,
                    duration_ms,
                    records: ctx.records,
                    error: Some(ErrorDetail {
                        code: err.code().to_string(),
                        path: None,
                        message: err.to_string(),
                    }),
                }
            }
        }
    }
}

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs an ordered list of steps (the top-level `workflow` sequence, or
/// a sequence edge target), in source order. The sequence's own result
/// is that of its last-executed step (spec §4.6.3 step 7, sequence
/// bullet).
fn run_sequence<'a>(
    engine: &'a ExecutionEngine,
    steps: &'a [ParsedStep],
    state: &'a mut StateManager,
    ctx: &'a mut RunCtx<'a>,
) -> BoxFut<'a, Result<WalkResult>> {
    Box::pin(async move {
        let mut last = WalkResult::Completed(None);
        for step in steps {
            ctx.check_cancel()?;
            last = match step {
                ParsedStep::Setter { path, expression, .. } => {
                    let resolved = ctx.resolver.resolve(expression, &state.snapshot())?;
                    state.set(path, resolved)?;
                    WalkResult::Completed(None)
                }
                ParsedStep::Invocation(inv) => invoke(engine, inv, state, ctx).await?,
                ParsedStep::Sequence(inner) => run_sequence(engine, inner, state, ctx).await?,
                ParsedStep::Terminal => WalkResult::Null,
            };
        }
        Ok(last)
    })
}

/// Runs the invocation sub-procedure (spec §4.6.3), including loop
/// re-invocation (step 8) folded into an iteration loop rather than
/// true recursion, so loop depth does not grow the call stack.
fn invoke<'a>(
    engine: &'a ExecutionEngine,
    inv: &'a Invocation,
    state: &'a mut StateManager,
    ctx: &'a mut RunCtx<'a>,
) -> BoxFut<'a, Result<WalkResult>> {
    Box::pin(async move {
        let mut iterations: usize = 0;
        loop {
            ctx.check_cancel()?;

            let pass_result = run_invocation_pass(engine, inv, state, ctx).await;

            let edge_name = match pass_result {
                Ok(edge_name) => edge_name,
                Err(err) if !is_locally_recoverable(&err) => return Err(err),
                Err(err) => match inv.edges.get("error") {
                    Some(_) => {
                        state.set("error", json!(err.to_string()))?;
                        "error".to_string()
                    }
                    None => return Err(err),
                },
            };

            let target = inv.edges.get(&edge_name);
            let walk = match target {
                None => WalkResult::Completed(Some(edge_name)),
                Some(ParsedStep::Terminal) => WalkResult::Null,
                Some(ParsedStep::Sequence(steps)) => run_sequence(engine, steps, state, ctx).await?,
                Some(ParsedStep::Invocation(child)) => invoke(engine, child, state, ctx).await?,
                Some(ParsedStep::Setter { path, expression, .. }) => {
                    let resolved = ctx.resolver.resolve(expression, &state.snapshot())?;
                    state.set(path, resolved)?;
                    WalkResult::Completed(None)
                }
            };

            match walk {
                WalkResult::Null => return Ok(WalkResult::Null),
                WalkResult::Completed(bubbled) => {
                    if inv.is_loop {
                        iterations += 1;
                        if iterations >= ctx.max_loop_iterations {
                            return Err(EngineError::LoopIterationLimit {
                                path: inv.source_path.clone(),
                                max: ctx.max_loop_iterations,
                            });
                        }
                        continue;
                    }
                    return Ok(WalkResult::Completed(bubbled));
                }
            }
        }
    })
}

/// Steps 1-6 of the invocation sub-procedure: resolve, run inline
/// setters, invoke the node, apply writes, emit before/after events,
/// record the record. Returns the edge name the node (or its `error?`
/// routing) ultimately produced.
async fn run_invocation_pass<'a>(
    engine: &ExecutionEngine,
    inv: &'a Invocation,
    state: &mut StateManager,
    ctx: &mut RunCtx<'a>,
) -> Result<String> {
    let _ = engine;
    let pre_snapshot = state.snapshot();
    let resolved_config = {
        let mut map = serde_json::Map::with_capacity(inv.configuration.len());
        for (k, v) in &inv.configuration {
            map.insert(k.clone(), ctx.resolver.resolve(v, &pre_snapshot)?);
        }
        Value::Object(map)
    };

    ctx.emit(
        EventKind::NodeBeforeExecute,
        Some(inv.node_type.clone()),
        json!({ "path": inv.source_path, "config": resolved_config }),
        None,
    );

    for (path, expression) in &inv.setters {
        let resolved = ctx.resolver.resolve(expression, &state.snapshot())?;
        state.set(path, resolved)?;
    }

    let node = ctx
        .registry
        .lookup(&inv.node_type)
        .ok_or_else(|| EngineError::UnknownNode {
            node_type: inv.node_type.clone(),
            path: inv.source_path.clone(),
        })?;

    let started = Instant::now();
    let exec_snapshot = state.snapshot();
    let view = NodeStateView::new(&exec_snapshot);
    let exec_fut = node.execute(&resolved_config, &view);

    let outcome = match ctx.node_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, exec_fut).await {
            Ok(r) => r,
            Err(_) => Err(EngineError::Timeout),
        },
        None => exec_fut.await,
    };
    let duration_ms = started.elapsed().as_millis();

    match outcome {
        Ok(output) => {
            for (path, value) in output.writes.into_ordered() {
                state.set(&path, value)?;
            }
            if let (Some(result), [only_key]) = (&output.result, node.metadata().output_keys.as_slice()) {
                state.set(only_key, result.clone())?;
            }

            ctx.emit(
                EventKind::NodeAfterExecute,
                Some(inv.node_type.clone()),
                json!({ "path": inv.source_path, "edge": output.edge, "result": output.result }),
                None,
            );
            ctx.records.push(NodeExecutionRecord {
                node_type: inv.node_type.clone(),
                path: inv.source_path.clone(),
                edge: Some(output.edge.clone()),
                duration_ms,
                error: None,
            });
            Ok(output.edge)
        }
        Err(err) => {
            ctx.emit(
                EventKind::NodeError,
                Some(inv.node_type.clone()),
                json!({ "path": inv.source_path, "message": err.to_string() }),
                Some(err.severity()),
            );
            ctx.records.push(NodeExecutionRecord {
                node_type: inv.node_type.clone(),
                path: inv.source_path.clone(),
                edge: None,
                duration_ms,
                error: Some(err.to_string()),
            });
            Err(err)
        }
    }
}
