use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use flowcore::{builtin, EngineConfig, ExecutionEngine, HookBus, NodeRegistry, Outcome, WorkflowDocument};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Subscribes a trace-printing handler to every lifecycle event the
/// engine emits, standing in for "a transport" at the contract surface
/// described in spec §4.5/§6.3 without implementing WebSocket/IPC.
fn attach_trace(bus: &HookBus) {
    bus.register(
        None,
        Box::new(|event| {
            eprintln!(
                "[{}] {} node={:?}",
                event.timestamp, event.kind_name, event.node_id
            );
        }),
    );
}

#[derive(Args, Clone, Debug)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub command: WorkflowCommands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum WorkflowCommands {
    /// Parses and validates a workflow document without executing it.
    Validate {
        /// Path to the workflow document (JSON).
        path: String,
    },
    /// Runs a workflow document to completion against the builtin node registry.
    Run {
        /// Path to the workflow document (JSON).
        path: String,
        /// Optional JSON object overlaid on the workflow's initial state.
        #[arg(long)]
        state: Option<String>,
        /// Streams lifecycle events to stderr as they are emitted.
        #[arg(long)]
        trace: bool,
    },
    /// Lists the node ids available in the builtin registry.
    ListNodes,
}

fn builtin_registry() -> Result<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    builtin::register_all(&mut registry).context("registering builtin nodes")?;
    Ok(registry)
}

fn load_document(path: &str) -> Result<WorkflowDocument> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {path} as a workflow document"))
}

pub async fn handle(args: WorkflowArgs) -> Result<()> {
    match args.command {
        WorkflowCommands::ListNodes => {
            let registry = builtin_registry()?;
            for meta in registry.list(None) {
                println!("{} ({}) - {}", meta.id, meta.version, meta.description);
            }
        }
        WorkflowCommands::Validate { path } => {
            let doc = load_document(&path)?;
            let registry = builtin_registry()?;
            let engine = ExecutionEngine::new(EngineConfig::default());
            let report = flowcore::parser::validate(&doc, &registry, engine.config().max_nesting_depth);
            if report.valid {
                println!("valid");
            } else {
                for issue in &report.errors {
                    println!("error at {}: {}", issue.path, issue.message);
                }
                anyhow::bail!("{} validation error(s)", report.errors.len());
            }
            for warning in &report.warnings {
                println!("warning at {}: {}", warning.path, warning.message);
            }
        }
        WorkflowCommands::Run { path, state, trace } => {
            let doc = load_document(&path)?;
            let registry = builtin_registry()?;
            let engine = ExecutionEngine::new(EngineConfig::default());
            let parsed = engine.parse(&doc, &registry).context("parsing workflow")?;

            let overlay = state
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .context("parsing --state as JSON")?;

            let bus = HookBus::new(engine.config().event_buffer_capacity);
            if trace {
                attach_trace(&bus);
            }
            let execution_id = flowcore::new_execution_id();
            let result = engine
                .execute(&parsed, &registry, &bus, overlay, execution_id, Arc::new(AtomicBool::new(false)))
                .await;

            println!("{}", serde_json::to_string_pretty(&result)?);

            if result.outcome != Outcome::Completed {
                anyhow::bail!("workflow did not complete: {:?}", result.outcome);
            }
        }
    }
    Ok(())
}
