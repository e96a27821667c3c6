//! `flowcore`: a JSON-defined workflow execution engine. A declarative
//! workflow document (node invocations, edge-directed branching, loops,
//! inline sub-trees, state setters) is parsed and validated against a
//! registry of node implementations, then executed against a mutable
//! keyed state map while emitting lifecycle events.
//!
//! Leaves-first module order mirrors the dependency order of the
//! system: [`state`] and [`resolver`] have no internal dependencies;
//! [`engine`] depends on all of them.

pub mod builtin;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod hookbus;
pub mod node;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod state;
pub mod utils;

pub use config::EngineConfig;
pub use document::WorkflowDocument;
pub use engine::{new_execution_id, ExecutionEngine, ExecutionResult, Outcome};
pub use error::{EngineError, Result};
pub use hookbus::{EventKind, HookBus, HookEvent};
pub use node::{Node, NodeMetadata, NodeOutput, NodeSource, NodeStateView, StateWrites};
pub use parser::{ParsedWorkflow, ValidationReport};
pub use registry::NodeRegistry;
pub use resolver::{MissingKeyPolicy, Resolver};
pub use state::StateManager;
