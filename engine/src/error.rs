//! Closed-set error kinds for the engine (spec §7). Every variant carries
//! the severity used to classify the matching `error:*` hook event.

use serde::Serialize;
use thiserror::Error;

/// Severity band attached to error-kind hook events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One validation failure, located by its path in the source document.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Top-level error enum. Every row of spec §7's table is one variant.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow validation failed: {} issue(s)", .0.len())]
    WorkflowValidation(Vec<ValidationIssue>),

    #[error("unknown node type {node_type:?} at {path}")]
    UnknownNode { node_type: String, path: String },

    #[error("cannot write path {path:?}: intermediate segment is not an object")]
    StateShape { path: String },

    #[error("state key missing: {path:?}")]
    StateKeyMissing { path: String },

    #[error("resolver exceeded max depth ({max})")]
    ResolverDepth { max: usize },

    #[error("node {node_id} failed: {message}")]
    NodeExecution {
        node_id: String,
        path: String,
        message: String,
    },

    #[error("loop at {path} exceeded {max} iterations")]
    LoopIterationLimit { path: String, max: usize },

    #[error("workflow exceeded its deadline")]
    Timeout,

    #[error("execution cancelled")]
    Cancelled,

    #[error("node id {0:?} already registered with different metadata")]
    DuplicateNode(String),

    #[error("node {id:?} has invalid metadata: {reason}")]
    InvalidNodeMetadata { id: String, reason: String },
}

impl EngineError {
    pub fn severity(&self) -> Severity {
        match self {
            EngineError::WorkflowValidation(_) => Severity::Medium,
            EngineError::UnknownNode { .. } => Severity::Medium,
            EngineError::StateShape { .. } => Severity::High,
            EngineError::StateKeyMissing { .. } => Severity::Medium,
            EngineError::ResolverDepth { .. } => Severity::High,
            EngineError::NodeExecution { .. } => Severity::High,
            EngineError::LoopIterationLimit { .. } => Severity::High,
            EngineError::Timeout => Severity::High,
            EngineError::Cancelled => Severity::Medium,
            EngineError::DuplicateNode(_) => Severity::Medium,
            EngineError::InvalidNodeMetadata { .. } => Severity::Medium,
        }
    }

    /// The error code surfaced in a terminal result, per spec §7.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::WorkflowValidation(_) => "WorkflowValidationError",
            EngineError::UnknownNode { .. } => "UnknownNodeError",
            EngineError::StateShape { .. } => "StateShapeError",
            EngineError::StateKeyMissing { .. } => "StateKeyMissingError",
            EngineError::ResolverDepth { .. } => "ResolverDepthError",
            EngineError::NodeExecution { .. } => "NodeExecutionError",
            EngineError::LoopIterationLimit { .. } => "LoopIterationLimitError",
            EngineError::Timeout => "TimeoutError",
            EngineError::Cancelled => "CancelledError",
            EngineError::DuplicateNode(_) => "DuplicateNodeError",
            EngineError::InvalidNodeMetadata { .. } => "InvalidNodeMetadataError",
        }
    }
}

/// Mirrors the teacher's `AppError`/`BlockchainError` manual `Serialize`
/// impl: external consumers (hook events, CLI output) only need the
/// human-readable message, not the Rust-side variant shape.
impl Serialize for EngineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
