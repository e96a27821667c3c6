//! Demonstration node implementations (`log`, `math`, `noop`), grounded
//! on the teacher's `handlers/task.rs` and `handlers/decision.rs`
//! idioms. These are not part of the core contract — the core never
//! ships concrete nodes (spec §1, Out-of-scope) — but integration
//! tests and the CLI's default registry need *something* registered,
//! the same way the teacher's handler modules demonstrate `NodeHandler`.

mod log;
mod math;
mod noop;

pub use log::LogNode;
pub use math::MathNode;
pub use noop::NoopNode;

use crate::registry::NodeRegistry;
use std::sync::Arc;

/// Registers the three demonstration nodes into `registry`.
pub fn register_all(registry: &mut NodeRegistry) -> crate::error::Result<()> {
    registry.register(Arc::new(LogNode::new()))?;
    registry.register(Arc::new(MathNode::new()))?;
    registry.register(Arc::new(NoopNode::new()))?;
    Ok(())
}
