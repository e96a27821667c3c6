//! Engine configuration (spec §6.4). A plain caller-constructed struct,
//! deliberately not a global singleton — Design Notes §9 calls out the
//! teacher's process-wide-singleton pattern as something a systems
//! language should realize as explicit instances passed down instead.

use crate::resolver::MissingKeyPolicy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_nesting_depth: usize,
    pub max_loop_iterations: usize,
    pub resolver_max_depth: usize,
    pub resolver_missing_key_policy: MissingKeyPolicy,
    pub event_buffer_capacity: usize,
    pub node_default_timeout: Option<Duration>,
    pub workflow_default_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 32,
            max_loop_iterations: 10_000,
            resolver_max_depth: 10,
            resolver_missing_key_policy: MissingKeyPolicy::Undefined,
            event_buffer_capacity: 1000,
            node_default_timeout: None,
            workflow_default_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_specified_values() {
        let c = EngineConfig::default();
        assert_eq!(c.max_nesting_depth, 32);
        assert_eq!(c.max_loop_iterations, 10_000);
        assert_eq!(c.resolver_max_depth, 10);
        assert_eq!(c.resolver_missing_key_policy, MissingKeyPolicy::Undefined);
        assert_eq!(c.event_buffer_capacity, 1000);
        assert!(c.node_default_timeout.is_none());
        assert!(c.workflow_default_timeout.is_none());
    }
}
