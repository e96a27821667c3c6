//! State Manager (spec §4.1): an in-memory, per-execution keyed map with
//! dotted-path accessors. Owned exclusively by the Execution Engine for
//! the duration of a single workflow run (spec §3.6) — no internal
//! locking, the caller serializes access.

use crate::error::{EngineError, Result};
use serde_json::{Map, Value};

#[derive(Debug, Default, Clone)]
pub struct StateManager {
    root: Map<String, Value>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds state from the workflow's initial map, optionally overlaid
    /// by caller-provided values (overlay keys win), per spec §4.6.1.
    pub fn initialize(seed: Option<Value>, overlay: Option<Value>) -> Self {
        let mut root = match seed {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if let Some(Value::Object(over)) = overlay {
            for (k, v) in over {
                root.insert(k, v);
            }
        }
        Self { root }
    }

    /// Segment-wise lookup. Returns `None` at any missing segment,
    /// matching the "undefined" semantics of spec §3.2/§4.1.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = self.root.get(first_segment(path))?;
        for segment in segments(path).skip(1) {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Creates intermediate objects as needed; overwrites any existing
    /// leaf or intermediate object. Fails with `StateShapeError` if an
    /// intermediate segment already holds a non-object value.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let segs: Vec<&str> = segments(path).collect();
        if segs.is_empty() {
            return Ok(());
        }
        if segs.len() == 1 {
            self.root.insert(segs[0].to_string(), value);
            return Ok(());
        }

        let mut current = self
            .root
            .entry(segs[0].to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        for segment in &segs[1..segs.len() - 1] {
            if !current.is_object() {
                return Err(EngineError::StateShape {
                    path: path.to_string(),
                });
            }
            current = current
                .as_object_mut()
                .unwrap()
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        if !current.is_object() {
            return Err(EngineError::StateShape {
                path: path.to_string(),
            });
        }
        current
            .as_object_mut()
            .unwrap()
            .insert(segs[segs.len() - 1].to_string(), value);
        Ok(())
    }

    /// An immutable view suitable for event payloads and the Resolver.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.root.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.root.keys().cloned().collect()
    }
}

fn first_segment(path: &str) -> &str {
    segments(path).next().unwrap_or(path)
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}
