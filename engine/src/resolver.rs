//! State Resolver (spec §4.2): the only place state is embedded into
//! configuration. Pure — no state writes, no mutable state of its own.

use crate::error::{EngineError, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// What to do when a full reference's path is absent from state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingKeyPolicy {
    #[default]
    Undefined,
    Preserve,
    Throw,
}

#[derive(Debug, Clone)]
pub struct Resolver {
    missing_key_policy: MissingKeyPolicy,
    max_depth: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            missing_key_policy: MissingKeyPolicy::default(),
            max_depth: 10,
        }
    }
}

fn full_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\$\.[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap()
    })
}

fn template_occurrence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*\$\.([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*\}\}")
            .unwrap()
    })
}

impl Resolver {
    pub fn new(missing_key_policy: MissingKeyPolicy, max_depth: usize) -> Self {
        Self {
            missing_key_policy,
            max_depth,
        }
    }

    /// Rewrites `value` by substituting state references, recursively,
    /// against the given state snapshot.
    pub fn resolve(&self, value: &Value, state: &Value) -> Result<Value> {
        self.resolve_depth(value, state, 0)
    }

    fn resolve_depth(&self, value: &Value, state: &Value, depth: usize) -> Result<Value> {
        if depth > self.max_depth {
            return Err(EngineError::ResolverDepth {
                max: self.max_depth,
            });
        }
        match value {
            Value::String(s) => self.resolve_string(s, state),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_depth(item, state, depth + 1)?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve_depth(v, state, depth + 1)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&self, s: &str, state: &Value) -> Result<Value> {
        if full_reference_re().is_match(s) {
            let path = &s[2..];
            return self.lookup_full_reference(path, s, state);
        }
        if template_occurrence_re().is_match(s) {
            let mut out = String::with_capacity(s.len());
            let mut last_end = 0;
            for caps in template_occurrence_re().captures_iter(s) {
                let whole = caps.get(0).unwrap();
                let path = caps.get(1).unwrap().as_str();
                out.push_str(&s[last_end..whole.start()]);
                out.push_str(&stringify_for_template(lookup_path(state, path)));
                last_end = whole.end();
            }
            out.push_str(&s[last_end..]);
            return Ok(Value::String(out));
        }
        Ok(Value::String(s.to_string()))
    }

    fn lookup_full_reference(&self, path: &str, original: &str, state: &Value) -> Result<Value> {
        match lookup_path(state, path) {
            Some(v) => Ok(v.clone()),
            None => match self.missing_key_policy {
                MissingKeyPolicy::Undefined => Ok(Value::Null),
                MissingKeyPolicy::Preserve => Ok(Value::String(original.to_string())),
                MissingKeyPolicy::Throw => Err(EngineError::StateKeyMissing {
                    path: path.to_string(),
                }),
            },
        }
    }
}

fn lookup_path<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = state;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Template stringification rules (spec §4.2): null/undefined -> "",
/// objects/lists -> JSON text, scalars -> their standard string form.
fn stringify_for_template(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Object(_) | Value::Array(_))) => v.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_reference_preserves_type() {
        let r = Resolver::default();
        let state = json!({"n": 3, "obj": {"x": 1}, "list": [1, 2]});
        assert_eq!(r.resolve(&json!("$.n"), &state).unwrap(), json!(3));
        assert_eq!(
            r.resolve(&json!("$.obj"), &state).unwrap(),
            json!({"x": 1})
        );
        assert_eq!(r.resolve(&json!("$.list"), &state).unwrap(), json!([1, 2]));
    }

    #[test]
    fn template_always_yields_string() {
        let r = Resolver::default();
        let state = json!({"mathResult": 3});
        assert_eq!(
            r.resolve(&json!("got {{$.mathResult}}"), &state).unwrap(),
            json!("got 3")
        );
    }

    #[test]
    fn template_missing_key_is_silent_empty_string() {
        let r = Resolver::default();
        let state = json!({});
        assert_eq!(
            r.resolve(&json!("hello {{$.missing}}!"), &state).unwrap(),
            json!("hello !")
        );
    }

    #[test]
    fn full_reference_missing_key_policies() {
        let state = json!({});
        assert_eq!(
            Resolver::new(MissingKeyPolicy::Undefined, 10)
                .resolve(&json!("$.missing"), &state)
                .unwrap(),
            Value::Null
        );
        assert_eq!(
            Resolver::new(MissingKeyPolicy::Preserve, 10)
                .resolve(&json!("$.missing"), &state)
                .unwrap(),
            json!("$.missing")
        );
        let err = Resolver::new(MissingKeyPolicy::Throw, 10)
            .resolve(&json!("$.missing"), &state)
            .unwrap_err();
        assert!(matches!(err, EngineError::StateKeyMissing { .. }));
    }

    #[test]
    fn recursion_over_lists_and_objects() {
        let r = Resolver::default();
        let state = json!({"n": 1});
        let input = json!({"a": ["$.n", "literal", {"b": "{{$.n}}"}]});
        let resolved = r.resolve(&input, &state).unwrap();
        assert_eq!(resolved, json!({"a": [1, "literal", {"b": "1"}]}));
    }

    #[test]
    fn non_reference_string_is_literal_passthrough() {
        // Resolves "$.i + 1" as a literal string: not a full reference
        // (fails the grammar) and not a template (no {{...}} wrapper).
        let r = Resolver::default();
        let state = json!({"i": 1});
        assert_eq!(
            r.resolve(&json!("$.i + 1"), &state).unwrap(),
            json!("$.i + 1")
        );
    }

    #[test]
    fn idempotent_on_state_free_values() {
        let r = Resolver::default();
        let state = json!({"n": 1});
        let config = json!({"a": 1, "b": [true, null, "plain"]});
        let once = r.resolve(&config, &state).unwrap();
        assert_eq!(once, config);
    }

    #[test]
    fn depth_cap_exceeded_fails() {
        let r = Resolver::new(MissingKeyPolicy::Undefined, 1);
        let state = json!({});
        let nested = json!({"a": {"b": {"c": "x"}}});
        let err = r.resolve(&nested, &state).unwrap_err();
        assert!(matches!(err, EngineError::ResolverDepth { .. }));
    }
}
