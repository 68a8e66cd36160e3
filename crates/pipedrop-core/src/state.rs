use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::jsonpath::{self, Step};

/// Top-level key holding per-source state.
pub const SOURCES_KEY: &str = "sources";
/// Key inside a source state holding per-resource state.
pub const RESOURCES_KEY: &str = "resources";
/// Top-level key incremented whenever the state is extracted.
pub const STATE_VERSION_KEY: &str = "_state_version";

/// Persisted pipeline state: `sources[source][resources][resource] = {...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateTree(Map<String, Value>);

impl StateTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value. Only objects are valid state trees.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(Error::Other(format!(
                "state must be a JSON object, got {}",
                type_name(&other)
            ))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Replace the whole tree with `other`.
    pub fn replace_with(&mut self, other: StateTree) {
        self.0 = other.0;
    }

    pub fn version(&self) -> u64 {
        self.0
            .get(STATE_VERSION_KEY)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn bump_version(&mut self) -> u64 {
        let next = self.version() + 1;
        self.0.insert(STATE_VERSION_KEY.to_string(), Value::from(next));
        next
    }

    /// Names of all sources with state, in key order.
    pub fn source_names(&self) -> Vec<&str> {
        match self.0.get(SOURCES_KEY) {
            Some(Value::Object(sources)) => sources.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn source(&self, name: &str) -> Option<&Value> {
        self.0.get(SOURCES_KEY)?.get(name)
    }

    pub fn source_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.0.get_mut(SOURCES_KEY)?.get_mut(name)
    }

    /// Get or create the state node of a source.
    pub fn source_entry(&mut self, name: &str) -> &mut Value {
        let sources = self
            .0
            .entry(SOURCES_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if !sources.is_object() {
            *sources = Value::Object(Map::new());
        }
        match sources {
            Value::Object(map) => map
                .entry(name)
                .or_insert_with(|| Value::Object(Map::new())),
            _ => unreachable!("sources was just normalized to an object"),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Resource names with state inside a source state node.
pub fn resource_keys(source_state: &Value) -> Vec<&str> {
    match source_state.get(RESOURCES_KEY) {
        Some(Value::Object(resources)) => resources.keys().map(String::as_str).collect(),
        _ => Vec::new(),
    }
}

/// Remove the whole state of one resource, leaving its siblings untouched.
///
/// Returns true when the resource had state.
pub fn reset_resource_state(resource: &str, source_state: &mut Value) -> bool {
    source_state
        .get_mut(RESOURCES_KEY)
        .and_then(Value::as_object_mut)
        .is_some_and(|resources| resources.remove(resource).is_some())
}

/// Delete every node addressed by `paths`.
///
/// Each path is resolved against `node` first, so paths whose node or parent
/// is already gone are skipped rather than treated as errors. Returns how
/// many nodes were removed.
pub fn delete_paths<S: AsRef<str>>(paths: &[S], node: &mut Value) -> Result<usize> {
    let mut located: Vec<Vec<Step>> = Vec::new();
    for path in paths {
        located.extend(jsonpath::parse(path.as_ref())?.resolve(node));
    }
    // higher array indices first so earlier removals do not shift later ones
    located.sort_unstable();
    located.dedup();

    Ok(located
        .iter()
        .rev()
        .filter(|steps| jsonpath::remove_at(node, steps))
        .count())
}
