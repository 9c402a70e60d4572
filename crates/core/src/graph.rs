//! ComfyUI workflow graph model.
//!
//! The engine accepts the "API format" graph: a JSON object where each key
//! is a node id and each value carries `class_type`, optional `_meta`, and
//! an `inputs` object:
//!
//! ```json
//! {
//!   "3": {
//!     "class_type": "KSampler",
//!     "_meta": { "title": "Sampler" },
//!     "inputs": { "seed": 42, "steps": 20, "model": ["4", 0] }
//!   }
//! }
//! ```
//!
//! Inputs whose value is an array are links to another node's output.
//! The editor's "UI format" (a list of nodes plus a separate link table)
//! is recognised at load time so it can be rejected with a typed error
//! rather than producing empty results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Key holding the node class name.
pub const CLASS_TYPE_KEY: &str = "class_type";

/// Key holding node metadata (`{"title": ...}`).
pub const META_KEY: &str = "_meta";

/// Key holding the node's input map.
pub const INPUTS_KEY: &str = "inputs";

/// Key used by UI-format documents (and some wrappers) for the node collection.
const NODES_KEY: &str = "nodes";

/// Class label used when a node carries no `class_type`.
pub const UNKNOWN_CLASS: &str = "Unknown";

/// An id-keyed node map in the engine's API format.
///
/// The underlying JSON object is kept as-is so fields this service does not
/// model (extra metadata, custom-node properties) survive re-submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph(Map<String, Value>);

impl WorkflowGraph {
    pub fn new(nodes: Map<String, Value>) -> Self {
        Self(nodes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn node(&self, node_id: &str) -> Option<&Value> {
        self.0.get(node_id)
    }

    /// Mutable access to a node's `inputs` object.
    ///
    /// Returns `None` when the node is absent, is not an object, or has no
    /// `inputs` object.
    pub fn inputs_mut(&mut self, node_id: &str) -> Option<&mut Map<String, Value>> {
        self.0
            .get_mut(node_id)?
            .as_object_mut()?
            .get_mut(INPUTS_KEY)?
            .as_object_mut()
    }

    /// Read a single input value.
    pub fn input(&self, node_id: &str, input_name: &str) -> Option<&Value> {
        self.0.get(node_id)?.get(INPUTS_KEY)?.get(input_name)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Structural format of a loaded workflow document, decided once at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphFormat {
    /// Id-keyed node map; usable for introspection and submission.
    NodeMap(WorkflowGraph),
    /// List-structured (UI-format) document, kept raw for display only.
    List(Value),
}

impl GraphFormat {
    /// Classify a parsed JSON document.
    ///
    /// - a top-level array, or an object whose `nodes` member is an array,
    ///   is [`GraphFormat::List`];
    /// - an object whose `nodes` member is an object uses that inner object
    ///   as the node map;
    /// - any other object is a node map;
    /// - scalars are rejected.
    pub fn classify(document: Value) -> Result<Self, CoreError> {
        match document {
            Value::Array(_) => Ok(Self::List(document)),
            Value::Object(mut obj) => {
                let nodes_is_array = obj.get(NODES_KEY).map(Value::is_array);
                match (nodes_is_array, obj.remove(NODES_KEY)) {
                    (Some(true), Some(nodes)) => {
                        obj.insert(NODES_KEY.to_string(), nodes);
                        Ok(Self::List(Value::Object(obj)))
                    }
                    (_, Some(Value::Object(inner))) => Ok(Self::NodeMap(WorkflowGraph(inner))),
                    (_, Some(other)) => {
                        obj.insert(NODES_KEY.to_string(), other);
                        Ok(Self::NodeMap(WorkflowGraph(obj)))
                    }
                    (_, None) => Ok(Self::NodeMap(WorkflowGraph(obj))),
                }
            }
            other => Err(CoreError::UnsupportedFormat(format!(
                "workflow document must be a JSON object or array, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Require the node-map variant.
    pub fn into_node_map(self) -> Result<WorkflowGraph, CoreError> {
        match self {
            Self::NodeMap(graph) => Ok(graph),
            Self::List(_) => Err(list_format_error()),
        }
    }

    pub fn as_node_map(&self) -> Result<&WorkflowGraph, CoreError> {
        match self {
            Self::NodeMap(graph) => Ok(graph),
            Self::List(_) => Err(list_format_error()),
        }
    }

    /// The document as JSON, for display.
    pub fn to_value(&self) -> Value {
        match self {
            Self::NodeMap(graph) => Value::Object(graph.0.clone()),
            Self::List(raw) => raw.clone(),
        }
    }
}

fn list_format_error() -> CoreError {
    CoreError::UnsupportedFormat(
        "list-structured (UI format) workflows cannot be introspected or submitted; \
         export the workflow in API format"
            .to_string(),
    )
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
