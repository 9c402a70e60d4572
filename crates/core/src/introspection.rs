//! Workflow input introspection.
//!
//! Scans an API-format workflow graph and reports, per node, the inputs a
//! client may safely override: every input holding a literal value. Link
//! inputs (arrays pointing at another node's output) are never reported.
//! Each reported input is also classified as seed-like or not, which the
//! run preparer uses to re-stamp seeds on every run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::graph::{GraphFormat, WorkflowGraph, CLASS_TYPE_KEY, INPUTS_KEY, META_KEY, UNKNOWN_CLASS};
use crate::types::NodeId;

// ---------------------------------------------------------------------------
// Seed heuristic
// ---------------------------------------------------------------------------

/// Input names treated as seeds regardless of suffix.
const SEED_INPUT_NAMES: &[&str] = &["seed", "noise_seed", "rand_seed", "random_seed"];

/// Any input name ending with this suffix is treated as a seed.
const SEED_SUFFIX: &str = "_seed";

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// Scalar kind inferred from an input's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Bool,
    Int,
    Float,
    String,
}

/// A user-configurable input on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    /// Input name within the node.
    pub name: String,
    /// Inferred scalar kind.
    #[serde(rename = "type")]
    pub kind: InputKind,
    /// The value currently stored in the workflow.
    pub default: Value,
    /// Whether the input is re-resolved from seed control on every run.
    pub is_seed: bool,
}

/// A node with at least one configurable input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: NodeId,
    /// Node class (`class_type`).
    #[serde(rename = "type")]
    pub node_type: String,
    /// `_meta.title` when present, otherwise the class.
    pub label: String,
    pub inputs: Vec<InputDescriptor>,
}

/// API payload for a workflow's introspection result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowIntrospection {
    pub nodes: Vec<NodeDescriptor>,
}

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/// Introspect a loaded workflow document.
///
/// List-structured documents are rejected with
/// [`CoreError::UnsupportedFormat`] rather than yielding an empty result.
pub fn introspect_document(document: &GraphFormat) -> Result<Vec<NodeDescriptor>, CoreError> {
    Ok(introspect(document.as_node_map()?))
}

/// Extract the configurable inputs of every node, in node-id order.
///
/// Nodes with no literal inputs are omitted, as are entries that are not
/// JSON objects.
pub fn introspect(graph: &WorkflowGraph) -> Vec<NodeDescriptor> {
    graph
        .nodes()
        .filter_map(|(node_id, node)| describe_node(node_id, node))
        .collect()
}

/// Whether an input name designates a seed.
///
/// Purely name based: the value's kind is not consulted.
pub fn is_seed_input(name: &str) -> bool {
    let lower = name.to_lowercase();
    SEED_INPUT_NAMES.contains(&lower.as_str()) || lower.ends_with(SEED_SUFFIX)
}

/// Classify a literal value. Booleans are checked before numbers.
pub fn classify_value(value: &Value) -> InputKind {
    match value {
        Value::Bool(_) => InputKind::Bool,
        Value::Number(n) if n.is_i64() || n.is_u64() => InputKind::Int,
        Value::Number(_) => InputKind::Float,
        _ => InputKind::String,
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn describe_node(node_id: &str, node: &Value) -> Option<NodeDescriptor> {
    let node = node.as_object()?;

    let node_type = node
        .get(CLASS_TYPE_KEY)
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_CLASS)
        .to_string();

    let label = node
        .get(META_KEY)
        .and_then(|meta| meta.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| node_type.clone());

    let inputs: Vec<InputDescriptor> = node
        .get(INPUTS_KEY)
        .and_then(Value::as_object)
        .map(|inputs| {
            inputs
                .iter()
                .filter(|(_, value)| !value.is_array())
                .map(|(name, value)| InputDescriptor {
                    name: name.clone(),
                    kind: classify_value(value),
                    default: value.clone(),
                    is_seed: is_seed_input(name),
                })
                .collect()
        })
        .unwrap_or_default();

    if inputs.is_empty() {
        return None;
    }

    Some(NodeDescriptor {
        id: node_id.to_string(),
        node_type,
        label,
        inputs,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
