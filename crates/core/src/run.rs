//! Run preparation: overrides and seed resolution.
//!
//! Turns a stored workflow plus a client's sparse overrides into the graph
//! that is actually submitted. Steps run in a fixed order:
//!
//! 1. apply `"nodeId.inputName"` overrides, recording the ones that landed;
//! 2. resolve the run's seed from [`SeedControl`];
//! 3. stamp the seed into every seed-like input found by introspection.
//!
//! Seed stamping runs last, so it always wins over an override targeting
//! the same input.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::graph::{GraphFormat, WorkflowGraph};
use crate::introspection::introspect;

/// Inclusive upper bound for randomly drawn seeds.
pub const MAX_RANDOM_SEED: u64 = 100_000_000_000_000;

/// Override values keyed by `"nodeId.inputName"`.
pub type Overrides = BTreeMap<String, Value>;

/// How the run's seed is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedMode {
    /// Use the supplied value (or 0).
    Fixed,
    /// Draw a fresh seed for every run.
    #[default]
    Random,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedControl {
    #[serde(default)]
    pub mode: SeedMode,
    #[serde(default)]
    pub value: Option<u64>,
}

impl SeedControl {
    pub fn fixed(value: u64) -> Self {
        Self {
            mode: SeedMode::Fixed,
            value: Some(value),
        }
    }

    pub fn random() -> Self {
        Self::default()
    }
}

/// A client's request to run a stored workflow.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunRequest {
    pub workflow_name: String,
    #[serde(default)]
    pub inputs: Overrides,
    #[serde(default)]
    pub seed_control: SeedControl,
}

/// A graph ready for submission plus the record of how it was derived.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRun {
    pub graph: WorkflowGraph,
    /// Overrides that were actually applied. Seed writes are not included.
    pub applied_overrides: Overrides,
    pub resolved_seed: u64,
}

/// Prepare a loaded workflow document for submission.
///
/// Fails with [`CoreError::UnsupportedFormat`] for list-structured documents.
pub fn prepare(
    document: GraphFormat,
    overrides: &Overrides,
    seed_control: &SeedControl,
) -> Result<ResolvedRun, CoreError> {
    let graph = document.into_node_map()?;
    Ok(prepare_graph(graph, overrides, seed_control))
}

/// Prepare an already-classified node map. See the module docs for ordering.
pub fn prepare_graph(
    mut graph: WorkflowGraph,
    overrides: &Overrides,
    seed_control: &SeedControl,
) -> ResolvedRun {
    let applied_overrides = apply_overrides(&mut graph, overrides);
    let resolved_seed = resolve_seed(seed_control);
    let stamped = stamp_seed(&mut graph, resolved_seed);

    tracing::debug!(
        applied = applied_overrides.len(),
        requested = overrides.len(),
        seed_inputs = stamped,
        resolved_seed,
        "Prepared workflow run",
    );

    ResolvedRun {
        graph,
        applied_overrides,
        resolved_seed,
    }
}

/// Resolve the seed for one run.
///
/// Random mode draws uniformly from `[1, MAX_RANDOM_SEED]` using the
/// thread-local generator; fixed mode uses the supplied value or 0.
pub fn resolve_seed(seed_control: &SeedControl) -> u64 {
    match seed_control.mode {
        SeedMode::Random => rand::rng().random_range(1..=MAX_RANDOM_SEED),
        SeedMode::Fixed => seed_control.value.unwrap_or(0),
    }
}

/// Apply overrides in key order, returning the ones that landed.
///
/// Keys without a `.` separator, unknown nodes, and nodes without an
/// `inputs` object are skipped.
fn apply_overrides(graph: &mut WorkflowGraph, overrides: &Overrides) -> Overrides {
    let mut applied = Overrides::new();

    for (key, value) in overrides {
        let Some((node_id, input_name)) = key.split_once('.') else {
            tracing::debug!(key = %key, "Dropping override without node separator");
            continue;
        };
        let Some(inputs) = graph.inputs_mut(node_id) else {
            tracing::debug!(key = %key, node_id, "Dropping override for unknown node");
            continue;
        };
        inputs.insert(input_name.to_string(), value.clone());
        applied.insert(key.clone(), value.clone());
    }

    applied
}

/// Write `seed` into every seed-like scalar input. Returns how many were set.
fn stamp_seed(graph: &mut WorkflowGraph, seed: u64) -> usize {
    let targets: Vec<(String, String)> = introspect(graph)
        .into_iter()
        .flat_map(|node| {
            node.inputs
                .into_iter()
                .filter(|input| input.is_seed)
                .map(move |input| (node.id.clone(), input.name))
        })
        .collect();

    for (node_id, input_name) in &targets {
        if let Some(inputs) = graph.inputs_mut(node_id) {
            inputs.insert(input_name.clone(), Value::from(seed));
        }
    }

    targets.len()
}
