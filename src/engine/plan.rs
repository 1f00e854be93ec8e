// src/engine/plan.rs

//! Turning a mutable quantum graph into an immutable execution plan.

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::Result;
use crate::graph::{CycleValidator, FixupChain, Quantum, QuantumGraph};

/// Validated, read-only view of a quantum graph used during execution.
///
/// Indices are shared by all tables: `quanta[i]` depends on every index in
/// `deps[i]` and is a dependency of every index in `dependents[i]`.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    quanta: Vec<Arc<Quantum>>,
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl ExecutionPlan {
    fn from_validated(graph: QuantumGraph, order: Vec<usize>) -> Self {
        let (quanta, deps) = graph.into_parts();

        let mut dependents = vec![Vec::new(); quanta.len()];
        for (dependent, dep_set) in deps.iter().enumerate() {
            for &dep in dep_set {
                dependents[dep].push(dependent);
            }
        }

        Self {
            quanta: quanta.into_iter().map(Arc::new).collect(),
            deps: deps
                .into_iter()
                .map(|set| set.into_iter().collect())
                .collect(),
            dependents,
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.quanta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quanta.is_empty()
    }

    pub fn quantum(&self, index: usize) -> &Arc<Quantum> {
        &self.quanta[index]
    }

    pub fn dependencies(&self, index: usize) -> &[usize] {
        &self.deps[index]
    }

    pub fn dependents(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    /// Indices in validated topological order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Quantum ids in validated topological order.
    pub fn ordered_ids(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.quanta[i].id.as_str())
            .collect()
    }
}

/// Prepare `graph` for execution.
///
/// 1. Derive the original topological order (fails on a cycle left by the
///    builder).
/// 2. Run the fixup chain over it, checking each fixup's contract.
/// 3. Re-validate acyclicity of the possibly edited edges, even if no fixup
///    changed anything.
///
/// Any error here is fatal: nothing has been dispatched yet.
pub fn prepare(mut graph: QuantumGraph, fixups: &FixupChain) -> Result<ExecutionPlan> {
    let original = graph.topological_order()?;
    debug!(quanta = original.len(), "derived original topological order");

    if !fixups.is_empty() {
        info!(fixups = ?fixups.names(), "applying graph fixups");
        let fixed = fixups.apply(&mut graph, original)?;
        debug!(quanta = fixed.len(), "fixup chain finished");
    }

    let order = CycleValidator::validate_indices(&graph)?;
    let plan = ExecutionPlan::from_validated(graph, order);

    info!(quanta = plan.len(), "execution plan ready");
    Ok(plan)
}
