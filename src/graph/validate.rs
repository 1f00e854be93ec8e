// src/graph/validate.rs

use tracing::debug;

use crate::errors::Result;
use crate::graph::graph::QuantumGraph;
use crate::types::QuantumId;

/// The single authoritative acyclicity check run after the fixup chain.
///
/// It runs unconditionally, even when no fixup changed anything, and its
/// failure aborts the run before any quantum is dispatched.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleValidator;

impl CycleValidator {
    pub fn validate(graph: &QuantumGraph) -> Result<Vec<QuantumId>> {
        let order = graph.topological_order()?;
        debug!(quanta = order.len(), "quantum graph validated as acyclic");
        Ok(order)
    }

    pub(crate) fn validate_indices(graph: &QuantumGraph) -> Result<Vec<usize>> {
        graph.topological_indices()
    }
}
