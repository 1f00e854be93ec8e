#![allow(dead_code)]

use qexec::graph::{DataId, DataIdValue, Quantum, QuantumGraph, QuantumPayload};

/// Quantum of task `pipe.<label>` with an empty data id and no command.
pub fn quantum(id: &str, label: &str) -> Quantum {
    quantum_with(id, label, &[])
}

/// Quantum with integer data-id dimensions, e.g. `&[("visit", 12)]`.
pub fn quantum_with(id: &str, label: &str, dims: &[(&str, i64)]) -> Quantum {
    Quantum::new(
        id,
        QuantumPayload {
            task: format!("pipe.{label}"),
            label: label.to_string(),
            data_id: data_id(dims),
            command: None,
        },
    )
}

pub fn data_id(dims: &[(&str, i64)]) -> DataId {
    dims.iter()
        .map(|(k, v)| (k.to_string(), DataIdValue::Int(*v)))
        .collect()
}

/// Builder for `QuantumGraph` to simplify test setup.
///
/// ```ignore
/// let graph = GraphBuilder::new()
///     .quantum("a", "isr")
///     .quantum("b", "calib")
///     .dep("b", "a")
///     .build();
/// ```
pub struct GraphBuilder {
    graph: QuantumGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: QuantumGraph::new(),
        }
    }

    pub fn quantum(self, id: &str, label: &str) -> Self {
        self.with_quantum(quantum(id, label))
    }

    pub fn quantum_with(self, id: &str, label: &str, dims: &[(&str, i64)]) -> Self {
        self.with_quantum(quantum_with(id, label, dims))
    }

    pub fn with_quantum(mut self, quantum: Quantum) -> Self {
        self.graph
            .add_quantum(quantum)
            .expect("duplicate quantum id in test graph");
        self
    }

    /// `from` depends on `to`.
    pub fn dep(mut self, from: &str, to: &str) -> Self {
        self.graph
            .add_dependency(from, to)
            .expect("unknown quantum id in test graph");
        self
    }

    pub fn build(self) -> QuantumGraph {
        self.graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
