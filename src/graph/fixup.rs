// src/graph/fixup.rs

//! Post-construction edits of dependency edges.
//!
//! Some orderings cannot be expressed by the producer/consumer edges used to
//! build a quantum graph, for example processing a time series of inputs one
//! after another for a stateful aggregation. A [`GraphFixup`] receives the
//! topologically ordered quanta and may add or remove dependency edges in
//! place. Fixups are chained in a [`FixupChain`]; each one sees the edits of
//! the ones before it. The executor re-derives the topological order after
//! the chain has run, so a fixup that introduces a cycle is caught before any
//! quantum is dispatched.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info};

use crate::errors::{QexecError, Result};
use crate::graph::graph::QuantumGraph;
use crate::graph::quantum::{DataIdValue, Quantum};
use crate::types::QuantumId;

/// Restricted handle on a [`QuantumGraph`] given to fixups.
///
/// Quanta can be read; only dependency edges can be changed.
pub struct EdgeEditor<'g> {
    graph: &'g mut QuantumGraph,
}

impl<'g> EdgeEditor<'g> {
    pub fn new(graph: &'g mut QuantumGraph) -> Self {
        Self { graph }
    }

    pub fn quantum(&self, id: &str) -> Result<&Quantum> {
        let idx = self.graph.index_of(id)?;
        Ok(self.graph.quantum_at(idx))
    }

    pub fn quanta(&self) -> impl Iterator<Item = &Quantum> {
        self.graph.quanta()
    }

    pub fn dependencies_of(&self, id: &str) -> Result<Vec<&str>> {
        self.graph.dependencies_of(id)
    }

    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<bool> {
        self.graph.add_dependency(from, to)
    }

    pub fn remove_dependency(&mut self, from: &str, to: &str) -> Result<bool> {
        self.graph.remove_dependency(from, to)
    }
}

/// A pluggable rewrite of dependency edges, applied before execution.
///
/// Implementations must be a pure function of their input plus whatever
/// state they were constructed with. They must return exactly the quanta
/// they received (order is advisory); anything else is reported as
/// [`QexecError::FixupContractViolation`].
pub trait GraphFixup: Send + Sync + fmt::Debug {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    fn apply(&self, ordered: Vec<QuantumId>, edges: &mut EdgeEditor<'_>) -> Result<Vec<QuantumId>>;
}

/// Ordered list of fixups applied one after another.
#[derive(Debug, Default)]
pub struct FixupChain {
    fixups: Vec<Box<dyn GraphFixup>>,
}

impl FixupChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fixup; fixups run in registration order.
    pub fn push(&mut self, fixup: impl GraphFixup + 'static) {
        self.fixups.push(Box::new(fixup));
    }

    pub fn with(mut self, fixup: impl GraphFixup + 'static) -> Self {
        self.push(fixup);
        self
    }

    pub fn len(&self) -> usize {
        self.fixups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixups.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fixups.iter().map(|f| f.name()).collect()
    }

    /// Run every fixup over `graph`, threading the returned order through.
    ///
    /// Stops at the first fixup that errors or breaks its contract.
    pub fn apply(&self, graph: &mut QuantumGraph, ordered: Vec<QuantumId>) -> Result<Vec<QuantumId>> {
        let mut current = ordered;

        for fixup in &self.fixups {
            debug!(fixup = fixup.name(), quanta = current.len(), "applying graph fixup");
            let expected = id_counts(&current);

            let mut editor = EdgeEditor::new(graph);
            let output = fixup.apply(current, &mut editor)?;

            check_same_quanta(fixup.name(), &expected, &output)?;
            current = output;
        }

        Ok(current)
    }
}

fn id_counts(ids: &[QuantumId]) -> BTreeMap<QuantumId, usize> {
    let mut counts = BTreeMap::new();
    for id in ids {
        *counts.entry(id.clone()).or_insert(0) += 1;
    }
    counts
}

fn check_same_quanta(
    fixup: &str,
    expected: &BTreeMap<QuantumId, usize>,
    output: &[QuantumId],
) -> Result<()> {
    let actual = id_counts(output);
    if &actual == expected {
        return Ok(());
    }

    let missing: Vec<&str> = expected
        .keys()
        .filter(|id| actual.get(*id) < expected.get(*id))
        .map(String::as_str)
        .collect();
    let unexpected: Vec<&str> = actual
        .keys()
        .filter(|id| actual.get(*id) > expected.get(*id))
        .map(String::as_str)
        .collect();

    Err(QexecError::FixupContractViolation {
        fixup: fixup.to_string(),
        detail: format!(
            "returned quanta differ from input (missing: [{}], unexpected or duplicated: [{}])",
            missing.join(", "),
            unexpected.join(", ")
        ),
    })
}

/// Forces quanta of one task label to run one data-id key after another.
///
/// Quanta with the given label are grouped by the values of `dimensions`
/// (e.g. `["visit"]`); groups are sorted by that key, ascending or, with
/// `reverse`, descending. Every quantum of a group then depends on every
/// quantum of the previous group, after removing any edge the two already
/// had in either direction.
#[derive(Debug, Clone)]
pub struct SerializeDimension {
    name: String,
    label: String,
    dimensions: Vec<String>,
    reverse: bool,
}

impl SerializeDimension {
    pub fn new(label: impl Into<String>, dimensions: Vec<String>, reverse: bool) -> Self {
        let label = label.into();
        let name = format!("serialize[{}:{}]", label, dimensions.join(","));
        Self {
            name,
            label,
            dimensions,
            reverse,
        }
    }

    fn key_of(&self, quantum: &Quantum) -> Result<Vec<DataIdValue>> {
        self.dimensions
            .iter()
            .map(|dim| {
                quantum.dimension(dim).cloned().ok_or_else(|| {
                    QexecError::ConfigError(format!(
                        "fixup {}: quantum '{}' has no '{}' dimension",
                        self.name, quantum.id, dim
                    ))
                })
            })
            .collect()
    }
}

impl GraphFixup for SerializeDimension {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, ordered: Vec<QuantumId>, edges: &mut EdgeEditor<'_>) -> Result<Vec<QuantumId>> {
        let mut groups: BTreeMap<Vec<DataIdValue>, Vec<QuantumId>> = BTreeMap::new();
        for id in &ordered {
            let quantum = edges.quantum(id)?;
            if quantum.payload.label == self.label {
                groups
                    .entry(self.key_of(quantum)?)
                    .or_default()
                    .push(id.clone());
            }
        }

        let mut keyed: Vec<Vec<QuantumId>> = groups.into_values().collect();
        if self.reverse {
            keyed.reverse();
        }

        for pair in keyed.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            for before in prev {
                for after in next {
                    edges.remove_dependency(before, after)?;
                    edges.remove_dependency(after, before)?;
                    edges.add_dependency(after, before)?;
                }
            }
        }

        info!(
            fixup = %self.name,
            groups = keyed.len(),
            reverse = self.reverse,
            "serialized quanta along data-id dimension"
        );

        // Put the affected quanta into their new relative order, reusing the
        // slots they occupied in the incoming sequence.
        let mut serialized = keyed.into_iter().flatten();
        let reordered = ordered
            .into_iter()
            .map(|id| {
                let is_affected = edges
                    .quantum(&id)
                    .map(|q| q.payload.label == self.label)
                    .unwrap_or(false);
                if is_affected {
                    serialized.next().unwrap_or(id)
                } else {
                    id
                }
            })
            .collect();

        Ok(reordered)
    }
}
