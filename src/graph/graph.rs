// src/graph/graph.rs

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, warn};

use crate::errors::{QexecError, Result};
use crate::graph::quantum::Quantum;
use crate::types::QuantumId;

/// Arena of quanta plus their dependency edge table.
///
/// Quanta are addressed by their insertion index; `deps[i]` holds the
/// indices quantum `i` depends on. The set of quanta is fixed once the
/// external builder is done; after that only the edge table changes, and
/// only through [`add_dependency`](Self::add_dependency) /
/// [`remove_dependency`](Self::remove_dependency) (directly while building,
/// or through an [`EdgeEditor`](super::EdgeEditor) during fixups).
///
/// Execution never sees this type: the executor turns it into an immutable
/// plan after validation.
#[derive(Debug, Clone, Default)]
pub struct QuantumGraph {
    quanta: Vec<Quantum>,
    index: HashMap<QuantumId, usize>,
    deps: Vec<BTreeSet<usize>>,
}

impl QuantumGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a quantum with no dependencies.
    pub fn add_quantum(&mut self, quantum: Quantum) -> Result<()> {
        if self.index.contains_key(&quantum.id) {
            return Err(QexecError::DuplicateQuantum(quantum.id));
        }
        self.index.insert(quantum.id.clone(), self.quanta.len());
        self.quanta.push(quantum);
        self.deps.push(BTreeSet::new());
        Ok(())
    }

    /// Record that `from` depends on `to`.
    ///
    /// Returns `false` if the edge already existed.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<bool> {
        let from_idx = self.index_of(from)?;
        let to_idx = self.index_of(to)?;
        let inserted = self.deps[from_idx].insert(to_idx);
        if inserted {
            debug!(quantum = %from, dependency = %to, "added dependency edge");
        }
        Ok(inserted)
    }

    /// Drop the edge "`from` depends on `to`".
    ///
    /// Returns `false` if there was no such edge.
    pub fn remove_dependency(&mut self, from: &str, to: &str) -> Result<bool> {
        let from_idx = self.index_of(from)?;
        let to_idx = self.index_of(to)?;
        let removed = self.deps[from_idx].remove(&to_idx);
        if removed {
            debug!(quantum = %from, dependency = %to, "removed dependency edge");
        }
        Ok(removed)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Quantum> {
        self.index.get(id).map(|&i| &self.quanta[i])
    }

    /// All quanta, in insertion order.
    pub fn quanta(&self) -> impl Iterator<Item = &Quantum> {
        self.quanta.iter()
    }

    pub fn len(&self) -> usize {
        self.quanta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quanta.is_empty()
    }

    /// Direct dependencies of a quantum.
    pub fn dependencies_of(&self, id: &str) -> Result<Vec<&str>> {
        let idx = self.index_of(id)?;
        Ok(self.deps[idx]
            .iter()
            .map(|&d| self.quanta[d].id.as_str())
            .collect())
    }

    /// Direct dependents of a quantum (quanta that list it as a dependency).
    pub fn dependents_of(&self, id: &str) -> Result<Vec<&str>> {
        let idx = self.index_of(id)?;
        Ok(self
            .deps
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.contains(&idx))
            .map(|(i, _)| self.quanta[i].id.as_str())
            .collect())
    }

    /// Linearize all quanta so that every quantum comes after all of its
    /// dependencies.
    ///
    /// Fails with [`QexecError::Cycle`] if the current edges contain a cycle.
    pub fn topological_order(&self) -> Result<Vec<QuantumId>> {
        let order = self.topological_indices()?;
        Ok(order
            .into_iter()
            .map(|i| self.quanta[i].id.clone())
            .collect())
    }

    pub(crate) fn topological_indices(&self) -> Result<Vec<usize>> {
        // Edge direction: dependency -> dependent.
        let graph = self.to_petgraph();

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|n| n.index()).collect()),
            Err(cycle) => {
                let members = self.cycle_members(&graph, cycle.node_id());
                warn!(?members, "dependency cycle detected in quantum graph");
                Err(QexecError::Cycle { members })
            }
        }
    }

    pub(crate) fn index_of(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| QexecError::UnknownQuantum(id.to_string()))
    }

    pub(crate) fn quantum_at(&self, idx: usize) -> &Quantum {
        &self.quanta[idx]
    }

    /// Split into the quanta arena and the edge table (indexed alike).
    pub(crate) fn into_parts(self) -> (Vec<Quantum>, Vec<BTreeSet<usize>>) {
        (self.quanta, self.deps)
    }

    fn to_petgraph(&self) -> DiGraph<(), ()> {
        let edge_count = self.deps.iter().map(BTreeSet::len).sum();
        let mut graph = DiGraph::with_capacity(self.quanta.len(), edge_count);
        for _ in &self.quanta {
            graph.add_node(());
        }
        for (dependent, deps) in self.deps.iter().enumerate() {
            for &dep in deps {
                graph.add_edge(NodeIndex::new(dep), NodeIndex::new(dependent), ());
            }
        }
        graph
    }

    /// Quanta in the strongly connected component that contains `seed`, or,
    /// failing that, in every non-trivial component. Sorted by id.
    fn cycle_members(&self, graph: &DiGraph<(), ()>, seed: NodeIndex) -> Vec<QuantumId> {
        let cyclic: Vec<Vec<NodeIndex>> = tarjan_scc(graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .collect();

        let chosen: Vec<NodeIndex> = match cyclic.iter().find(|scc| scc.contains(&seed)) {
            Some(scc) => scc.clone(),
            None => cyclic.into_iter().flatten().collect(),
        };

        let mut members: Vec<QuantumId> = chosen
            .into_iter()
            .map(|n| self.quanta[n.index()].id.clone())
            .collect();
        members.sort();
        members
    }
}
