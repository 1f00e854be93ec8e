// src/graph/quantum.rs

//! Quantum data entity and its opaque payload.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::types::QuantumId;

/// One value of a data-id dimension (e.g. `visit = 42`, `band = "r"`).
///
/// Integers order before strings so mixed dimensions still sort totally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum DataIdValue {
    Int(i64),
    Str(String),
}

impl Ord for DataIdValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DataIdValue::Int(a), DataIdValue::Int(b)) => a.cmp(b),
            (DataIdValue::Str(a), DataIdValue::Str(b)) => a.cmp(b),
            (DataIdValue::Int(_), DataIdValue::Str(_)) => Ordering::Less,
            (DataIdValue::Str(_), DataIdValue::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for DataIdValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DataIdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataIdValue::Int(v) => write!(f, "{v}"),
            DataIdValue::Str(v) => f.write_str(v),
        }
    }
}

/// Data slice a quantum operates on, keyed by dimension name.
pub type DataId = BTreeMap<String, DataIdValue>;

/// What work a quantum stands for. Not interpreted by the orchestrator,
/// except by fixups that order quanta by label and data id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantumPayload {
    /// Fully qualified task name.
    pub task: String,
    /// Label of the task within the pipeline.
    pub label: String,
    pub data_id: DataId,
    /// Shell command run by the command runner, if any.
    pub command: Option<String>,
}

/// A node of the execution graph.
///
/// Dependencies live in the owning [`QuantumGraph`](super::QuantumGraph)'s
/// edge table, not here, so that quanta can be shared immutably while edges
/// are edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantum {
    pub id: QuantumId,
    pub payload: QuantumPayload,
}

impl Quantum {
    pub fn new(id: impl Into<QuantumId>, payload: QuantumPayload) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    /// Value of one data-id dimension, if present.
    pub fn dimension(&self, name: &str) -> Option<&DataIdValue> {
        self.payload.data_id.get(name)
    }
}

impl fmt::Display for Quantum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}", self.payload.label, self.id)?;
        if !self.payload.data_id.is_empty() {
            let parts: Vec<String> = self
                .payload
                .data_id
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, " {{{}}}", parts.join(", "))?;
        }
        f.write_str(">")
    }
}
