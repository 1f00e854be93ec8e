// src/graph/mod.rs

//! Quantum graph representation and pre-execution rewriting.
//!
//! - [`quantum`] holds the quantum entity and its opaque payload.
//! - [`graph`] is the arena of quanta plus the dependency edge table.
//! - [`fixup`] defines the pluggable edge-rewriting capability and the
//!   built-in `SerializeDimension` fixup.
//! - [`validate`] re-checks acyclicity after fixups.

pub mod fixup;
pub mod graph;
pub mod quantum;
pub mod validate;

pub use fixup::{EdgeEditor, FixupChain, GraphFixup, SerializeDimension};
pub use graph::QuantumGraph;
pub use quantum::{DataId, DataIdValue, Quantum, QuantumPayload};
pub use validate::CycleValidator;
