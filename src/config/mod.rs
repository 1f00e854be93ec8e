// src/config/mod.rs

//! Graph definition files.
//!
//! - `model.rs`: TOML-backed data model
//! - `loader.rs`: reading a file from disk
//! - `validate.rs`: raw -> validated conversion
//! - `build.rs`: validated file -> quantum graph, fixups and executor options

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_graph_path, load_and_validate, load_from_path};
pub use model::{ExecutorSection, FixupConfig, GraphFile, QuantumConfig, RawGraphFile};
