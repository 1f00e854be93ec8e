// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::Result;

/// Read and deserialize a graph file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGraphFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawGraphFile = toml::from_str(&contents)?;
    debug!(
        path = %path.display(),
        quanta = raw.quanta.len(),
        fixups = raw.fixups.len(),
        "loaded graph file"
    );

    Ok(raw)
}

/// Read a graph file and validate it.
///
/// This is the entry point the rest of the crate uses. Cycle detection is
/// not done here; the quantum graph reports cycles when it is prepared.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GraphFile> {
    let raw = load_from_path(&path)?;
    let graph_file = GraphFile::try_from(raw)?;
    Ok(graph_file)
}

/// `QuantumGraph.toml` in the current working directory.
pub fn default_graph_path() -> PathBuf {
    PathBuf::from("QuantumGraph.toml")
}
