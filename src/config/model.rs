// src/config/model.rs

use serde::Deserialize;

use crate::graph::DataId;

/// Quantum graph definition as read from a TOML file.
///
/// ```toml
/// [executor]
/// processes = 4
/// timeout = "10m"
/// fail_fast = false
///
/// [[quantum]]
/// id = "isr-903342"
/// task = "lsst.ip.isr.IsrTask"
/// label = "isr"
/// data_id = { visit = 903342, detector = 10 }
/// command = "run-isr --visit 903342"
///
/// [[quantum]]
/// id = "assoc-903342"
/// task = "lsst.ap.association.DiaPipelineTask"
/// label = "assoc"
/// data_id = { visit = 903342 }
/// after = ["isr-903342"]
///
/// [[fixup]]
/// kind = "serialize"
/// label = "assoc"
/// dimensions = ["visit"]
/// ```
///
/// This type is unvalidated; see [`GraphFile`] for the checked version.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGraphFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default, rename = "quantum")]
    pub quanta: Vec<QuantumConfig>,

    #[serde(default, rename = "fixup")]
    pub fixups: Vec<FixupConfig>,
}

/// Validated graph definition.
///
/// Construct it with `GraphFile::try_from(raw)`; that guarantees unique ids,
/// known `after` references and sane executor options. Acyclicity is left to
/// the quantum graph itself.
#[derive(Debug, Clone)]
pub struct GraphFile {
    executor: ExecutorSection,
    quanta: Vec<QuantumConfig>,
    fixups: Vec<FixupConfig>,
}

impl GraphFile {
    pub(crate) fn new_unchecked(
        executor: ExecutorSection,
        quanta: Vec<QuantumConfig>,
        fixups: Vec<FixupConfig>,
    ) -> Self {
        Self {
            executor,
            quanta,
            fixups,
        }
    }

    pub fn executor(&self) -> &ExecutorSection {
        &self.executor
    }

    pub fn quanta(&self) -> &[QuantumConfig] {
        &self.quanta
    }

    pub fn fixups(&self) -> &[FixupConfig] {
        &self.fixups
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// Number of quanta allowed to run at once.
    #[serde(default = "default_processes")]
    pub processes: usize,

    /// Per-quantum time limit, e.g. `"30s"`; unlimited when absent.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Stop the run after the first failed quantum.
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_processes() -> usize {
    1
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            processes: default_processes(),
            timeout: None,
            fail_fast: false,
        }
    }
}

/// `[[quantum]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct QuantumConfig {
    pub id: String,

    /// Fully qualified task name.
    pub task: String,

    /// Task label; defaults to the task's base name.
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub data_id: DataId,

    /// Shell command for the command runner.
    #[serde(default)]
    pub command: Option<String>,

    /// Ids of quanta this one depends on.
    #[serde(default)]
    pub after: Vec<String>,
}

/// `[[fixup]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixupConfig {
    /// Chain quanta of `label` one data-id key after another.
    Serialize {
        label: String,
        dimensions: Vec<String>,
        #[serde(default)]
        reverse: bool,
    },
}
