// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

use crate::types::QuantumId;

#[derive(Error, Debug)]
pub enum QexecError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown quantum: {0}")]
    UnknownQuantum(QuantumId),

    #[error("Duplicate quantum: {0}")]
    DuplicateQuantum(QuantumId),

    /// `members` is sorted and empty when the participants could not be
    /// determined.
    #[error("{}", cycle_message(.members))]
    Cycle { members: Vec<QuantumId> },

    #[error("Fixup '{fixup}' violated its contract: {detail}")]
    FixupContractViolation { fixup: String, detail: String },

    #[error("Invalid task specification: {0}")]
    InvalidTaskSpec(String),

    #[error(
        "Run failed: {failed} quanta failed, {skipped} skipped, {not_executed} not executed"
    )]
    RunFailed {
        failed: usize,
        skipped: usize,
        not_executed: usize,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn cycle_message(members: &[QuantumId]) -> String {
    if members.is_empty() {
        "Dependency cycle detected in quantum graph".to_string()
    } else {
        format!(
            "Dependency cycle detected in quantum graph involving: {}",
            members.join(", ")
        )
    }
}

/// Why a single quantum did not succeed.
///
/// This is recorded per quantum in the run report; it never aborts the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantumFailure {
    #[error("{0}")]
    Task(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, QexecError>;
