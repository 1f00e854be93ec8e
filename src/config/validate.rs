// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{FixupConfig, GraphFile, RawGraphFile};
use crate::errors::{QexecError, Result};
use crate::types::parse_timeout;

impl TryFrom<RawGraphFile> for GraphFile {
    type Error = QexecError;

    fn try_from(raw: RawGraphFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_graph(&raw)?;
        Ok(GraphFile::new_unchecked(raw.executor, raw.quanta, raw.fixups))
    }
}

fn validate_raw_graph(cfg: &RawGraphFile) -> Result<()> {
    ensure_has_quanta(cfg)?;
    validate_executor_section(cfg)?;
    validate_quantum_ids(cfg)?;
    validate_dependencies(cfg)?;
    validate_fixups(cfg)?;
    Ok(())
}

fn ensure_has_quanta(cfg: &RawGraphFile) -> Result<()> {
    if cfg.quanta.is_empty() {
        return Err(QexecError::ConfigError(
            "graph file must contain at least one [[quantum]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_executor_section(cfg: &RawGraphFile) -> Result<()> {
    if cfg.executor.processes == 0 {
        return Err(QexecError::ConfigError(
            "[executor].processes must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(timeout) = &cfg.executor.timeout {
        parse_timeout(timeout).map_err(|e| {
            QexecError::ConfigError(format!("[executor].timeout: {e}"))
        })?;
    }

    Ok(())
}

fn validate_quantum_ids(cfg: &RawGraphFile) -> Result<()> {
    let mut seen = HashSet::new();
    for q in &cfg.quanta {
        if q.id.trim().is_empty() {
            return Err(QexecError::ConfigError(
                "quantum id must not be empty".to_string(),
            ));
        }
        if !seen.insert(q.id.as_str()) {
            return Err(QexecError::ConfigError(format!(
                "duplicate quantum id '{}'",
                q.id
            )));
        }
    }
    Ok(())
}

fn validate_dependencies(cfg: &RawGraphFile) -> Result<()> {
    let ids: HashSet<&str> = cfg.quanta.iter().map(|q| q.id.as_str()).collect();

    for q in &cfg.quanta {
        for dep in &q.after {
            if !ids.contains(dep.as_str()) {
                return Err(QexecError::ConfigError(format!(
                    "quantum '{}' has unknown dependency '{}' in `after`",
                    q.id, dep
                )));
            }
            if dep == &q.id {
                return Err(QexecError::ConfigError(format!(
                    "quantum '{}' cannot depend on itself in `after`",
                    q.id
                )));
            }
        }
    }
    Ok(())
}

fn validate_fixups(cfg: &RawGraphFile) -> Result<()> {
    for fixup in &cfg.fixups {
        match fixup {
            FixupConfig::Serialize {
                label, dimensions, ..
            } => {
                if dimensions.is_empty() {
                    return Err(QexecError::ConfigError(format!(
                        "serialize fixup for label '{label}' needs at least one dimension"
                    )));
                }
            }
        }
    }
    Ok(())
}
