// src/config/build.rs

//! Turning a validated [`GraphFile`] into runtime structures.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::config::model::{FixupConfig, GraphFile, QuantumConfig};
use crate::engine::ExecutorOptions;
use crate::errors::{QexecError, Result};
use crate::graph::{FixupChain, Quantum, QuantumGraph, QuantumPayload, SerializeDimension};
use crate::types::{default_label, parse_timeout, TaskSpec};

impl QuantumConfig {
    /// Effective label: explicit `label`, else the task base name.
    pub fn effective_label(&self) -> &str {
        self.label
            .as_deref()
            .unwrap_or_else(|| default_label(&self.task))
    }

    fn to_quantum(&self) -> Quantum {
        Quantum::new(
            self.id.clone(),
            QuantumPayload {
                task: self.task.clone(),
                label: self.effective_label().to_string(),
                data_id: self.data_id.clone(),
                command: self.command.clone(),
            },
        )
    }
}

impl GraphFile {
    /// Executor options from the `[executor]` section.
    pub fn executor_options(&self) -> Result<ExecutorOptions> {
        let section = self.executor();
        let timeout = match &section.timeout {
            Some(s) => Some(parse_timeout(s).map_err(|e| {
                QexecError::ConfigError(format!("[executor].timeout: {e}"))
            })?),
            None => None,
        };

        Ok(ExecutorOptions {
            processes: section.processes,
            timeout,
            fail_fast: section.fail_fast,
        })
    }

    /// Build the quantum graph.
    ///
    /// With an empty `selection` every quantum is kept. Otherwise only quanta
    /// whose task/label match one of the specs are kept, together with
    /// everything they transitively depend on. A selection that matches
    /// nothing is a configuration error.
    pub fn build_graph(&self, selection: &[TaskSpec]) -> Result<QuantumGraph> {
        let keep = self.select(selection)?;

        let mut graph = QuantumGraph::new();
        for q in self.quanta().iter().filter(|q| keep.contains(q.id.as_str())) {
            graph.add_quantum(q.to_quantum())?;
        }
        for q in self.quanta().iter().filter(|q| keep.contains(q.id.as_str())) {
            for dep in &q.after {
                graph.add_dependency(&q.id, dep)?;
            }
        }

        info!(
            quanta = graph.len(),
            defined = self.quanta().len(),
            "built quantum graph"
        );
        Ok(graph)
    }

    /// Build the fixup chain in file order.
    pub fn build_fixups(&self) -> FixupChain {
        let mut chain = FixupChain::new();
        for fixup in self.fixups() {
            match fixup {
                FixupConfig::Serialize {
                    label,
                    dimensions,
                    reverse,
                } => {
                    debug!(%label, ?dimensions, reverse, "registering serialize fixup");
                    chain.push(SerializeDimension::new(
                        label.clone(),
                        dimensions.clone(),
                        *reverse,
                    ));
                }
            }
        }
        chain
    }

    fn select(&self, selection: &[TaskSpec]) -> Result<HashSet<&str>> {
        if selection.is_empty() {
            return Ok(self.quanta().iter().map(|q| q.id.as_str()).collect());
        }

        let by_id: HashMap<&str, &QuantumConfig> =
            self.quanta().iter().map(|q| (q.id.as_str(), q)).collect();

        let mut stack: Vec<&str> = self
            .quanta()
            .iter()
            .filter(|q| {
                selection
                    .iter()
                    .any(|spec| spec.matches(&q.task, q.effective_label()))
            })
            .map(|q| q.id.as_str())
            .collect();

        if stack.is_empty() {
            let wanted: Vec<String> = selection.iter().map(ToString::to_string).collect();
            return Err(QexecError::ConfigError(format!(
                "no quanta match task selection [{}]",
                wanted.join(", ")
            )));
        }

        let mut keep = HashSet::new();
        while let Some(id) = stack.pop() {
            if !keep.insert(id) {
                continue;
            }
            if let Some(q) = by_id.get(id) {
                stack.extend(q.after.iter().map(String::as_str));
            }
        }

        debug!(
            selected = keep.len(),
            specs = selection.len(),
            "applied task selection"
        );
        Ok(keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawGraphFile;

    fn graph_file(toml_src: &str) -> GraphFile {
        let raw: RawGraphFile = toml::from_str(toml_src).expect("valid toml");
        GraphFile::try_from(raw).expect("valid graph file")
    }

    const PIPELINE: &str = r#"
        [[quantum]]
        id = "isr-1"
        task = "pipe.IsrTask"
        data_id = { visit = 1 }

        [[quantum]]
        id = "calib-1"
        task = "pipe.CalibrateTask"
        after = ["isr-1"]

        [[quantum]]
        id = "assoc-1"
        task = "pipe.AssocTask"
        label = "assoc"
        after = ["calib-1"]

        [[quantum]]
        id = "other"
        task = "pipe.OtherTask"
    "#;

    #[test]
    fn builds_full_graph_without_selection() {
        let cfg = graph_file(PIPELINE);
        let graph = cfg.build_graph(&[]).unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.dependencies_of("calib-1").unwrap(), vec!["isr-1"]);
        assert_eq!(graph.get("isr-1").unwrap().payload.label, "IsrTask");
    }

    #[test]
    fn selection_keeps_upstream_dependencies_only() {
        let cfg = graph_file(PIPELINE);
        let spec: TaskSpec = "pipe.CalibrateTask".parse().unwrap();
        let graph = cfg.build_graph(&[spec]).unwrap();

        let mut ids: Vec<&str> = graph.quanta().map(|q| q.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["calib-1", "isr-1"]);
    }

    #[test]
    fn selection_matching_nothing_is_an_error() {
        let cfg = graph_file(PIPELINE);
        let spec: TaskSpec = "pipe.AssocTask:wrong".parse().unwrap();
        let err = cfg.build_graph(&[spec]).unwrap_err();
        assert!(matches!(err, QexecError::ConfigError(_)));
    }

    #[test]
    fn executor_options_parse_timeout() {
        let cfg = graph_file(
            r#"
            [executor]
            processes = 3
            timeout = "250ms"
            fail_fast = true

            [[quantum]]
            id = "a"
            task = "pipe.A"
            "#,
        );
        let opts = cfg.executor_options().unwrap();
        assert_eq!(opts.processes, 3);
        assert_eq!(opts.timeout, Some(std::time::Duration::from_millis(250)));
        assert!(opts.fail_fast);
    }

    #[test]
    fn fixups_follow_file_order() {
        let cfg = graph_file(
            r#"
            [[quantum]]
            id = "a"
            task = "pipe.A"
            data_id = { visit = 1 }

            [[fixup]]
            kind = "serialize"
            label = "A"
            dimensions = ["visit"]

            [[fixup]]
            kind = "serialize"
            label = "A"
            dimensions = ["visit"]
            reverse = true
            "#,
        );
        let chain = cfg.build_fixups();
        assert_eq!(chain.len(), 2);
    }
}
