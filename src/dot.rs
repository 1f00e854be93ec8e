// src/dot.rs

//! GraphViz export of quantum graphs and prepared plans.

use std::io::Write;

use crate::engine::ExecutionPlan;
use crate::errors::Result;
use crate::graph::{Quantum, QuantumGraph};

/// Render `graph` as it was built, before any fixup.
pub fn graph_to_dot(graph: &QuantumGraph, out: &mut impl Write) -> Result<()> {
    let mut nodes = Vec::with_capacity(graph.len());
    for quantum in graph.quanta() {
        nodes.push((quantum, graph.dependencies_of(&quantum.id)?));
    }
    render(nodes, out)
}

/// Render a prepared plan (fixup edges included), nodes in execution order.
pub fn plan_to_dot(plan: &ExecutionPlan, out: &mut impl Write) -> Result<()> {
    let nodes = plan
        .order()
        .iter()
        .map(|&i| {
            let deps = plan
                .dependencies(i)
                .iter()
                .map(|&d| plan.quantum(d).id.as_str())
                .collect();
            (&**plan.quantum(i), deps)
        })
        .collect();
    render(nodes, out)
}

fn render(nodes: Vec<(&Quantum, Vec<&str>)>, out: &mut impl Write) -> Result<()> {
    writeln!(out, "digraph QuantumGraph {{")?;
    writeln!(out, "  rankdir=TB;")?;
    writeln!(out, "  node [shape=box, style=\"rounded,filled\", fillcolor=\"#e8eef7\"];")?;

    for (quantum, _) in &nodes {
        let mut label = format!("{}\\n{}", escape(&quantum.payload.label), escape(&quantum.id));
        for (key, value) in &quantum.payload.data_id {
            label.push_str(&format!("\\n{}: {}", escape(key), escape(&value.to_string())));
        }
        writeln!(out, "  \"{}\" [label=\"{}\"];", escape(&quantum.id), label)?;
    }

    // Edges point from a dependency to the quantum waiting on it.
    for (quantum, deps) in &nodes {
        for dep in deps {
            writeln!(out, "  \"{}\" -> \"{}\";", escape(dep), escape(&quantum.id))?;
        }
    }

    writeln!(out, "}}")?;
    Ok(())
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DataId, DataIdValue, QuantumPayload};

    fn quantum(id: &str, label: &str, visit: Option<i64>) -> Quantum {
        let mut data_id = DataId::new();
        if let Some(v) = visit {
            data_id.insert("visit".into(), DataIdValue::Int(v));
        }
        Quantum::new(
            id,
            QuantumPayload {
                task: format!("pipe.{label}"),
                label: label.into(),
                data_id,
                command: None,
            },
        )
    }

    #[test]
    fn renders_nodes_and_dependency_edges() {
        let mut graph = QuantumGraph::new();
        graph.add_quantum(quantum("a", "isr", Some(12))).unwrap();
        graph.add_quantum(quantum("b", "calib", None)).unwrap();
        graph.add_dependency("b", "a").unwrap();

        let mut buf = Vec::new();
        graph_to_dot(&graph, &mut buf).unwrap();
        let dot = String::from_utf8(buf).unwrap();

        assert!(dot.starts_with("digraph QuantumGraph {"));
        assert!(dot.contains("\"a\" [label=\"isr\\na\\nvisit: 12\"];"));
        assert!(dot.contains("\"a\" -> \"b\";"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn quotes_are_escaped() {
        let mut graph = QuantumGraph::new();
        graph.add_quantum(quantum("q\"1", "isr", None)).unwrap();

        let mut buf = Vec::new();
        graph_to_dot(&graph, &mut buf).unwrap();
        let dot = String::from_utf8(buf).unwrap();
        assert!(dot.contains("\"q\\\"1\""));
    }
}
