// tests/fixups.rs

mod common;
use crate::common::*;

use qexec::engine::Executor;
use qexec::errors::{QexecError, Result as QexecResult};
use qexec::graph::{EdgeEditor, FixupChain, GraphFixup, SerializeDimension};
use qexec::types::QuantumId;
use tokio_util::sync::CancellationToken;

/// Makes `later` depend on `earlier`.
#[derive(Debug)]
struct OrderPair {
    earlier: &'static str,
    later: &'static str,
}

impl GraphFixup for OrderPair {
    fn name(&self) -> &str {
        "order-pair"
    }

    fn apply(&self, ordered: Vec<QuantumId>, edges: &mut EdgeEditor<'_>) -> QexecResult<Vec<QuantumId>> {
        edges.add_dependency(self.later, self.earlier)?;
        Ok(ordered)
    }
}

/// Returns one quantum twice and drops another.
#[derive(Debug)]
struct Duplicate;

impl GraphFixup for Duplicate {
    fn name(&self) -> &str {
        "duplicate"
    }

    fn apply(&self, mut ordered: Vec<QuantumId>, _edges: &mut EdgeEditor<'_>) -> QexecResult<Vec<QuantumId>> {
        if ordered.len() >= 2 {
            let first = ordered[0].clone();
            ordered.pop();
            ordered.push(first);
        }
        Ok(ordered)
    }
}

#[tokio::test]
async fn fixup_edge_orders_independent_quanta() -> TestResult {
    init_tracing();

    let graph = GraphBuilder::new()
        .quantum("X", "x")
        .quantum("Y", "y")
        .build();
    let runner = RecordingRunner::new().with_delay(ms(40));
    let executor = Executor::new(runner.clone(), options(2)).with_fixups(
        FixupChain::new().with(OrderPair {
            earlier: "X",
            later: "Y",
        }),
    );

    let report = with_timeout(executor.execute(graph, CancellationToken::new())).await?;

    assert!(report.is_success());
    let x = runner.record("X").unwrap();
    let y = runner.record("Y").unwrap();
    assert!(y.started >= x.finished, "Y must wait for X");
    assert_eq!(runner.started(), vec!["X", "Y"]);
    Ok(())
}

/// Drops one edge and adds nothing.
#[derive(Debug)]
struct RemoveEdge {
    from: &'static str,
    to: &'static str,
}

impl GraphFixup for RemoveEdge {
    fn name(&self) -> &str {
        "remove-edge"
    }

    fn apply(&self, ordered: Vec<QuantumId>, edges: &mut EdgeEditor<'_>) -> QexecResult<Vec<QuantumId>> {
        edges.remove_dependency(self.from, self.to)?;
        Ok(ordered)
    }
}

#[tokio::test]
async fn removing_an_edge_never_introduces_a_cycle() -> TestResult {
    init_tracing();

    let graph = GraphBuilder::new()
        .quantum("A", "a")
        .quantum("B", "b")
        .quantum("C", "c")
        .dep("B", "A")
        .dep("C", "B")
        .dep("C", "A")
        .build();
    let runner = RecordingRunner::new();
    let executor = Executor::new(runner.clone(), options(2))
        .with_fixups(FixupChain::new().with(RemoveEdge { from: "C", to: "A" }));

    let plan = executor.prepare(graph)?;
    assert_eq!(plan.ordered_ids(), vec!["A", "B", "C"]);

    let report = with_timeout(executor.run_plan(&plan, CancellationToken::new())).await;
    assert!(report.is_success());
    Ok(())
}

#[tokio::test]
async fn fixup_referencing_unknown_quantum_is_fatal() -> TestResult {
    init_tracing();

    let graph = GraphBuilder::new().quantum("A", "a").build();
    let runner = RecordingRunner::new();
    let executor = Executor::new(runner.clone(), options(1)).with_fixups(
        FixupChain::new().with(OrderPair {
            earlier: "A",
            later: "ghost",
        }),
    );

    let err = executor
        .execute(graph, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, QexecError::UnknownQuantum(ref id) if id == "ghost"));
    assert_eq!(runner.run_count(), 0);
    Ok(())
}

#[tokio::test]
async fn fixup_introducing_cycle_aborts_with_no_runs() -> TestResult {
    init_tracing();

    let graph = GraphBuilder::new()
        .quantum("A", "a")
        .quantum("B", "b")
        .dep("B", "A")
        .build();
    let runner = RecordingRunner::new();
    let executor = Executor::new(runner.clone(), options(2)).with_fixups(
        FixupChain::new().with(OrderPair {
            earlier: "B",
            later: "A",
        }),
    );

    let err = with_timeout(executor.execute(graph, CancellationToken::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, QexecError::Cycle { .. }), "got {err:?}");
    assert_eq!(runner.run_count(), 0);
    Ok(())
}

#[tokio::test]
async fn contract_violation_is_reported_before_execution() -> TestResult {
    init_tracing();

    let graph = GraphBuilder::new()
        .quantum("A", "a")
        .quantum("B", "b")
        .quantum("C", "c")
        .build();
    let runner = RecordingRunner::new();
    let mut executor = Executor::new(runner.clone(), options(1));
    executor.add_fixup(Duplicate);

    let err = with_timeout(executor.execute(graph, CancellationToken::new()))
        .await
        .unwrap_err();

    match err {
        QexecError::FixupContractViolation { fixup, .. } => assert_eq!(fixup, "duplicate"),
        other => panic!("expected contract violation, got {other:?}"),
    }
    assert_eq!(runner.run_count(), 0);
    Ok(())
}

#[tokio::test]
async fn serialize_dimension_runs_visits_in_order() -> TestResult {
    init_tracing();

    let graph = GraphBuilder::new()
        .quantum_with("assoc-3", "assoc", &[("visit", 3)])
        .quantum_with("assoc-1", "assoc", &[("visit", 1)])
        .quantum_with("assoc-2", "assoc", &[("visit", 2)])
        .quantum_with("isr-1", "isr", &[("visit", 1)])
        .build();
    let runner = RecordingRunner::new().with_delay(ms(10));
    let executor = Executor::new(runner.clone(), options(4)).with_fixups(
        FixupChain::new().with(SerializeDimension::new("assoc", vec!["visit".into()], false)),
    );

    let plan = executor.prepare(graph.clone())?;
    let order: Vec<&str> = plan.ordered_ids();
    let pos = |id: &str| order.iter().position(|o| *o == id).unwrap();
    assert!(pos("assoc-1") < pos("assoc-2"));
    assert!(pos("assoc-2") < pos("assoc-3"));

    let report = with_timeout(executor.run_plan(&plan, CancellationToken::new())).await;
    assert!(report.is_success());

    let r1 = runner.record("assoc-1").unwrap();
    let r2 = runner.record("assoc-2").unwrap();
    let r3 = runner.record("assoc-3").unwrap();
    assert!(r2.started >= r1.finished);
    assert!(r3.started >= r2.finished);
    Ok(())
}

#[tokio::test]
async fn serialize_dimension_reverse_runs_descending() -> TestResult {
    init_tracing();

    let graph = GraphBuilder::new()
        .quantum_with("v1", "assoc", &[("visit", 1)])
        .quantum_with("v2", "assoc", &[("visit", 2)])
        .build();
    let runner = RecordingRunner::new();
    let executor = Executor::new(runner.clone(), options(2)).with_fixups(
        FixupChain::new().with(SerializeDimension::new("assoc", vec!["visit".into()], true)),
    );

    let report = with_timeout(executor.execute(graph, CancellationToken::new())).await?;

    assert!(report.is_success());
    assert_eq!(runner.started(), vec!["v2", "v1"]);
    Ok(())
}

#[test]
fn fixups_see_edits_of_earlier_fixups() {
    // First fixup adds B -> A; the second must observe it.
    #[derive(Debug)]
    struct ExpectEdge;

    impl GraphFixup for ExpectEdge {
        fn name(&self) -> &str {
            "expect-edge"
        }

        fn apply(&self, ordered: Vec<QuantumId>, edges: &mut EdgeEditor<'_>) -> QexecResult<Vec<QuantumId>> {
            assert_eq!(edges.dependencies_of("B")?, vec!["A"]);
            Ok(ordered)
        }
    }

    let graph = GraphBuilder::new().quantum("A", "a").quantum("B", "b").build();
    let chain = FixupChain::new()
        .with(OrderPair {
            earlier: "A",
            later: "B",
        })
        .with(ExpectEdge);

    let executor = qexec::engine::Executor::new(RecordingRunner::new(), options(1)).with_fixups(chain);
    let plan = executor.prepare(graph).unwrap();
    assert_eq!(plan.ordered_ids(), vec!["A", "B"]);
}
