// tests/command_runner.rs

#![cfg(unix)]

mod common;
use crate::common::*;

use std::sync::Arc;
use std::time::{Duration, Instant};

use qexec::engine::{Executor, ExecutorOptions};
use qexec::errors::QuantumFailure;
use qexec::exec::{CommandRunner, TaskRunner};
use qexec::graph::Quantum;
use qexec::types::QuantumStatus;
use tokio_util::sync::CancellationToken;

fn with_command(id: &str, label: &str, dims: &[(&str, i64)], command: &str) -> Quantum {
    let mut q = quantum_with(id, label, dims);
    q.payload.command = Some(command.to_string());
    q
}

#[tokio::test]
async fn quantum_without_command_is_a_noop_success() {
    init_tracing();
    let outcome = CommandRunner::new()
        .run(Arc::new(quantum("noop", "isr")), CancellationToken::new())
        .await;
    assert_eq!(outcome, Ok(()));
}

#[tokio::test]
async fn command_sees_quantum_environment() {
    init_tracing();
    let q = with_command(
        "isr-12",
        "isr",
        &[("visit", 12)],
        r#"test "$QEXEC_QUANTUM_ID" = isr-12 && test "$QEXEC_LABEL" = isr && test "$QEXEC_TASK" = pipe.isr && test "$QEXEC_DATAID_VISIT" = 12"#,
    );

    let outcome = with_timeout(CommandRunner::new().run(Arc::new(q), CancellationToken::new())).await;
    assert_eq!(outcome, Ok(()));
}

#[tokio::test]
async fn non_zero_exit_is_a_task_failure() {
    init_tracing();
    let q = with_command("bad", "isr", &[], "echo boom >&2; exit 3");

    let outcome = with_timeout(CommandRunner::new().run(Arc::new(q), CancellationToken::new())).await;
    match outcome {
        Err(QuantumFailure::Task(msg)) => assert!(msg.contains('3'), "message: {msg}"),
        other => panic!("expected task failure, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_kills_the_process() {
    init_tracing();
    let q = with_command("sleepy", "isr", &[], "sleep 5");
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
    }

    let started = Instant::now();
    let outcome = with_timeout(CommandRunner::new().run(Arc::new(q), cancel)).await;
    assert_eq!(outcome, Err(QuantumFailure::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn shell_pipeline_end_to_end() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("order.txt");
    let marker = marker.display();

    let graph = GraphBuilder::new()
        .with_quantum(with_command("first", "a", &[], &format!("echo first >> {marker}")))
        .with_quantum(with_command("second", "b", &[], &format!("echo second >> {marker}")))
        .with_quantum(with_command("broken", "c", &[], "exit 1"))
        .with_quantum(with_command("never", "d", &[], &format!("echo never >> {marker}")))
        .dep("second", "first")
        .dep("never", "broken")
        .build();

    let executor = Executor::new(
        CommandRunner::new(),
        ExecutorOptions {
            processes: 2,
            ..ExecutorOptions::default()
        },
    );
    let report = with_timeout(executor.execute(graph, CancellationToken::new())).await?;

    assert_eq!(report.status_of("second"), Some(QuantumStatus::Succeeded));
    assert_eq!(report.status_of("broken"), Some(QuantumStatus::Failed));
    assert_eq!(report.status_of("never"), Some(QuantumStatus::Skipped));

    let written = std::fs::read_to_string(dir.path().join("order.txt"))?;
    assert_eq!(written.lines().collect::<Vec<_>>(), vec!["first", "second"]);
    Ok(())
}
