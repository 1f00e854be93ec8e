// src/lib.rs

pub mod cli;
pub mod config;
pub mod dot;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod graph;
pub mod logging;
pub mod report;
pub mod types;

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::engine::{ExecutionPlan, Executor, ExecutorOptions};
use crate::exec::CommandRunner;

/// High-level entry point used by `main.rs`.
///
/// Wires together:
/// - graph file loading and validation
/// - task selection and graph construction
/// - fixups, cycle validation and the execution plan
/// - optional DOT export and dry-run listing
/// - the executor with the shell command runner
/// - Ctrl-C handling
///
/// Returns an error for fatal problems and for runs that did not fully
/// succeed.
pub async fn run(args: CliArgs) -> Result<()> {
    let graph_path = &args.graph;
    let graph_file = load_and_validate(graph_path)
        .with_context(|| format!("loading graph file {}", graph_path.display()))?;

    let options = resolve_options(&args, graph_file.executor_options()?);
    let graph = graph_file.build_graph(&args.tasks)?;

    let executor =
        Executor::new(CommandRunner::new(), options).with_fixups(graph_file.build_fixups());
    let plan = executor.prepare(graph)?;

    if let Some(dot_path) = &args.dot {
        write_dot(&plan, dot_path)?;
    }

    if args.dry_run {
        print_dry_run(&plan, &options);
        return Ok(());
    }

    // Ctrl-C -> cooperative cancellation of the whole run.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            cancel.cancel();
        });
    }

    let report = executor.run_plan(&plan, cancel).await;
    report.into_result()?;
    Ok(())
}

/// Command-line values override the `[executor]` section.
fn resolve_options(args: &CliArgs, from_file: ExecutorOptions) -> ExecutorOptions {
    let mut options = from_file;
    if let Some(processes) = args.processes {
        options.processes = processes as usize;
    }
    if let Some(timeout) = args.timeout {
        options.timeout = Some(timeout);
    }
    options.fail_fast |= args.fail_fast;
    debug!(?options, "resolved executor options");
    options
}

fn write_dot(plan: &ExecutionPlan, path: &str) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating DOT file {path}"))?;
    let mut out = BufWriter::new(file);
    dot::plan_to_dot(plan, &mut out)?;
    out.flush()?;
    info!(path, "wrote execution graph in DOT format");
    Ok(())
}

/// Print the prepared execution order without running anything.
fn print_dry_run(plan: &ExecutionPlan, options: &ExecutorOptions) {
    println!("qexec dry-run");
    println!("  executor.processes = {}", options.processes);
    match options.timeout {
        Some(t) => println!("  executor.timeout = {t:?}"),
        None => println!("  executor.timeout = none"),
    }
    println!("  executor.fail_fast = {}", options.fail_fast);
    println!();

    println!("execution order ({} quanta):", plan.len());
    for &i in plan.order() {
        let quantum = plan.quantum(i);
        println!("  - {quantum}");
        println!("      task: {}", quantum.payload.task);
        if let Some(cmd) = &quantum.payload.command {
            println!("      cmd: {cmd}");
        }
        let deps: Vec<&str> = plan
            .dependencies(i)
            .iter()
            .map(|&d| plan.quantum(d).id.as_str())
            .collect();
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
