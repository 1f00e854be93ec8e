// src/engine/executor.rs

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::core::ExecutionState;
use crate::engine::plan::{self, ExecutionPlan};
use crate::engine::{ExecutorOptions, ScheduledQuantum, WorkerEvent};
use crate::errors::{QuantumFailure, Result};
use crate::exec::{spawn_workers, TaskRunner};
use crate::graph::{FixupChain, GraphFixup, QuantumGraph};
use crate::report::{QuantumTiming, RunReport, StopReason};
use crate::types::QuantumStatus;

/// Runs a quantum graph to completion.
///
/// The executor owns the fixup chain and the task runner. Preparing a graph
/// (fixups + validation) is synchronous and fatal on error; running a
/// prepared plan never fails as a whole, it produces a [`RunReport`].
///
/// The orchestration loop below is the only writer of quantum statuses:
/// workers report `Started` / `Finished` / `Declined` over a channel and the
/// loop applies them to [`ExecutionState`] one at a time.
pub struct Executor<R: TaskRunner + 'static> {
    runner: Arc<R>,
    fixups: FixupChain,
    options: ExecutorOptions,
}

impl<R: TaskRunner + 'static> fmt::Debug for Executor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("fixups", &self.fixups)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<R: TaskRunner + 'static> Executor<R> {
    pub fn new(runner: R, options: ExecutorOptions) -> Self {
        Self {
            runner: Arc::new(runner),
            fixups: FixupChain::new(),
            options,
        }
    }

    /// Replace the fixup chain.
    pub fn with_fixups(mut self, fixups: FixupChain) -> Self {
        self.fixups = fixups;
        self
    }

    /// Register one more fixup at the end of the chain.
    pub fn add_fixup(&mut self, fixup: impl GraphFixup + 'static) {
        self.fixups.push(fixup);
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Apply fixups and validate; see [`plan::prepare`].
    pub fn prepare(&self, graph: QuantumGraph) -> Result<ExecutionPlan> {
        plan::prepare(graph, &self.fixups)
    }

    /// Prepare `graph` and run it.
    ///
    /// Returns `Err` only for fatal pre-execution problems (unknown ids,
    /// cycles, fixup contract violations). Quantum failures end up in the
    /// report.
    pub async fn execute(&self, graph: QuantumGraph, cancel: CancellationToken) -> Result<RunReport> {
        let plan = self.prepare(graph)?;
        Ok(self.run_plan(&plan, cancel).await)
    }

    /// Main orchestration loop.
    pub async fn run_plan(&self, plan: &ExecutionPlan, cancel: CancellationToken) -> RunReport {
        let started = Instant::now();
        let total = plan.len();
        info!(
            quanta = total,
            processes = self.options.processes,
            fail_fast = self.options.fail_fast,
            "starting quantum graph execution"
        );

        // Fail-fast cancels this token, not the caller's.
        let run_token = cancel.child_token();

        // Both queues are bounded by the number of quanta in the plan.
        let (ready_tx, ready_rx) = mpsc::unbounded_channel::<ScheduledQuantum>();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<WorkerEvent>();
        let mut workers = spawn_workers(
            self.options.processes,
            Arc::clone(&self.runner),
            ready_rx,
            events_tx,
            run_token.clone(),
            self.options.timeout,
        );

        let mut state = ExecutionState::new(plan);
        let mut timings = vec![QuantumTiming::default(); total];
        let mut fail_fast_triggered = false;
        let mut cancel_noticed = false;

        let initial = state.seed();
        let mut outstanding = dispatch(&ready_tx, plan, initial);

        while outstanding > 0 {
            tokio::select! {
                event = events_rx.recv() => {
                    let Some(event) = event else {
                        warn!(outstanding, "worker pool exited with work outstanding");
                        break;
                    };

                    match event {
                        WorkerEvent::Started { index, worker, at } => {
                            debug!(quantum = %plan.quantum(index).id, worker, "quantum started");
                            state.mark_running(index);
                            timings[index].started = Some(at);
                        }
                        WorkerEvent::Declined { index } => {
                            debug!(quantum = %plan.quantum(index).id, "quantum not executed");
                            outstanding -= 1;
                        }
                        WorkerEvent::Finished { index, outcome, at } => {
                            outstanding -= 1;
                            timings[index].finished = Some(at);
                            let quantum = plan.quantum(index);

                            let failed = match &outcome {
                                Ok(()) => {
                                    debug!(quantum = %quantum, "quantum succeeded");
                                    false
                                }
                                Err(QuantumFailure::Cancelled) => {
                                    info!(quantum = %quantum, "quantum cancelled; its dependents will not run");
                                    false
                                }
                                Err(failure) => {
                                    warn!(
                                        quantum = %quantum,
                                        %failure,
                                        "quantum failed; skipping its dependents"
                                    );
                                    true
                                }
                            };

                            let step = state.complete(index, outcome);
                            for &skipped in &step.newly_skipped {
                                warn!(
                                    quantum = %plan.quantum(skipped),
                                    upstream = %quantum.id,
                                    "upstream quantum failed; skipping"
                                );
                            }

                            if failed && self.options.fail_fast && !fail_fast_triggered {
                                warn!(quantum = %quantum.id, "fail-fast: stopping run after first failure");
                                fail_fast_triggered = true;
                                run_token.cancel();
                            }

                            if !run_token.is_cancelled() {
                                outstanding += dispatch(&ready_tx, plan, step.newly_ready);
                            }

                            log_progress(&state, total);
                        }
                    }
                }

                _ = run_token.cancelled(), if !cancel_noticed => {
                    cancel_noticed = true;
                    info!(in_flight = outstanding, "run cancelled; no further quanta will be dispatched");
                }
            }
        }

        // Closing the ready queue lets idle workers exit.
        drop(ready_tx);
        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "worker task ended abnormally");
            }
        }

        let stop = if fail_fast_triggered {
            Some(StopReason::FailFast)
        } else if run_token.is_cancelled() {
            Some(StopReason::Cancelled)
        } else {
            None
        };

        if stop.is_none() && !state.is_drained() {
            warn!("orchestration loop ended with undecided quanta");
        }

        let report = RunReport::build(plan, state, timings, stop, started.elapsed());
        report.log_summary();
        report
    }
}

/// Push ready quanta onto the shared queue; returns how many were queued.
fn dispatch(
    ready_tx: &mpsc::UnboundedSender<ScheduledQuantum>,
    plan: &ExecutionPlan,
    ready: Vec<usize>,
) -> usize {
    let mut queued = 0;
    for index in ready {
        let quantum = Arc::clone(plan.quantum(index));
        debug!(quantum = %quantum.id, "dependencies satisfied; queueing quantum");
        if ready_tx.send(ScheduledQuantum { index, quantum }).is_ok() {
            queued += 1;
        } else {
            warn!(index, "ready queue closed; quantum not queued");
        }
    }
    queued
}

fn log_progress(state: &ExecutionState, total: usize) {
    let succeeded = state.count(QuantumStatus::Succeeded);
    let failed = state.count(QuantumStatus::Failed);
    let skipped = state.count(QuantumStatus::Skipped);
    info!(
        "Executed {} quanta successfully, {} failed, {} skipped and {} remain out of total {} quanta.",
        succeeded,
        failed,
        skipped,
        total - succeeded - failed - skipped,
        total
    );
}
