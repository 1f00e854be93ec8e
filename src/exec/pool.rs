// src/exec/pool.rs

//! Fixed-size worker pool pulling from a shared ready queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{ScheduledQuantum, WorkerEvent};
use crate::errors::QuantumFailure;
use crate::exec::runner::{RunOutcome, TaskRunner};

/// Shared state every worker needs.
struct WorkerContext<R> {
    runner: Arc<R>,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<ScheduledQuantum>>>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    run_token: CancellationToken,
    timeout: Option<Duration>,
}

impl<R> Clone for WorkerContext<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            queue: Arc::clone(&self.queue),
            events: self.events.clone(),
            run_token: self.run_token.clone(),
            timeout: self.timeout,
        }
    }
}

/// Spawn `count` workers.
///
/// Every worker loops: take the next quantum off `ready_rx`, report
/// `Started`, run it through `runner`, report `Finished`. Once `run_token`
/// is cancelled, queued quanta are answered with `Declined` instead of being
/// run. Workers exit when the ready queue is closed and empty; the event
/// channel closes when the last worker is gone.
pub fn spawn_workers<R>(
    count: usize,
    runner: Arc<R>,
    ready_rx: mpsc::UnboundedReceiver<ScheduledQuantum>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    run_token: CancellationToken,
    timeout: Option<Duration>,
) -> JoinSet<()>
where
    R: TaskRunner + 'static,
{
    let ctx = WorkerContext {
        runner,
        queue: Arc::new(Mutex::new(ready_rx)),
        events,
        run_token,
        timeout,
    };

    let mut workers = JoinSet::new();
    for worker in 0..count.max(1) {
        workers.spawn(worker_loop(worker, ctx.clone()));
    }
    info!(workers = count.max(1), "worker pool started");
    workers
}

async fn worker_loop<R>(worker: usize, ctx: WorkerContext<R>)
where
    R: TaskRunner + 'static,
{
    debug!(worker, "worker started");

    loop {
        let next = {
            let mut queue = ctx.queue.lock().await;
            queue.recv().await
        };
        let Some(scheduled) = next else {
            break;
        };
        let index = scheduled.index;

        if ctx.run_token.is_cancelled() {
            debug!(worker, quantum = %scheduled.quantum.id, "run cancelled; declining queued quantum");
            if ctx.events.send(WorkerEvent::Declined { index }).is_err() {
                break;
            }
            continue;
        }

        if ctx
            .events
            .send(WorkerEvent::Started {
                index,
                worker,
                at: Instant::now(),
            })
            .is_err()
        {
            break;
        }

        let outcome = run_one(&ctx, scheduled).await;

        if ctx
            .events
            .send(WorkerEvent::Finished {
                index,
                outcome,
                at: Instant::now(),
            })
            .is_err()
        {
            break;
        }
    }

    debug!(worker, "worker finished (ready queue closed)");
}

/// Run one quantum on its own Tokio task so a panicking runner is reported
/// as a failure instead of taking the worker down.
async fn run_one<R>(ctx: &WorkerContext<R>, scheduled: ScheduledQuantum) -> RunOutcome
where
    R: TaskRunner + 'static,
{
    let quantum_id = scheduled.quantum.id.clone();
    let token = ctx.run_token.child_token();
    let runner = Arc::clone(&ctx.runner);
    let run_token = token.clone();

    let mut handle =
        tokio::spawn(async move { runner.run(scheduled.quantum, run_token).await });

    let joined = match ctx.timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(quantum = %quantum_id, ?limit, "quantum timed out; cancelling");
                token.cancel();
                handle.abort();
                return Err(QuantumFailure::TimedOut(limit));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(quantum = %quantum_id, error = %err, "task runner panicked or was aborted");
            Err(QuantumFailure::Task(format!("task runner did not complete: {err}")))
        }
    }
}
