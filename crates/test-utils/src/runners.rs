use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use qexec::errors::QuantumFailure;
use qexec::exec::{RunFuture, TaskRunner};
use qexec::graph::Quantum;
use tokio_util::sync::CancellationToken;

/// One completed call into [`RecordingRunner`].
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub started: Instant,
    pub finished: Instant,
    pub cancelled: bool,
}

#[derive(Default)]
struct Shared {
    started: Mutex<Vec<String>>,
    records: Mutex<Vec<RunRecord>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

/// A fake task runner that:
/// - records which quanta were started, in order, with timestamps
/// - optionally sleeps (per quantum or for all of them) while honouring
///   cancellation
/// - fails the quanta it was told to fail
///
/// Clones share their recordings, so keep one clone for assertions and hand
/// the other to the executor.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    shared: Arc<Shared>,
    failing: Arc<HashSet<String>>,
    delays: Arc<HashMap<String, Duration>>,
    default_delay: Duration,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make these quanta fail with a task error.
    pub fn failing(mut self, ids: &[&str]) -> Self {
        self.failing = Arc::new(ids.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Sleep this long in every quantum without a specific delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_delay_for(mut self, id: &str, delay: Duration) -> Self {
        Arc::make_mut(&mut self.delays).insert(id.to_string(), delay);
        self
    }

    /// Ids in the order the runner was entered.
    pub fn started(&self) -> Vec<String> {
        self.shared.started.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<RunRecord> {
        self.shared.records.lock().unwrap().clone()
    }

    pub fn record(&self, id: &str) -> Option<RunRecord> {
        self.records().into_iter().find(|r| r.id == id)
    }

    pub fn was_run(&self, id: &str) -> bool {
        self.started().iter().any(|s| s == id)
    }

    pub fn run_count(&self) -> usize {
        self.shared.started.lock().unwrap().len()
    }

    /// Highest number of quanta observed inside the runner at once.
    pub fn max_concurrency(&self) -> usize {
        self.shared.max_running.load(Ordering::SeqCst)
    }

    fn delay_for(&self, id: &str) -> Duration {
        self.delays.get(id).copied().unwrap_or(self.default_delay)
    }
}

impl TaskRunner for RecordingRunner {
    fn run(&self, quantum: Arc<Quantum>, cancel: CancellationToken) -> RunFuture<'_> {
        Box::pin(async move {
            let id = quantum.id.clone();
            let started = Instant::now();
            self.shared.started.lock().unwrap().push(id.clone());

            let now_running = self.shared.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.shared
                .max_running
                .fetch_max(now_running, Ordering::SeqCst);

            let delay = self.delay_for(&id);
            let cancelled = if delay.is_zero() {
                cancel.is_cancelled()
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => false,
                    _ = cancel.cancelled() => true,
                }
            };

            self.shared.running.fetch_sub(1, Ordering::SeqCst);
            self.shared.records.lock().unwrap().push(RunRecord {
                id: id.clone(),
                started,
                finished: Instant::now(),
                cancelled,
            });

            if cancelled {
                Err(QuantumFailure::Cancelled)
            } else if self.failing.contains(&id) {
                Err(QuantumFailure::Task(format!("injected failure in {id}")))
            } else {
                Ok(())
            }
        })
    }
}
