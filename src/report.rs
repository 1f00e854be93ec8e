// src/report.rs

//! End-of-run report.

use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::engine::{ExecutionPlan, ExecutionState};
use crate::errors::{QexecError, QuantumFailure, Result};
use crate::types::{QuantumId, QuantumStatus};

/// Why a run stopped dispatching before every quantum got a chance to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller's cancellation token fired (e.g. Ctrl-C).
    Cancelled,
    /// `fail_fast` was set and a quantum failed.
    FailFast,
}

/// Wall-clock bounds of one quantum's execution, as seen by its worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantumTiming {
    pub started: Option<Instant>,
    pub finished: Option<Instant>,
}

/// Final state of one quantum.
#[derive(Debug, Clone)]
pub struct QuantumReport {
    pub id: QuantumId,
    pub label: String,
    pub status: QuantumStatus,
    pub failure: Option<QuantumFailure>,
    pub timing: QuantumTiming,
}

impl QuantumReport {
    pub fn elapsed(&self) -> Option<Duration> {
        match (self.timing.started, self.timing.finished) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }

    /// The quantum never reached a terminal state (only possible when the
    /// run was stopped early).
    pub fn not_executed(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Per-quantum outcome of a run plus the aggregate verdict.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One entry per quantum, in validated topological order.
    pub quanta: Vec<QuantumReport>,
    pub stop: Option<StopReason>,
    pub elapsed: Duration,
}

impl RunReport {
    pub(crate) fn build(
        plan: &ExecutionPlan,
        state: ExecutionState,
        timings: Vec<QuantumTiming>,
        stop: Option<StopReason>,
        elapsed: Duration,
    ) -> Self {
        let (statuses, mut failures) = state.into_parts();

        let quanta = plan
            .order()
            .iter()
            .map(|&i| {
                let quantum = plan.quantum(i);
                QuantumReport {
                    id: quantum.id.clone(),
                    label: quantum.payload.label.clone(),
                    status: statuses[i],
                    failure: failures[i].take(),
                    timing: timings[i],
                }
            })
            .collect();

        Self {
            quanta,
            stop,
            elapsed,
        }
    }

    pub fn get(&self, id: &str) -> Option<&QuantumReport> {
        self.quanta.iter().find(|q| q.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<QuantumStatus> {
        self.get(id).map(|q| q.status)
    }

    fn ids_with(&self, status: QuantumStatus) -> Vec<&str> {
        self.quanta
            .iter()
            .filter(|q| q.status == status)
            .map(|q| q.id.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.ids_with(QuantumStatus::Succeeded)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.ids_with(QuantumStatus::Failed)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.ids_with(QuantumStatus::Skipped)
    }

    /// Quanta left `Pending` or `Ready` because the run stopped early.
    pub fn not_executed(&self) -> Vec<&str> {
        self.quanta
            .iter()
            .filter(|q| q.not_executed())
            .map(|q| q.id.as_str())
            .collect()
    }

    /// The caller's token stopped the run.
    pub fn was_cancelled(&self) -> bool {
        self.stop == Some(StopReason::Cancelled)
    }

    /// Dispatching stopped before the plan drained, by cancellation or
    /// fail-fast.
    pub fn stopped_early(&self) -> bool {
        self.stop.is_some()
    }

    /// `true` only if every quantum succeeded.
    pub fn is_success(&self) -> bool {
        self.quanta
            .iter()
            .all(|q| q.status == QuantumStatus::Succeeded)
    }

    /// Turn an unsuccessful run into [`QexecError::RunFailed`].
    pub fn into_result(self) -> Result<RunReport> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(QexecError::RunFailed {
                failed: self.failed().len(),
                skipped: self.skipped().len(),
                not_executed: self.not_executed().len(),
            })
        }
    }

    pub fn log_summary(&self) {
        let total = self.quanta.len();
        let succeeded = self.succeeded().len();

        if self.is_success() {
            info!(
                total,
                elapsed_ms = self.elapsed.as_millis() as u64,
                "all quanta succeeded"
            );
            return;
        }

        if let Some(stop) = self.stop {
            warn!(?stop, "run stopped before all quanta were dispatched");
        }

        error!(
            total,
            succeeded,
            failed = self.failed().len(),
            skipped = self.skipped().len(),
            not_executed = self.not_executed().len(),
            "run finished with failures"
        );
        for q in self.quanta.iter().filter(|q| q.status != QuantumStatus::Succeeded) {
            match &q.failure {
                Some(failure) => error!(quantum = %q.id, label = %q.label, status = %q.status, %failure, "  -"),
                None => error!(quantum = %q.id, label = %q.label, status = %q.status, "  -"),
            }
        }
    }
}
