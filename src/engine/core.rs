// src/engine/core.rs

//! Pure per-quantum execution state machine.
//!
//! `ExecutionState` consumes dispatch and completion facts and answers which
//! quanta became ready and which must be skipped. It has no channels, no
//! Tokio types and performs no IO, so it can be unit tested step by step.
//! The async shell in [`super::executor`] is the only caller at runtime,
//! which makes it the single writer of every status.

use tracing::{debug, warn};

use crate::engine::plan::ExecutionPlan;
use crate::errors::QuantumFailure;
use crate::exec::RunOutcome;
use crate::types::QuantumStatus;

/// Result of a single completion step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreStep {
    /// Quanta whose last outstanding dependency just succeeded.
    pub newly_ready: Vec<usize>,
    /// Transitive dependents of a quantum that just failed.
    pub newly_skipped: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ExecutionState {
    status: Vec<QuantumStatus>,
    /// Dependencies that have not succeeded yet.
    remaining: Vec<usize>,
    dependents: Vec<Vec<usize>>,
    order: Vec<usize>,
    failures: Vec<Option<QuantumFailure>>,
}

impl ExecutionState {
    pub fn new(plan: &ExecutionPlan) -> Self {
        let n = plan.len();
        Self {
            status: vec![QuantumStatus::Pending; n],
            remaining: (0..n).map(|i| plan.dependencies(i).len()).collect(),
            dependents: (0..n).map(|i| plan.dependents(i).to_vec()).collect(),
            order: plan.order().to_vec(),
            failures: vec![None; n],
        }
    }

    /// Mark every quantum without dependencies `Ready` and return them in
    /// plan order.
    pub fn seed(&mut self) -> Vec<usize> {
        let mut ready = Vec::new();
        for &i in &self.order {
            if self.status[i] == QuantumStatus::Pending && self.remaining[i] == 0 {
                self.status[i] = QuantumStatus::Ready;
                ready.push(i);
            }
        }
        debug!(ready = ready.len(), "seeded initial ready quanta");
        ready
    }

    /// `Ready -> Running`. Returns `false` (and changes nothing) for any
    /// other current status.
    pub fn mark_running(&mut self, index: usize) -> bool {
        if self.status[index] != QuantumStatus::Ready {
            warn!(index, status = %self.status[index], "ignoring start of quantum that is not ready");
            return false;
        }
        self.status[index] = QuantumStatus::Running;
        true
    }

    /// Record the outcome of a running quantum.
    ///
    /// On success, dependents whose remaining count drops to zero become
    /// `Ready`. On failure, every transitive dependent still `Pending`
    /// becomes `Skipped`, unless the quantum was cancelled.
    pub fn complete(&mut self, index: usize, outcome: RunOutcome) -> CoreStep {
        if self.status[index] != QuantumStatus::Running {
            warn!(index, status = %self.status[index], "ignoring completion of quantum that is not running");
            return CoreStep::default();
        }

        match outcome {
            Ok(()) => {
                self.status[index] = QuantumStatus::Succeeded;
                let mut newly_ready = Vec::new();
                for &dependent in &self.dependents[index] {
                    self.remaining[dependent] -= 1;
                    if self.remaining[dependent] == 0 && self.status[dependent] == QuantumStatus::Pending {
                        self.status[dependent] = QuantumStatus::Ready;
                        newly_ready.push(dependent);
                    }
                }
                CoreStep {
                    newly_ready,
                    newly_skipped: Vec::new(),
                }
            }
            Err(failure) => {
                self.status[index] = QuantumStatus::Failed;
                // A cancelled quantum did not fail on its own; its dependents
                // stay `Pending` and are reported as not executed.
                let newly_skipped = if failure == QuantumFailure::Cancelled {
                    Vec::new()
                } else {
                    self.skip_dependents(index)
                };
                self.failures[index] = Some(failure);
                CoreStep {
                    newly_ready: Vec::new(),
                    newly_skipped,
                }
            }
        }
    }

    fn skip_dependents(&mut self, failed: usize) -> Vec<usize> {
        let mut stack = self.dependents[failed].clone();
        let mut skipped = Vec::new();

        while let Some(i) = stack.pop() {
            if self.status[i] == QuantumStatus::Pending {
                self.status[i] = QuantumStatus::Skipped;
                skipped.push(i);
                stack.extend(self.dependents[i].iter().copied());
            }
        }

        skipped
    }

    pub fn status(&self, index: usize) -> QuantumStatus {
        self.status[index]
    }

    pub fn failure(&self, index: usize) -> Option<&QuantumFailure> {
        self.failures[index].as_ref()
    }

    pub fn count(&self, status: QuantumStatus) -> usize {
        self.status.iter().filter(|s| **s == status).count()
    }

    /// No quantum is waiting, queued or running.
    pub fn is_drained(&self) -> bool {
        self.status.iter().all(|s| s.is_terminal())
    }

    pub fn into_parts(self) -> (Vec<QuantumStatus>, Vec<Option<QuantumFailure>>) {
        (self.status, self.failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::plan::prepare;
    use crate::graph::{DataId, FixupChain, Quantum, QuantumGraph, QuantumPayload};

    /// Builds a plan whose indices follow the order of `ids`.
    fn plan_of(ids: &[&str], edges: &[(&str, &str)]) -> ExecutionPlan {
        let mut graph = QuantumGraph::new();
        for id in ids {
            graph
                .add_quantum(Quantum::new(
                    *id,
                    QuantumPayload {
                        task: "pkg.Task".into(),
                        label: "Task".into(),
                        data_id: DataId::new(),
                        command: None,
                    },
                ))
                .unwrap();
        }
        for (from, to) in edges {
            graph.add_dependency(from, to).unwrap();
        }
        prepare(graph, &FixupChain::new()).unwrap()
    }

    #[test]
    fn success_unlocks_all_siblings() {
        // a <- b, a <- c
        let plan = plan_of(&["a", "b", "c"], &[("b", "a"), ("c", "a")]);
        let mut state = ExecutionState::new(&plan);

        assert_eq!(state.seed(), vec![0]);
        assert!(state.mark_running(0));
        let step = state.complete(0, Ok(()));
        let mut ready = step.newly_ready.clone();
        ready.sort();
        assert_eq!(ready, vec![1, 2]);
        assert_eq!(state.status(1), QuantumStatus::Ready);
        assert_eq!(state.status(2), QuantumStatus::Ready);
        assert!(!state.is_drained());

        for i in [1, 2] {
            assert!(state.mark_running(i));
            assert_eq!(state.complete(i, Ok(())), CoreStep::default());
        }
        assert!(state.is_drained());
        assert_eq!(state.count(QuantumStatus::Succeeded), 3);
    }

    #[test]
    fn failure_skips_transitive_dependents_only() {
        // a <- b <- d, c independent, c <- e, d also needs c
        let plan = plan_of(
            &["a", "b", "c", "d", "e"],
            &[("b", "a"), ("d", "b"), ("d", "c"), ("e", "c")],
        );
        let mut state = ExecutionState::new(&plan);

        let mut seeded = state.seed();
        seeded.sort();
        assert_eq!(seeded, vec![0, 2]);

        state.mark_running(0);
        state.mark_running(2);

        let step = state.complete(0, Err(QuantumFailure::Task("boom".into())));
        let mut skipped = step.newly_skipped.clone();
        skipped.sort();
        assert_eq!(skipped, vec![1, 3]);
        assert_eq!(state.failure(0), Some(&QuantumFailure::Task("boom".into())));

        // c succeeding must not resurrect d.
        let step = state.complete(2, Ok(()));
        assert_eq!(step.newly_ready, vec![4]);
        assert_eq!(state.status(3), QuantumStatus::Skipped);

        state.mark_running(4);
        state.complete(4, Ok(()));
        assert!(state.is_drained());
        assert_eq!(state.count(QuantumStatus::Failed), 1);
        assert_eq!(state.count(QuantumStatus::Skipped), 2);
        assert_eq!(state.count(QuantumStatus::Succeeded), 2);
    }

    #[test]
    fn cancelled_quantum_leaves_dependents_pending() {
        // a <- b <- c
        let plan = plan_of(&["a", "b", "c"], &[("b", "a"), ("c", "b")]);
        let mut state = ExecutionState::new(&plan);

        state.seed();
        state.mark_running(0);
        let step = state.complete(0, Err(QuantumFailure::Cancelled));

        assert_eq!(step, CoreStep::default());
        assert_eq!(state.status(0), QuantumStatus::Failed);
        assert_eq!(state.failure(0), Some(&QuantumFailure::Cancelled));
        assert_eq!(state.status(1), QuantumStatus::Pending);
        assert_eq!(state.status(2), QuantumStatus::Pending);
        assert_eq!(state.count(QuantumStatus::Skipped), 0);
        assert!(!state.is_drained());
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        let plan = plan_of(&["a", "b"], &[("b", "a")]);
        let mut state = ExecutionState::new(&plan);
        state.seed();

        // b is still pending; neither start nor completion may move it.
        assert!(!state.mark_running(1));
        assert_eq!(state.complete(1, Ok(())), CoreStep::default());
        assert_eq!(state.status(1), QuantumStatus::Pending);

        // a completing before it started is ignored as well.
        assert_eq!(state.complete(0, Ok(())), CoreStep::default());
        assert_eq!(state.status(0), QuantumStatus::Ready);
    }
}
