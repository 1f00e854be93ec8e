// src/engine/mod.rs

//! Orchestration engine for qexec.
//!
//! This module ties together:
//! - graph preparation (original traversal, fixup chain, re-validation)
//!   into an immutable [`ExecutionPlan`]
//! - the per-quantum state machine that decides which quanta are ready and
//!   which must be skipped
//! - the async loop that feeds the worker pool and consumes its
//!   completion events
//!
//! The pure state machine lives in [`core`]; the async/IO shell is
//! implemented in [`executor`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::exec::RunOutcome;
use crate::graph::Quantum;

pub mod core;
pub mod executor;
pub mod plan;

pub use self::core::{CoreStep, ExecutionState};
pub use executor::Executor;
pub use plan::ExecutionPlan;

/// Options controlling how a plan is executed.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    /// Maximum number of quanta running at the same time (>= 1).
    pub processes: usize,
    /// Per-quantum time limit; `None` means no limit.
    pub timeout: Option<Duration>,
    /// Stop dispatching and cancel in-flight quanta after the first failure.
    pub fail_fast: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            processes: 1,
            timeout: None,
            fail_fast: false,
        }
    }
}

/// A ready quantum handed to the worker pool.
#[derive(Debug, Clone)]
pub struct ScheduledQuantum {
    /// Position of the quantum in the plan.
    pub index: usize,
    pub quantum: Arc<Quantum>,
}

/// Events flowing from workers back into the orchestration loop.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A worker took the quantum off the ready queue and is about to run it.
    Started {
        index: usize,
        worker: usize,
        at: Instant,
    },
    /// The task runner returned for this quantum.
    Finished {
        index: usize,
        outcome: RunOutcome,
        at: Instant,
    },
    /// The run was cancelled before a worker could start this quantum.
    Declined { index: usize },
}
