// src/exec/runner.rs

//! Pluggable task runner abstraction.
//!
//! The executor hands every dispatched quantum to a `TaskRunner` and only
//! looks at the outcome. Production code uses
//! [`CommandRunner`](super::CommandRunner); tests provide their own runners
//! that record invocation order, fail on demand, or sleep.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::errors::QuantumFailure;
use crate::graph::Quantum;

/// Outcome of running a single quantum.
pub type RunOutcome = std::result::Result<(), QuantumFailure>;

/// Boxed future returned by [`TaskRunner::run`].
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = RunOutcome> + Send + 'a>>;

/// Executes the unit of work behind one quantum.
///
/// The call may take arbitrarily long. `cancel` fires when the run is being
/// stopped (external stop signal, fail-fast, or the quantum's timeout);
/// runners are expected to wind down cooperatively and report
/// [`QuantumFailure::Cancelled`] when they do.
pub trait TaskRunner: Send + Sync {
    fn run(&self, quantum: Arc<Quantum>, cancel: CancellationToken) -> RunFuture<'_>;
}

impl<R: TaskRunner + ?Sized> TaskRunner for Arc<R> {
    fn run(&self, quantum: Arc<Quantum>, cancel: CancellationToken) -> RunFuture<'_> {
        (**self).run(quantum, cancel)
    }
}
