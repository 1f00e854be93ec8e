// src/exec/mod.rs

//! Quantum execution layer.
//!
//! - [`runner`] defines the `TaskRunner` seam the executor calls for every
//!   dispatched quantum.
//! - [`command`] provides `CommandRunner`, the production runner that runs a
//!   quantum's shell command with `tokio::process::Command`.
//! - [`pool`] owns the fixed-size worker pool that pulls ready quanta off a
//!   shared queue and reports back to the orchestration loop.

pub mod command;
pub mod pool;
pub mod runner;

pub use command::CommandRunner;
pub use pool::spawn_workers;
pub use runner::{RunFuture, RunOutcome, TaskRunner};
