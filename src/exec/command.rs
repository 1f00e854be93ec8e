// src/exec/command.rs

//! Shell-command task runner.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::QuantumFailure;
use crate::exec::runner::{RunFuture, RunOutcome, TaskRunner};
use crate::graph::Quantum;

/// Runs each quantum's `command` through the platform shell.
///
/// The quantum is described to the command through environment variables:
/// `QEXEC_QUANTUM_ID`, `QEXEC_TASK`, `QEXEC_LABEL` and one
/// `QEXEC_DATAID_<DIMENSION>` per data-id dimension. Quanta without a
/// command succeed immediately.
///
/// Cancellation kills the child process; no exit status is reported for it.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskRunner for CommandRunner {
    fn run(&self, quantum: Arc<Quantum>, cancel: CancellationToken) -> RunFuture<'_> {
        Box::pin(run_quantum_command(quantum, cancel))
    }
}

async fn run_quantum_command(quantum: Arc<Quantum>, cancel: CancellationToken) -> RunOutcome {
    let Some(command) = quantum.payload.command.as_deref() else {
        debug!(quantum = %quantum.id, "quantum has no command; nothing to run");
        return Ok(());
    };

    match run_command_inner(&quantum, command, cancel).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(
                quantum = %quantum.id,
                error = %err,
                "quantum command execution error"
            );
            Err(QuantumFailure::Task(format!("{err:#}")))
        }
    }
}

async fn run_command_inner(
    quantum: &Quantum,
    command: &str,
    cancel: CancellationToken,
) -> Result<RunOutcome> {
    info!(
        quantum = %quantum.id,
        task = %quantum.payload.task,
        cmd = %command,
        "starting quantum process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    cmd.env("QEXEC_QUANTUM_ID", &quantum.id)
        .env("QEXEC_TASK", &quantum.payload.task)
        .env("QEXEC_LABEL", &quantum.payload.label);
    for (dimension, value) in &quantum.payload.data_id {
        cmd.env(
            format!("QEXEC_DATAID_{}", dimension.to_uppercase()),
            value.to_string(),
        );
    }

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for quantum '{}'", quantum.id))?;

    // Always consume output so pipe buffers don't fill; log at debug.
    if let Some(stdout) = child.stdout.take() {
        forward_lines(quantum.id.clone(), "stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(quantum.id.clone(), "stderr", stderr);
    }

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res.with_context(|| {
                format!("waiting for process of quantum '{}'", quantum.id)
            })?;

            let code = status.code().unwrap_or(-1);
            info!(
                quantum = %quantum.id,
                exit_code = code,
                success = status.success(),
                "quantum process exited"
            );

            if status.success() {
                Ok(Ok(()))
            } else {
                Ok(Err(QuantumFailure::Task(format!("command exited with status {code}"))))
            }
        }

        _ = cancel.cancelled() => {
            info!(
                quantum = %quantum.id,
                "cancellation requested for running quantum; killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(
                    quantum = %quantum.id,
                    error = %e,
                    "failed to kill child process on cancellation"
                );
            }
            Ok(Err(QuantumFailure::Cancelled))
        }
    }
}

fn forward_lines<R>(quantum: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(quantum = %quantum, stream, "{}", line);
        }
    });
}
