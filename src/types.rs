// src/types.rs

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::errors::QexecError;

/// Canonical quantum identifier type used throughout the crate.
pub type QuantumId = String;

/// Execution status of a single quantum.
///
/// Only the executor's orchestration loop transitions these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantumStatus {
    /// Waiting on at least one dependency.
    Pending,
    /// All dependencies succeeded; queued for a worker.
    Ready,
    /// Handed to the task runner.
    Running,
    Succeeded,
    Failed,
    /// An upstream quantum failed; this one was never dispatched.
    Skipped,
}

impl QuantumStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QuantumStatus::Succeeded | QuantumStatus::Failed | QuantumStatus::Skipped
        )
    }
}

impl fmt::Display for QuantumStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuantumStatus::Pending => "pending",
            QuantumStatus::Ready => "ready",
            QuantumStatus::Running => "running",
            QuantumStatus::Succeeded => "succeeded",
            QuantumStatus::Failed => "failed",
            QuantumStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

static TASK_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("task name pattern is valid")
});

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("label pattern is valid"));

/// Task selection as given on the command line: `TASK` or `TASK:LABEL`.
///
/// `TASK` is a fully qualified (dotted) task name. When no label is given the
/// task's base name (the part after the last `.`) is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub task: String,
    pub label: String,
}

impl TaskSpec {
    pub fn matches(&self, task: &str, label: &str) -> bool {
        self.task == task && self.label == label
    }
}

/// Base name of a dotted task name, used as its default label.
pub fn default_label(task: &str) -> &str {
    task.rsplit('.').next().unwrap_or(task)
}

impl FromStr for TaskSpec {
    type Err = QexecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (task, label) = match s.split_once(':') {
            Some((task, label)) => (task, Some(label)),
            None => (s, None),
        };

        if !TASK_NAME_RE.is_match(task) {
            return Err(QexecError::InvalidTaskSpec(format!(
                "'{s}': task must be a dotted identifier (expected TASK[:LABEL])"
            )));
        }

        let label = match label {
            Some(label) if LABEL_RE.is_match(label) => label.to_string(),
            Some(label) => {
                return Err(QexecError::InvalidTaskSpec(format!(
                    "'{s}': invalid label '{label}'"
                )));
            }
            None => default_label(task).to_string(),
        };

        Ok(TaskSpec {
            task: task.to_string(),
            label,
        })
    }
}

impl fmt::Display for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.task, self.label)
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}

/// [`parse_duration`] for per-quantum time limits, which must be non-zero.
pub fn parse_timeout(s: &str) -> Result<Duration, String> {
    let limit = parse_duration(s)?;
    if limit.is_zero() {
        return Err(format!("timeout '{}' must be greater than zero", s.trim()));
    }
    Ok(limit)
}
