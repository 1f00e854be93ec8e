// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::default_graph_path;
use crate::types::{parse_timeout, TaskSpec};

/// Command-line arguments for `qexec`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "qexec",
    version,
    about = "Execute a quantum graph with dependency ordering and fail-fast skipping.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the graph definition file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_graph_path())]
    pub graph: PathBuf,

    /// Number of quanta to run concurrently. Overrides `[executor].processes`.
    #[arg(short = 'j', long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub processes: Option<u32>,

    /// Per-quantum time limit, e.g. `30s` or `5m`. Overrides `[executor].timeout`.
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Stop the whole run after the first failed quantum.
    #[arg(long)]
    pub fail_fast: bool,

    /// Only run quanta of these tasks (plus what they depend on).
    ///
    /// Format is `TASK` or `TASK:LABEL`; repeat the flag or separate entries
    /// with commas.
    #[arg(short = 't', long = "task", value_name = "TASK[:LABEL]", value_delimiter = ',')]
    pub tasks: Vec<TaskSpec>,

    /// Write the prepared graph in GraphViz DOT format to this file.
    #[arg(long, value_name = "PATH")]
    pub dot: Option<String>,

    /// Prepare and validate the graph, print the execution order, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `QEXEC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}


/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["qexec"]).unwrap();
        assert_eq!(args.graph, PathBuf::from("QuantumGraph.toml"));
        assert!(args.processes.is_none());
        assert!(args.tasks.is_empty());
        assert!(!args.fail_fast);
        assert!(!args.dry_run);
    }

    #[test]
    fn task_flag_is_repeatable_and_comma_separated() {
        let args = CliArgs::try_parse_from([
            "qexec",
            "-t",
            "pipe.IsrTask,pipe.CalibrateTask:calib",
            "--task",
            "pipe.AssocTask",
        ])
        .unwrap();

        let rendered: Vec<String> = args.tasks.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "pipe.IsrTask:IsrTask",
                "pipe.CalibrateTask:calib",
                "pipe.AssocTask:AssocTask"
            ]
        );
    }

    #[test]
    fn invalid_task_spec_is_rejected() {
        assert!(CliArgs::try_parse_from(["qexec", "--task", "not a task"]).is_err());
    }

    #[test]
    fn zero_processes_is_rejected() {
        assert!(CliArgs::try_parse_from(["qexec", "-j", "0"]).is_err());
    }

    #[test]
    fn zero_or_oversized_timeout_is_rejected() {
        assert!(CliArgs::try_parse_from(["qexec", "--timeout", "0s"]).is_err());
        assert!(CliArgs::try_parse_from(["qexec", "--timeout", "9999999999999999h"]).is_err());
    }

    #[test]
    fn timeout_is_parsed() {
        let args = CliArgs::try_parse_from(["qexec", "--timeout", "2m", "-j", "4"]).unwrap();
        assert_eq!(args.timeout, Some(Duration::from_secs(120)));
        assert_eq!(args.processes, Some(4));
    }
}
