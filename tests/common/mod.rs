#![allow(dead_code, unused_imports)]

pub use qexec_test_utils::builders::{data_id, quantum, quantum_with, GraphBuilder};
pub use qexec_test_utils::runners::{RecordingRunner, RunRecord};
pub use qexec_test_utils::{init_tracing, with_timeout};

use qexec::engine::ExecutorOptions;
use std::time::Duration;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn options(processes: usize) -> ExecutorOptions {
    ExecutorOptions {
        processes,
        ..ExecutorOptions::default()
    }
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
