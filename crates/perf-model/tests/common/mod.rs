//! Shared helpers for pipeline integration tests.

#![allow(dead_code)]

use std::fmt::Write;

/// Builder for synthetic profiler reports.
pub struct ProfilerCsv {
    columns: Vec<&'static str>,
    text: String,
}

impl ProfilerCsv {
    pub fn new(columns: &[&'static str]) -> Self {
        Self {
            columns: columns.to_vec(),
            text: format!("{}\n", columns.join(",")),
        }
    }

    /// Interleaved report: op code, three memories, datatype, shape, cores, duration.
    pub fn interleaved() -> Self {
        Self::new(&[
            "OP CODE",
            "INPUT_0_MEMORY",
            "INPUT_1_MEMORY",
            "OUTPUT_0_MEMORY",
            "INPUT_0_DATATYPE",
            "INPUT_0_X",
            "INPUT_0_Y",
            "CORE COUNT",
            "DEVICE KERNEL DURATION [ns]",
        ])
    }

    pub fn row(&mut self, values: &[String]) -> &mut Self {
        assert_eq!(values.len(), self.columns.len(), "row width");
        let _ = writeln!(self.text, "{}", values.join(","));
        self
    }

    pub fn build(&self) -> String {
        self.text.clone()
    }
}

pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "{actual} differs from {expected} by more than {tol}"
    );
}
