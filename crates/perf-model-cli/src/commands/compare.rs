use std::path::Path;

use perf_model::error::PerfModelError;
use perf_model::golden::{compare_files, default_golden_path, render_report};

pub fn run(
    new: &Path,
    golden: Option<&Path>,
    threshold: f64,
    verbose: bool,
) -> Result<(), PerfModelError> {
    let golden = match golden {
        Some(path) => path.to_path_buf(),
        None => default_golden_path(new)?,
    };
    let comparison = compare_files(new, &golden, threshold)?;

    print!("{}", render_report(&comparison, verbose));

    match comparison.failure_count() {
        0 => Ok(()),
        failures => Err(PerfModelError::RegressionFailed { failures }),
    }
}
