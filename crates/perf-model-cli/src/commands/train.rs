use std::path::Path;

use perf_model::error::{PerfModelError, ensure_no_diagnostics};
use perf_model::pipeline::train;

use super::{load_pipeline, print_violations};
use crate::PipelineArgs;

pub fn run(
    input: &Path,
    coeffs: &Path,
    strict: bool,
    args: &PipelineArgs,
) -> Result<(), PerfModelError> {
    let config = load_pipeline(args)?;
    let summary = train(input, coeffs, &config)?;

    print_violations(&summary.diagnostics);
    println!(
        "Pipeline {}: {} record(s), {} dropped, {} host row(s) skipped, {} rejected",
        config.name, summary.records, summary.dropped, summary.skipped_host_rows, summary.rejected
    );
    println!(
        "Fitted {} group(s), {} excluded -> {}",
        summary.groups_fitted,
        summary.diagnostics.len(),
        coeffs.display()
    );

    if strict {
        ensure_no_diagnostics(&summary.diagnostics)?;
    }
    Ok(())
}
