use std::path::Path;

use perf_model::error::{PerfModelError, ensure_no_diagnostics};
use perf_model::pipeline::predict_file;

use super::{load_pipeline, print_violations};
use crate::PipelineArgs;

pub fn run(
    input: &Path,
    coeffs: &Path,
    out: &Path,
    rmsre: Option<&Path>,
    strict: bool,
    args: &PipelineArgs,
) -> Result<(), PerfModelError> {
    let config = load_pipeline(args)?;
    let summary = predict_file(input, coeffs, out, rmsre, &config)?;

    print_violations(&summary.diagnostics);
    for (key, value) in &summary.group_rmsre {
        println!("  {key}: RMSRE {value:.4}");
    }
    println!(
        "Estimated {} of {} record(s)",
        summary.estimated, summary.records
    );
    for file in &summary.files.files {
        println!("  {} -> {} ({} bytes)", file.kind, file.path.display(), file.bytes);
    }

    if strict {
        ensure_no_diagnostics(&summary.diagnostics)?;
    }
    Ok(())
}
