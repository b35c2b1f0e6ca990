use std::path::Path;

use perf_model::error::PerfModelError;
use perf_model::pipeline::aggregate_file;

pub fn run(rmsre: &Path, out: &Path, plot_dir: Option<&Path>) -> Result<(), PerfModelError> {
    let summary = aggregate_file(rmsre, out, plot_dir)?;

    println!(
        "Aggregated {} measurement(s) into {} bucket(s)",
        summary.measurements, summary.buckets
    );
    for file in &summary.files.files {
        println!("  {} -> {}", file.kind, file.path.display());
    }
    Ok(())
}
