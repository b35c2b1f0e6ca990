use std::path::Path;

use perf_model::error::PerfModelError;
use perf_model::pipeline::plot_3d;

use super::load_pipeline;
use crate::PipelineArgs;

pub fn run(input: &Path, out: &Path, args: &PipelineArgs) -> Result<(), PerfModelError> {
    let config = load_pipeline(args)?;
    let files = plot_3d(input, out, &config)?;
    for file in &files.files {
        println!("Wrote {} ({} bytes)", file.path.display(), file.bytes);
    }
    Ok(())
}
