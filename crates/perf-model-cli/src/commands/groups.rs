use std::path::Path;

use perf_model::error::PerfModelError;
use perf_model::grouping::partition;
use perf_model::schema::read_measurements;

use super::load_pipeline;
use crate::PipelineArgs;

pub fn run(input: &Path, args: &PipelineArgs) -> Result<(), PerfModelError> {
    let config = load_pipeline(args)?;
    let dataset = read_measurements(input, &config)?;
    let grouping = partition(&dataset, &config);

    let key_header: Vec<&str> = config.key.iter().map(|k| k.column()).collect();
    println!("{}  rows  fittable", key_header.join("/"));
    for (key, rows) in &grouping.groups {
        let status = if grouping.is_fittable(key) { "yes" } else { "no" };
        println!("{key}  {}  {status}", rows.len());
    }
    println!(
        "\n{} group(s), {} fittable (need {} row(s) each), {} record(s)",
        grouping.groups.len(),
        grouping.fittable().count(),
        grouping.min_fit_rows,
        dataset.len()
    );
    Ok(())
}
