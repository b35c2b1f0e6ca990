//! End-to-end pipeline stages over files.
//!
//! Each stage reads its inputs, runs the library components in order, and
//! writes every output atomically. CSV outputs are always written before
//! any plot.

use std::collections::BTreeMap;
use std::path::Path;

use log::info;

use crate::aggregate::{aggregate, read_rmsre_csv, write_aggregated_csv};
use crate::error::{PerfModelError, Result, Violation};
use crate::grouping::ConfigKey;
use crate::plot::{rmsre_svg, scatter3d_html};
use crate::predict::{group_rmsre, predict, rmsre_by_bucket, write_estimates_csv, write_rmsre_csv};
use crate::regress::{CoefficientTable, fit};
use crate::report::{ArtifactKind, GeneratedFiles, write_atomic, write_string_atomic};
use crate::schema::{PipelineConfig, read_measurements};
use crate::solver::solver_for;

/// Outcome of [`train`].
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub records: usize,
    pub dropped: usize,
    pub skipped_host_rows: usize,
    pub rejected: usize,
    pub groups_fitted: usize,
    pub diagnostics: Vec<Violation>,
    pub files: GeneratedFiles,
}

/// Outcome of [`predict_file`].
#[derive(Debug, Clone)]
pub struct PredictSummary {
    pub records: usize,
    pub estimated: usize,
    pub diagnostics: Vec<Violation>,
    pub group_rmsre: BTreeMap<ConfigKey, f64>,
    pub files: GeneratedFiles,
}

/// Outcome of [`aggregate_file`].
#[derive(Debug, Clone)]
pub struct AggregateSummary {
    pub measurements: usize,
    pub buckets: usize,
    pub files: GeneratedFiles,
}

/// Fit coefficients on `input` and write them to `coeffs`.
pub fn train(input: &Path, coeffs: &Path, config: &PipelineConfig) -> Result<TrainSummary> {
    let dataset = read_measurements(input, config)?;
    if dataset.is_empty() {
        return Err(PerfModelError::invalid(format!(
            "{}: no usable measurement rows",
            input.display()
        )));
    }
    let solver = solver_for(config.solver);
    let outcome = fit(&dataset, config, solver.as_ref());

    let mut files = GeneratedFiles::default();
    outcome.table.save(coeffs)?;
    files.record(coeffs, ArtifactKind::Coefficients)?;
    info!(
        "{}: wrote {} coefficient row(s) to {}",
        config.name,
        outcome.table.len(),
        coeffs.display()
    );

    Ok(TrainSummary {
        records: dataset.len(),
        dropped: dataset.dropped,
        skipped_host_rows: dataset.skipped_host_rows,
        rejected: outcome.rejected,
        groups_fitted: outcome.table.len(),
        diagnostics: outcome.diagnostics,
        files,
    })
}

/// Estimate every record of `input` with the coefficients in `coeffs`.
///
/// Writes the estimates to `out` and, when `rmsre_out` is given, the
/// per-bucket RMSRE table.
pub fn predict_file(
    input: &Path,
    coeffs: &Path,
    out: &Path,
    rmsre_out: Option<&Path>,
    config: &PipelineConfig,
) -> Result<PredictSummary> {
    let table = CoefficientTable::load(coeffs, config)?;
    let dataset = read_measurements(input, config)?;
    let prediction = predict(&dataset, &table, config)?;

    let mut files = GeneratedFiles::default();
    write_atomic(out, |w| write_estimates_csv(&prediction.estimates, w))?;
    files.record(out, ArtifactKind::Estimates)?;

    if let Some(path) = rmsre_out {
        let buckets = rmsre_by_bucket(&prediction.estimates);
        write_atomic(path, |w| write_rmsre_csv(&buckets, w))?;
        files.record(path, ArtifactKind::Rmsre)?;
    }

    let group_rmsre = group_rmsre(&prediction.estimates, config);
    for (key, rmsre) in &group_rmsre {
        info!("{key}: RMSRE {rmsre:.4}");
    }

    Ok(PredictSummary {
        records: prediction.estimates.len(),
        estimated: prediction
            .estimates
            .iter()
            .filter(|e| e.estimated_ns.is_some())
            .count(),
        diagnostics: prediction.diagnostics,
        group_rmsre,
        files,
    })
}

/// Aggregate an RMSRE file into `out`, optionally charting it into `plot_dir`.
pub fn aggregate_file(rmsre: &Path, out: &Path, plot_dir: Option<&Path>) -> Result<AggregateSummary> {
    let measurements = read_rmsre_csv(rmsre)?;
    let aggregated = aggregate(&measurements);

    let mut files = GeneratedFiles::default();
    write_atomic(out, |w| write_aggregated_csv(&aggregated, w))?;
    files.record(out, ArtifactKind::Aggregated)?;

    if let Some(dir) = plot_dir {
        for chart in rmsre_svg(&aggregated) {
            let path = dir.join(chart.file_name());
            write_string_atomic(&path, &chart.svg)?;
            files.record(&path, ArtifactKind::RmsrePlot)?;
        }
    }

    Ok(AggregateSummary {
        measurements: measurements.len(),
        buckets: aggregated.len(),
        files,
    })
}

/// Render the 3-D scatter grid of `input` into `out`.
pub fn plot_3d(input: &Path, out: &Path, config: &PipelineConfig) -> Result<GeneratedFiles> {
    let dataset = read_measurements(input, config)?;
    let html = scatter3d_html(&dataset, config)?;
    let mut files = GeneratedFiles::default();
    write_string_atomic(out, &html)?;
    files.record(out, ArtifactKind::ScatterPlot)?;
    Ok(files)
}
