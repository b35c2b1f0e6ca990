//! Duration estimates and relative error for measured records.
//!
//! A record whose key has no coefficients, or whose features cannot be
//! derived, is passed through with a null estimate and a reason; it never
//! aborts the batch.

use std::collections::BTreeMap;
use std::io::Write;

use log::{info, warn};

use crate::error::{PerfModelError, Result, Violation};
use crate::features::{derive_features, num_tiles, tiles_per_core};
use crate::grouping::ConfigKey;
use crate::regress::CoefficientTable;
use crate::schema::{DataType, Dataset, MeasurementRecord, MemoryLayout, PipelineConfig, columns};

/// Estimate for one input record.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub record: MeasurementRecord,
    pub num_tiles: Option<u64>,
    pub tiles_per_core: Option<u64>,
    pub estimated_ns: Option<f64>,
    pub relative_diff: Option<f64>,
    pub reason: Option<String>,
}

/// Estimates for a whole dataset plus per-key diagnostics.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// One estimate per input record, in input order.
    pub estimates: Vec<Estimate>,
    pub diagnostics: Vec<Violation>,
}

/// `|estimated − measured| / measured`, undefined for a zero measurement.
pub fn relative_diff(estimated: f64, measured: f64) -> Option<f64> {
    (measured != 0.0).then(|| (estimated - measured).abs() / measured.abs())
}

/// Root mean square of relative errors; `None` for an empty slice.
#[allow(clippy::cast_precision_loss)]
pub fn rmsre(relative_errors: &[f64]) -> Option<f64> {
    if relative_errors.is_empty() {
        return None;
    }
    let mean_sq = relative_errors.iter().map(|e| e * e).sum::<f64>() / relative_errors.len() as f64;
    Some(mean_sq.sqrt())
}

/// Estimate every record of `dataset` with `table`.
///
/// # Errors
///
/// Returns [`PerfModelError::InvalidInput`] if `table` was fitted for a
/// different key or feature declaration than `config`.
pub fn predict(
    dataset: &Dataset,
    table: &CoefficientTable,
    config: &PipelineConfig,
) -> Result<Prediction> {
    if table.key_fields != config.key || table.features != config.features {
        return Err(PerfModelError::invalid(format!(
            "coefficient table does not match pipeline '{}'",
            config.name
        )));
    }

    let mut unknown: BTreeMap<ConfigKey, usize> = BTreeMap::new();
    let estimates: Vec<Estimate> = dataset
        .records
        .iter()
        .map(|record| {
            let key = ConfigKey::of(record, &config.key);
            let mut estimate = Estimate {
                record: record.clone(),
                num_tiles: num_tiles(record, config.tiles_formula).ok(),
                tiles_per_core: tiles_per_core(record, config.tiles_formula).ok(),
                estimated_ns: None,
                relative_diff: None,
                reason: None,
            };
            let Some(coefs) = table.get(&key) else {
                *unknown.entry(key.clone()).or_default() += 1;
                estimate.reason = Some(format!("unknown key {key}"));
                return estimate;
            };
            match derive_features(record, &config.features, config.tiles_formula) {
                Ok(features) => {
                    let estimated = coefs.estimate(&features);
                    estimate.estimated_ns = Some(estimated);
                    estimate.relative_diff = relative_diff(estimated, record.duration_ns);
                }
                Err(reason) => estimate.reason = Some(format!("rejected: {reason}")),
            }
            estimate
        })
        .collect();

    let diagnostics: Vec<Violation> = unknown
        .iter()
        .map(|(key, rows)| Violation::unknown_key(&key.to_string(), *rows))
        .collect();
    for d in &diagnostics {
        warn!("{}", d.message);
    }
    let estimated = estimates.iter().filter(|e| e.estimated_ns.is_some()).count();
    info!("estimated {estimated} of {} record(s)", estimates.len());

    Ok(Prediction {
        estimates,
        diagnostics,
    })
}

/// RMSRE per configuration key over all estimated records.
pub fn group_rmsre(estimates: &[Estimate], config: &PipelineConfig) -> BTreeMap<ConfigKey, f64> {
    let mut errors: BTreeMap<ConfigKey, Vec<f64>> = BTreeMap::new();
    for e in estimates {
        if let Some(diff) = e.relative_diff {
            errors
                .entry(ConfigKey::of(&e.record, &config.key))
                .or_default()
                .push(diff);
        }
    }
    errors
        .into_iter()
        .filter_map(|(key, errs)| rmsre(&errs).map(|r| (key, r)))
        .collect()
}

/// One RMSRE measurement for a (memory, datatype, `num_tiles`) bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct RmsreRecord {
    pub input_memory: MemoryLayout,
    pub output_memory: MemoryLayout,
    pub datatype: DataType,
    pub num_tiles: u64,
    pub rmsre: f64,
}

/// Column order of RMSRE files.
pub const RMSRE_COLUMNS: [&str; 5] = [
    "Input Memory",
    "Output Memory",
    "Input Datatype",
    "Num Tiles",
    "RMSRE",
];

/// RMSRE of the estimated records, bucketed by memory, datatype and `num_tiles`.
pub fn rmsre_by_bucket(estimates: &[Estimate]) -> Vec<RmsreRecord> {
    let mut buckets: BTreeMap<(MemoryLayout, MemoryLayout, DataType, u64), Vec<f64>> =
        BTreeMap::new();
    for e in estimates {
        if let (Some(diff), Some(tiles)) = (e.relative_diff, e.num_tiles) {
            let r = &e.record;
            buckets
                .entry((r.input_0_memory, r.output_memory, r.input_0_datatype, tiles))
                .or_default()
                .push(diff);
        }
    }
    buckets
        .into_iter()
        .filter_map(|((input_memory, output_memory, datatype, num_tiles), errs)| {
            rmsre(&errs).map(|rmsre| RmsreRecord {
                input_memory,
                output_memory,
                datatype,
                num_tiles,
                rmsre,
            })
        })
        .collect()
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Column order of estimate files.
pub const ESTIMATE_COLUMNS: [&str; 13] = [
    columns::INPUT_0_MEMORY,
    columns::INPUT_1_MEMORY,
    columns::OUTPUT_0_MEMORY,
    columns::INPUT_0_DATATYPE,
    columns::INPUT_0_X,
    columns::INPUT_0_Y,
    columns::CORE_COUNT,
    "NUM TILES",
    columns::TILES_PER_CORE,
    columns::DURATION,
    "ESTIMATED DURATION [ns]",
    "RELATIVE DIFF",
    "REASON",
];

pub fn write_estimates_csv<W: Write>(estimates: &[Estimate], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(ESTIMATE_COLUMNS)?;
    for e in estimates {
        let r = &e.record;
        out.write_record([
            r.input_0_memory.to_string(),
            r.input_1_memory.to_string(),
            r.output_memory.to_string(),
            r.input_0_datatype.to_string(),
            r.input_0_x.to_string(),
            r.input_0_y.to_string(),
            r.core_count.to_string(),
            opt(e.num_tiles),
            opt(e.tiles_per_core),
            r.duration_ns.to_string(),
            opt(e.estimated_ns),
            opt(e.relative_diff),
            e.reason.clone().unwrap_or_default(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_rmsre_csv<W: Write>(records: &[RmsreRecord], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(RMSRE_COLUMNS)?;
    for r in records {
        out.write_record([
            r.input_memory.to_string(),
            r.output_memory.to_string(),
            r.datatype.to_string(),
            r.num_tiles.to_string(),
            r.rmsre.to_string(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::record;
    use crate::regress::{Coefficients, fit};
    use crate::schema::parse_config_str;
    use crate::solver::HouseholderQr;

    fn config() -> PipelineConfig {
        parse_config_str(
            "name: add\nkey: [INPUT_0_MEMORY, INPUT_1_MEMORY, INPUT_0_DATATYPE]\nfeatures: [num_tiles]\n",
        )
        .unwrap()
    }

    fn dataset() -> Dataset {
        let mut l1 = record(32, 64, 1, 150.0);
        l1.input_0_memory = MemoryLayout::L1Interleaved;
        l1.input_1_memory = MemoryLayout::L1Interleaved;
        Dataset {
            records: vec![
                record(32, 32, 1, 100.0),
                record(32, 64, 1, 250.0),
                l1,
            ],
            ..Dataset::default()
        }
    }

    fn table(config: &PipelineConfig) -> CoefficientTable {
        let key = ConfigKey::of(&record(32, 32, 1, 1.0), &config.key);
        CoefficientTable {
            key_fields: config.key.clone(),
            features: config.features.clone(),
            entries: [(
                key,
                Coefficients {
                    intercept: 0.0,
                    slopes: vec![100.0],
                },
            )]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn estimates_known_keys() {
        let config = config();
        let prediction = predict(&dataset(), &table(&config), &config).unwrap();
        let e = &prediction.estimates[1];
        assert_eq!(e.num_tiles, Some(2));
        assert_eq!(e.estimated_ns, Some(200.0));
        let diff = e.relative_diff.unwrap();
        assert!((diff - 0.2).abs() < 1e-12);
        assert_eq!(prediction.estimates[0].relative_diff, Some(0.0));
    }

    #[test]
    fn unknown_key_passes_through() {
        let config = config();
        let prediction = predict(&dataset(), &table(&config), &config).unwrap();
        let e = &prediction.estimates[2];
        assert_eq!(e.estimated_ns, None);
        assert_eq!(e.relative_diff, None);
        assert_eq!(
            e.reason.as_deref(),
            Some("unknown key L1_INTERLEAVED/L1_INTERLEAVED/BFLOAT16")
        );
        assert_eq!(prediction.diagnostics.len(), 1);
        assert_eq!(prediction.diagnostics[0].rule, "UNKNOWN-KEY");
    }

    #[test]
    fn rejected_record_passes_through() {
        let config = config();
        let mut ds = dataset();
        ds.records[0].core_count = 0;
        let prediction = predict(&ds, &table(&config), &config).unwrap();
        let e = &prediction.estimates[0];
        assert_eq!(e.estimated_ns, None);
        assert_eq!(e.reason.as_deref(), Some("rejected: core_count is 0"));
        assert_eq!(e.tiles_per_core, None);
    }

    #[test]
    fn mismatched_table_is_rejected() {
        let config = config();
        let mut other = config.clone();
        other.features.push(crate::features::FeatureKind::CoreCount);
        let err = predict(&dataset(), &table(&config), &other).unwrap_err();
        assert!(matches!(err, PerfModelError::InvalidInput(_)));
    }

    #[test]
    fn rmsre_of_known_values() {
        assert_eq!(rmsre(&[]), None);
        let r = rmsre(&[0.3, 0.4]).unwrap();
        assert!((r - (0.125f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn rmsre_buckets_by_tiles() {
        let config = config();
        let prediction = predict(&dataset(), &table(&config), &config).unwrap();
        let buckets = rmsre_by_bucket(&prediction.estimates);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].num_tiles, 1);
        assert!(buckets[0].rmsre.abs() < 1e-12);
        assert_eq!(buckets[1].num_tiles, 2);
        assert!((buckets[1].rmsre - 0.2).abs() < 1e-12);

        let per_key = group_rmsre(&prediction.estimates, &config);
        assert_eq!(per_key.len(), 1);
        let r = per_key.values().next().unwrap();
        assert!((r - (0.02f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn estimates_csv_has_null_fields() {
        let config = config();
        let prediction = predict(&dataset(), &table(&config), &config).unwrap();
        let mut buf = Vec::new();
        write_estimates_csv(&prediction.estimates, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("ESTIMATED DURATION [ns],RELATIVE DIFF,REASON"));
        assert!(lines[3].ends_with(",150,,,unknown key L1_INTERLEAVED/L1_INTERLEAVED/BFLOAT16"));
    }

    #[test]
    fn round_trip_residuals_have_zero_mean() {
        let config = config();
        let mut ds = dataset();
        ds.records.push(record(32, 96, 1, 290.0));
        ds.records.push(record(32, 128, 1, 430.0));
        let outcome = fit(&ds, &config, &HouseholderQr);
        let prediction = predict(&ds, &outcome.table, &config).unwrap();
        let residuals: Vec<f64> = prediction
            .estimates
            .iter()
            .filter_map(|e| e.estimated_ns.map(|est| e.record.duration_ns - est))
            .collect();
        assert_eq!(residuals.len(), 4);
        let mean = residuals.iter().sum::<f64>() / residuals.len() as f64;
        assert!(mean.abs() < 1e-9);
    }
}
