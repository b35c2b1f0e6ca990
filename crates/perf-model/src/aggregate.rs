//! Aggregation of repeated RMSRE measurements.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::error::{PerfModelError, Result};
use crate::predict::{RMSRE_COLUMNS, RmsreRecord};
use crate::schema::{DataType, MemoryLayout};

/// Mean and spread of the RMSRE measurements of one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub input_memory: MemoryLayout,
    pub output_memory: MemoryLayout,
    pub datatype: DataType,
    pub num_tiles: u64,
    pub mean_rmsre: f64,
    /// Population standard deviation; `None` with fewer than two measurements.
    pub std_rmsre: Option<f64>,
    pub std_over_mean: Option<f64>,
    pub measurements: usize,
}

pub const AGGREGATED_COLUMNS: [&str; 7] = [
    "Input Memory",
    "Output Memory",
    "Input Datatype",
    "Num Tiles",
    "Mean RMSRE",
    "Std RMSRE",
    "Std/Mean",
];

#[derive(Deserialize)]
struct RmsreRow {
    #[serde(rename = "Input Memory")]
    input_memory: MemoryLayout,
    #[serde(rename = "Output Memory")]
    output_memory: MemoryLayout,
    #[serde(rename = "Input Datatype")]
    datatype: DataType,
    #[serde(rename = "Num Tiles")]
    num_tiles: u64,
    #[serde(rename = "RMSRE")]
    rmsre: f64,
}

pub fn read_rmsre_csv(path: &Path) -> Result<Vec<RmsreRecord>> {
    let file = std::fs::File::open(path)?;
    parse_rmsre_csv(file, &path.display().to_string())
}

/// Parse an RMSRE file; every column of [`RMSRE_COLUMNS`] must be present.
pub fn parse_rmsre_csv<R: Read>(reader: R, source_name: &str) -> Result<Vec<RmsreRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let missing: Vec<String> = RMSRE_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == **c))
        .map(|c| (*c).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PerfModelError::MissingColumns {
            source_name: source_name.to_string(),
            columns: missing,
        });
    }

    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<RmsreRow>().enumerate() {
        let row = row?;
        if !row.rmsre.is_finite() || row.rmsre < 0.0 {
            return Err(PerfModelError::invalid(format!(
                "{source_name}:{}: RMSRE must be a non-negative number, got {}",
                i + 2,
                row.rmsre
            )));
        }
        records.push(RmsreRecord {
            input_memory: row.input_memory,
            output_memory: row.output_memory,
            datatype: row.datatype,
            num_tiles: row.num_tiles,
            rmsre: row.rmsre,
        });
    }
    Ok(records)
}

/// Arithmetic mean and population standard deviation.
#[allow(clippy::cast_precision_loss)]
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// One row per (memory, datatype, `num_tiles`) bucket, in bucket order.
pub fn aggregate(records: &[RmsreRecord]) -> Vec<AggregatedRecord> {
    let mut buckets: BTreeMap<(MemoryLayout, MemoryLayout, DataType, u64), Vec<f64>> =
        BTreeMap::new();
    for r in records {
        buckets
            .entry((r.input_memory, r.output_memory, r.datatype, r.num_tiles))
            .or_default()
            .push(r.rmsre);
    }

    let aggregated: Vec<AggregatedRecord> = buckets
        .into_iter()
        .filter_map(|((input_memory, output_memory, datatype, num_tiles), values)| {
            let (mean, std) = mean_std(&values)?;
            let (std_rmsre, std_over_mean) = if values.len() < 2 {
                (None, None)
            } else {
                let ratio = if mean == 0.0 { 0.0 } else { std / mean };
                (Some(std), Some(ratio))
            };
            Some(AggregatedRecord {
                input_memory,
                output_memory,
                datatype,
                num_tiles,
                mean_rmsre: mean,
                std_rmsre,
                std_over_mean,
                measurements: values.len(),
            })
        })
        .collect();
    info!(
        "aggregated {} measurement(s) into {} bucket(s)",
        records.len(),
        aggregated.len()
    );
    aggregated
}

pub fn write_aggregated_csv<W: Write>(records: &[AggregatedRecord], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(AGGREGATED_COLUMNS)?;
    for r in records {
        out.write_record([
            r.input_memory.to_string(),
            r.output_memory.to_string(),
            r.datatype.to_string(),
            r.num_tiles.to_string(),
            r.mean_rmsre.to_string(),
            r.std_rmsre.map(|v| v.to_string()).unwrap_or_default(),
            r.std_over_mean.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }
    out.flush()?;
    Ok(())
}
