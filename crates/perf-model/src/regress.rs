//! Per-group linear regression and the persisted coefficient table.
//!
//! Fits `duration ≈ intercept + Σ coef_i · feature_i` for every fittable
//! group. Groups that are too small or rank-deficient are excluded with a
//! [`Violation`] rather than failing the run.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::error::{PerfModelError, Result, Violation};
use crate::features::{FeatureKind, derive_features};
use crate::grouping::{ConfigKey, KeyValue, partition_rows};
use crate::report::write_atomic;
use crate::schema::{Dataset, KeyField, PipelineConfig};
use crate::solver::{DesignMatrix, LeastSquaresSolver, SolveError, dot};

/// Fitted coefficients for one configuration key.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    pub intercept: f64,
    /// One slope per declared feature, in declared order.
    pub slopes: Vec<f64>,
}

impl Coefficients {
    fn from_solution(solution: &[f64]) -> Self {
        Self {
            intercept: solution[0],
            slopes: solution[1..].to_vec(),
        }
    }

    /// `intercept + Σ slope_i · feature_i`
    pub fn estimate(&self, features: &[f64]) -> f64 {
        self.intercept + dot(&self.slopes, features)
    }
}

/// Coefficients for every fitted key of one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientTable {
    pub key_fields: Vec<KeyField>,
    pub features: Vec<FeatureKind>,
    pub entries: BTreeMap<ConfigKey, Coefficients>,
}

/// Result of one training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub table: CoefficientTable,
    /// Unfittable and ill-conditioned groups.
    pub diagnostics: Vec<Violation>,
    /// Rows whose feature vector could not be derived.
    pub rejected: usize,
}

/// Fit one model per fittable group of `dataset`.
pub fn fit(
    dataset: &Dataset,
    config: &PipelineConfig,
    solver: &dyn LeastSquaresSolver,
) -> TrainingOutcome {
    let mut features: Vec<Option<Vec<f64>>> = Vec::with_capacity(dataset.len());
    let mut rejected = 0;
    for record in &dataset.records {
        match derive_features(record, &config.features, config.tiles_formula) {
            Ok(v) => features.push(Some(v)),
            Err(reason) => {
                debug!("line {}: rejected for training: {reason}", record.line);
                rejected += 1;
                features.push(None);
            }
        }
    }

    let usable = (0..dataset.len()).filter(|&i| features[i].is_some());
    let grouping = partition_rows(dataset, config, usable);
    let mut diagnostics = grouping.diagnostics();
    let mut entries = BTreeMap::new();

    for (key, rows) in grouping.fittable() {
        let group_features: Vec<Vec<f64>> = rows
            .iter()
            .filter_map(|&i| features[i].clone())
            .collect();
        let target: Vec<f64> = rows.iter().map(|&i| dataset.records[i].duration_ns).collect();
        let design = DesignMatrix::with_intercept(&group_features);

        match solver.solve(&design, &target) {
            Ok(solution) => {
                debug!("{key}: fitted on {} row(s) with {}", rows.len(), solver.name());
                entries.insert(key.clone(), Coefficients::from_solution(&solution));
            }
            Err(e @ SolveError::RankDeficient { .. }) => {
                diagnostics.push(Violation::ill_conditioned(&key.to_string(), &e.to_string()));
            }
            Err(e) => {
                diagnostics.push(Violation::unfittable(&key.to_string(), &e.to_string()));
            }
        }
    }

    for d in &diagnostics {
        warn!("{}", d.message);
    }
    info!(
        "fitted {} group(s), {} excluded, {rejected} row(s) rejected",
        entries.len(),
        diagnostics.len()
    );

    TrainingOutcome {
        table: CoefficientTable {
            key_fields: config.key.clone(),
            features: config.features.clone(),
            entries,
        },
        diagnostics,
        rejected,
    }
}

impl CoefficientTable {
    pub fn get(&self, key: &ConfigKey) -> Option<&Coefficients> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn columns(&self) -> Vec<String> {
        self.key_fields
            .iter()
            .map(|k| k.column().to_string())
            .chain(std::iter::once("intercept".to_string()))
            .chain(self.features.iter().map(|f| f.coef_column()))
            .collect()
    }

    /// Write one row per key, in key order.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(self.columns())?;
        for (key, coefs) in &self.entries {
            let mut record: Vec<String> = key.values().map(str::to_string).collect();
            record.push(coefs.intercept.to_string());
            record.extend(coefs.slopes.iter().map(f64::to_string));
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Atomically write the table to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, |w| self.write_csv(w))
    }

    /// Load a coefficient file written for `config`.
    ///
    /// The header must be exactly the pipeline's coefficient columns: a
    /// missing column is [`PerfModelError::MissingColumns`], an extra or
    /// reordered column is [`PerfModelError::InvalidInput`].
    pub fn load(path: &Path, config: &PipelineConfig) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_csv(file, &path.display().to_string(), config)
    }

    pub fn read_csv<R: Read>(reader: R, source_name: &str, config: &PipelineConfig) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let expected = config.coefficient_columns();

        let missing: Vec<String> = expected
            .iter()
            .filter(|c| !headers.contains(c))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PerfModelError::MissingColumns {
                source_name: source_name.to_string(),
                columns: missing,
            });
        }
        if headers != expected {
            return Err(PerfModelError::invalid(format!(
                "{source_name}: coefficient columns [{}] do not match pipeline '{}' [{}]",
                headers.join(", "),
                config.name,
                expected.join(", ")
            )));
        }

        let key_len = config.key.len();
        let mut entries = BTreeMap::new();
        for (i, row) in reader.records().enumerate() {
            let row = row?;
            let line = row
                .position()
                .and_then(|p| usize::try_from(p.line()).ok())
                .unwrap_or(i + 2);
            let key = ConfigKey(
                config
                    .key
                    .iter()
                    .enumerate()
                    .map(|(pos, &field)| {
                        let raw = row.get(pos).unwrap_or_default();
                        KeyValue::parse(field, raw).ok_or_else(|| {
                            PerfModelError::invalid(format!(
                                "{source_name}:{line}: invalid {} value '{raw}'",
                                field.column()
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            );
            let numbers = row
                .iter()
                .skip(key_len)
                .map(|raw| {
                    raw.parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| {
                            PerfModelError::invalid(format!(
                                "{source_name}:{line}: non-numeric coefficient '{raw}'"
                            ))
                        })
                })
                .collect::<Result<Vec<f64>>>()?;
            if numbers.len() != config.features.len() + 1 {
                return Err(PerfModelError::invalid(format!(
                    "{source_name}:{line}: expected {} coefficient(s), found {}",
                    config.features.len() + 1,
                    numbers.len()
                )));
            }
            if entries
                .insert(key.clone(), Coefficients::from_solution(&numbers))
                .is_some()
            {
                return Err(PerfModelError::invalid(format!(
                    "{source_name}:{line}: duplicate key {key}"
                )));
            }
        }

        Ok(Self {
            key_fields: config.key.clone(),
            features: config.features.clone(),
            entries,
        })
    }
}
