use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PerfModelError, Result};
use crate::features::{FeatureKind, TilesFormula};
use crate::schema::types::{KeyField, columns};

/// OLS solver selected for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Householder QR on the design matrix.
    #[default]
    Qr,
    /// Cholesky on the normal equations.
    Normal,
}

/// Declaration of one modeling pipeline: how rows are keyed and which
/// features every group is fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub key: Vec<KeyField>,
    pub features: Vec<FeatureKind>,
    #[serde(default)]
    pub tiles_formula: TilesFormula,
    #[serde(default)]
    pub solver: SolverKind,
    /// Minimum rows for a group to be fitted; defaults to `features + 1`.
    #[serde(default)]
    pub min_fit_rows: Option<usize>,
}

impl PipelineConfig {
    /// Binary add over interleaved memory.
    pub fn binary_add_interleaved() -> Self {
        Self {
            name: "binary-add-interleaved".to_string(),
            key: vec![
                KeyField::Input0Memory,
                KeyField::Input1Memory,
                KeyField::Input0Datatype,
            ],
            features: vec![
                FeatureKind::NumTiles,
                FeatureKind::TilesPerCore,
                FeatureKind::CoreCount,
            ],
            tiles_formula: TilesFormula::Product,
            solver: SolverKind::Qr,
            min_fit_rows: None,
        }
    }

    /// Binary add over sharded L1 memory.
    pub fn binary_add_sharded() -> Self {
        Self {
            name: "binary-add-sharded".to_string(),
            key: vec![
                KeyField::Input0Memory,
                KeyField::OutputMemory,
                KeyField::Input0Datatype,
                KeyField::ShardMode,
            ],
            features: vec![
                FeatureKind::TilesPerCore,
                FeatureKind::CoreCount,
                FeatureKind::GridX,
                FeatureKind::GridY,
                FeatureKind::ShardX,
                FeatureKind::ShardY,
            ],
            tiles_formula: TilesFormula::Product,
            solver: SolverKind::Qr,
            min_fit_rows: None,
        }
    }

    /// Look up a built-in pipeline by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "binary-add-interleaved" | "interleaved" => Some(Self::binary_add_interleaved()),
            "binary-add-sharded" | "sharded" => Some(Self::binary_add_sharded()),
            _ => None,
        }
    }

    pub fn preset_names() -> &'static [&'static str] {
        &["binary-add-interleaved", "binary-add-sharded"]
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn min_fit_rows(&self) -> usize {
        self.min_fit_rows.unwrap_or(self.features.len() + 1)
    }

    /// Profiler columns a report must carry for this pipeline.
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut cols: Vec<&'static str> = columns::REQUIRED.to_vec();
        for col in self.features.iter().filter_map(|f| f.source_column()) {
            if !cols.contains(&col) {
                cols.push(col);
            }
        }
        cols
    }

    /// Coefficient file header: key fields, `intercept`, then `<feature>_coef`.
    pub fn coefficient_columns(&self) -> Vec<String> {
        self.key
            .iter()
            .map(|k| k.column().to_string())
            .chain(std::iter::once("intercept".to_string()))
            .chain(self.features.iter().map(|f| f.coef_column()))
            .collect()
    }
}

/// Parse a YAML pipeline declaration from a file.
pub fn parse_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse a YAML pipeline declaration from a string.
pub fn parse_config_str(yaml: &str) -> Result<PipelineConfig> {
    let config: PipelineConfig = serde_yaml::from_str(yaml)?;
    Ok(config)
}

/// Resolve a pipeline from either a YAML file or a preset name.
pub fn resolve_config(config_path: Option<&Path>, preset: &str) -> Result<PipelineConfig> {
    match config_path {
        Some(path) => parse_config(path),
        None => PipelineConfig::preset(preset).ok_or_else(|| {
            PerfModelError::invalid(format!(
                "unknown pipeline '{preset}' (expected one of: {})",
                PipelineConfig::preset_names().join(", ")
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHARDED_YAML: &str = r"
name: sharded-test
key: [INPUT_0_MEMORY, OUTPUT_0_MEMORY, SHARD_MODE]
features: [tiles_per_core, shard_x, start_y]
tiles_formula: squared_y
solver: normal
min_fit_rows: 6
";

    #[test]
    fn parse_full_config() {
        let config = parse_config_str(SHARDED_YAML).unwrap();
        assert_eq!(config.name, "sharded-test");
        assert_eq!(config.key.len(), 3);
        assert_eq!(config.features[1], FeatureKind::ShardX);
        assert_eq!(config.tiles_formula, TilesFormula::SquaredY);
        assert_eq!(config.solver, SolverKind::Normal);
        assert_eq!(config.min_fit_rows(), 6);
    }

    #[test]
    fn defaults_apply() {
        let config = parse_config_str(
            "name: t\nkey: [INPUT_0_MEMORY]\nfeatures: [num_tiles, core_count]\n",
        )
        .unwrap();
        assert_eq!(config.tiles_formula, TilesFormula::Product);
        assert_eq!(config.solver, SolverKind::Qr);
        assert_eq!(config.min_fit_rows(), 3);
    }

    #[test]
    fn unknown_feature_is_rejected() {
        let err = parse_config_str("name: t\nkey: [INPUT_0_MEMORY]\nfeatures: [tiles]\n");
        assert!(matches!(err, Err(PerfModelError::Yaml(_))));
    }

    #[test]
    fn required_columns_include_shard_sources() {
        let config = parse_config_str(SHARDED_YAML).unwrap();
        let cols = config.required_columns();
        assert!(cols.contains(&"SHARD_X"));
        assert!(cols.contains(&"START_Y"));
        assert!(!cols.contains(&"SHARD_Y"));
        assert!(cols.contains(&"CORE COUNT"));
    }

    #[test]
    fn coefficient_columns_are_stable() {
        let config = PipelineConfig::binary_add_interleaved();
        assert_eq!(
            config.coefficient_columns(),
            vec![
                "INPUT_0_MEMORY",
                "INPUT_1_MEMORY",
                "INPUT_0_DATATYPE",
                "intercept",
                "num_tiles_coef",
                "tiles_per_core_coef",
                "core_count_coef",
            ]
        );
        assert_eq!(config.coefficient_columns(), config.coefficient_columns());
    }

    #[test]
    fn presets_resolve() {
        for name in PipelineConfig::preset_names() {
            let config = resolve_config(None, name).unwrap();
            assert_eq!(&config.name, name);
        }
        assert!(resolve_config(None, "conv2d").is_err());
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = PipelineConfig::binary_add_sharded();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(parse_config_str(&yaml).unwrap(), config);
    }
}
