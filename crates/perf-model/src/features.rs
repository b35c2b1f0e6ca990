//! Feature derivation — turns a measurement record into a numeric vector.
//!
//! Enumerated fields (memory layouts, datatype) never appear here; they
//! only select the group a record belongs to.

use serde::{Deserialize, Serialize};

use crate::schema::MeasurementRecord;
use crate::schema::columns;

/// Elements per tile on the target accelerator.
pub const TILE_ELEMENTS: u64 = 1024;

/// A numeric feature the regressor can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    NumTiles,
    TilesPerCore,
    CoreCount,
    GridX,
    GridY,
    ShardX,
    ShardY,
    StartX,
    StartY,
}

impl FeatureKind {
    pub const ALL: [Self; 9] = [
        Self::NumTiles,
        Self::TilesPerCore,
        Self::CoreCount,
        Self::GridX,
        Self::GridY,
        Self::ShardX,
        Self::ShardY,
        Self::StartX,
        Self::StartY,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::NumTiles => "num_tiles",
            Self::TilesPerCore => "tiles_per_core",
            Self::CoreCount => "core_count",
            Self::GridX => "grid_x",
            Self::GridY => "grid_y",
            Self::ShardX => "shard_x",
            Self::ShardY => "shard_y",
            Self::StartX => "start_x",
            Self::StartY => "start_y",
        }
    }

    /// Coefficient column header for this feature.
    pub fn coef_column(self) -> String {
        format!("{}_coef", self.name())
    }

    /// Profiler column this feature cannot be derived without, if any.
    pub fn source_column(self) -> Option<&'static str> {
        match self {
            Self::ShardX => Some(columns::SHARD_X),
            Self::ShardY => Some(columns::SHARD_Y),
            Self::StartX => Some(columns::START_X),
            Self::StartY => Some(columns::START_Y),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How `num_tiles` is computed from the input shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TilesFormula {
    /// `input_0_x * input_0_y / 1024`
    #[default]
    Product,
    /// `input_0_y * input_0_y / 1024`
    SquaredY,
}

/// Why a record has no feature vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    ZeroCoreCount,
    MissingField(&'static str),
    Overflow,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroCoreCount => write!(f, "core_count is 0"),
            Self::MissingField(col) => write!(f, "{col} is missing"),
            Self::Overflow => write!(f, "tensor shape overflows"),
        }
    }
}

pub fn num_tiles(record: &MeasurementRecord, formula: TilesFormula) -> Result<u64, Rejection> {
    let elements = match formula {
        TilesFormula::Product => record.input_0_x.checked_mul(record.input_0_y),
        TilesFormula::SquaredY => record.input_0_y.checked_mul(record.input_0_y),
    };
    elements.map(|e| e / TILE_ELEMENTS).ok_or(Rejection::Overflow)
}

/// Tiles handled per core, preferring the profiler's own column.
pub fn tiles_per_core(record: &MeasurementRecord, formula: TilesFormula) -> Result<u64, Rejection> {
    if record.core_count == 0 {
        return Err(Rejection::ZeroCoreCount);
    }
    match record.tiles_per_core {
        Some(t) => Ok(t),
        None => Ok(num_tiles(record, formula)? / record.core_count),
    }
}

fn required(value: Option<u64>, column: &'static str) -> Result<u64, Rejection> {
    value.ok_or(Rejection::MissingField(column))
}

/// Derive the feature vector for `record`, in the order of `features`.
#[allow(clippy::cast_precision_loss)]
pub fn derive_features(
    record: &MeasurementRecord,
    features: &[FeatureKind],
    formula: TilesFormula,
) -> Result<Vec<f64>, Rejection> {
    if record.core_count == 0 {
        return Err(Rejection::ZeroCoreCount);
    }
    features
        .iter()
        .map(|feature| {
            let value = match feature {
                FeatureKind::NumTiles => num_tiles(record, formula)?,
                FeatureKind::TilesPerCore => tiles_per_core(record, formula)?,
                FeatureKind::CoreCount => record.core_count,
                FeatureKind::GridX => record.grid_x,
                FeatureKind::GridY => record.grid_y,
                FeatureKind::ShardX => required(record.shard_x, columns::SHARD_X)?,
                FeatureKind::ShardY => required(record.shard_y, columns::SHARD_Y)?,
                FeatureKind::StartX => required(record.start_x, columns::START_X)?,
                FeatureKind::StartY => required(record.start_y, columns::START_Y)?,
            };
            Ok(value as f64)
        })
        .collect()
}
