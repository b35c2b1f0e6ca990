//! Partition records into independently modeled groups by configuration key.

use std::collections::BTreeMap;

use crate::error::Violation;
use crate::schema::{DataType, Dataset, KeyField, MeasurementRecord, MemoryLayout, PipelineConfig, ShardMode};

/// One component of a configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Memory(MemoryLayout),
    DataType(DataType),
    Shard(ShardMode),
}

impl KeyValue {
    pub fn of(record: &MeasurementRecord, field: KeyField) -> Self {
        match field {
            KeyField::Input0Memory => Self::Memory(record.input_0_memory),
            KeyField::Input1Memory => Self::Memory(record.input_1_memory),
            KeyField::OutputMemory => Self::Memory(record.output_memory),
            KeyField::Input0Datatype => Self::DataType(record.input_0_datatype),
            KeyField::ShardMode => Self::Shard(record.shard_mode()),
        }
    }

    /// Parse the persisted form of `field`.
    pub fn parse(field: KeyField, raw: &str) -> Option<Self> {
        match field {
            KeyField::Input0Memory | KeyField::Input1Memory | KeyField::OutputMemory => {
                MemoryLayout::parse(raw).map(Self::Memory)
            }
            KeyField::Input0Datatype => DataType::parse(raw).map(Self::DataType),
            KeyField::ShardMode => ShardMode::parse(raw).map(Self::Shard),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory(m) => m.as_str(),
            Self::DataType(d) => d.as_str(),
            Self::Shard(s) => s.as_str(),
        }
    }
}

/// Ordered tuple of key values, one per declared key field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigKey(pub Vec<KeyValue>);

impl ConfigKey {
    pub fn of(record: &MeasurementRecord, fields: &[KeyField]) -> Self {
        Self(fields.iter().map(|&f| KeyValue::of(record, f)).collect())
    }

    pub fn values(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|v| v.as_str())
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = self.values().collect();
        f.write_str(&parts.join("/"))
    }
}

/// Records of one dataset partitioned by configuration key.
#[derive(Debug, Clone)]
pub struct Grouping {
    /// Row indices into the dataset, per key. Keys iterate in sorted order.
    pub groups: BTreeMap<ConfigKey, Vec<usize>>,
    pub min_fit_rows: usize,
}

impl Grouping {
    pub fn is_fittable(&self, key: &ConfigKey) -> bool {
        self.groups
            .get(key)
            .is_some_and(|rows| rows.len() >= self.min_fit_rows)
    }

    pub fn fittable(&self) -> impl Iterator<Item = (&ConfigKey, &Vec<usize>)> {
        self.groups
            .iter()
            .filter(|(_, rows)| rows.len() >= self.min_fit_rows)
    }

    pub fn unfittable(&self) -> impl Iterator<Item = (&ConfigKey, &Vec<usize>)> {
        self.groups
            .iter()
            .filter(|(_, rows)| rows.len() < self.min_fit_rows)
    }

    /// One diagnostic per group too small to fit.
    pub fn diagnostics(&self) -> Vec<Violation> {
        self.unfittable()
            .map(|(key, rows)| {
                Violation::unfittable(
                    &key.to_string(),
                    &format!("{} row(s), need {}", rows.len(), self.min_fit_rows),
                )
            })
            .collect()
    }
}

/// Partition `dataset` by the pipeline's key fields.
pub fn partition(dataset: &Dataset, config: &PipelineConfig) -> Grouping {
    partition_rows(dataset, config, 0..dataset.records.len())
}

/// Partition only the given row indices.
pub fn partition_rows(
    dataset: &Dataset,
    config: &PipelineConfig,
    rows: impl IntoIterator<Item = usize>,
) -> Grouping {
    let mut groups: BTreeMap<ConfigKey, Vec<usize>> = BTreeMap::new();
    for i in rows {
        let key = ConfigKey::of(&dataset.records[i], &config.key);
        groups.entry(key).or_default().push(i);
    }
    Grouping {
        groups,
        min_fit_rows: config.min_fit_rows(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::record;

    fn dataset() -> Dataset {
        let mut a = record(32, 32, 1, 100.0);
        a.input_1_memory = MemoryLayout::L1Interleaved;
        let b = record(32, 64, 1, 200.0);
        let c = record(64, 64, 1, 300.0);
        let mut d = record(64, 64, 1, 300.0);
        d.input_0_datatype = DataType::Bfloat8B;
        Dataset {
            records: vec![a, b, c, d],
            ..Dataset::default()
        }
    }

    fn config(min_fit_rows: Option<usize>) -> PipelineConfig {
        let mut config = PipelineConfig::binary_add_interleaved();
        config.features = vec![crate::features::FeatureKind::NumTiles];
        config.min_fit_rows = min_fit_rows;
        config
    }

    #[test]
    fn groups_by_declared_key() {
        let grouping = partition(&dataset(), &config(None));
        assert_eq!(grouping.groups.len(), 3);
        let sizes: Vec<usize> = grouping.groups.values().map(Vec::len).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 4);
        assert_eq!(grouping.fittable().count(), 1);
        assert_eq!(grouping.unfittable().count(), 2);
    }

    #[test]
    fn diagnostics_name_each_small_group() {
        let grouping = partition(&dataset(), &config(None));
        let diags = grouping.diagnostics();
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().any(|d| d.message.contains("DRAM_INTERLEAVED/L1_INTERLEAVED/BFLOAT16")));
        assert!(diags.iter().any(|d| d.message.contains("BFLOAT8_B")));
        assert!(diags.iter().all(|d| d.message.contains("need 2")));
    }

    #[test]
    fn min_fit_rows_override() {
        let grouping = partition(&dataset(), &config(Some(1)));
        assert_eq!(grouping.fittable().count(), 3);
        assert!(grouping.diagnostics().is_empty());
    }

    #[test]
    fn key_display_and_parse() {
        let ds = dataset();
        let key = ConfigKey::of(&ds.records[0], &config(None).key);
        assert_eq!(key.to_string(), "DRAM_INTERLEAVED/L1_INTERLEAVED/BFLOAT16");
        assert_eq!(
            KeyValue::parse(KeyField::Input1Memory, "L1_INTERLEAVED"),
            Some(KeyValue::Memory(MemoryLayout::L1Interleaved))
        );
        assert_eq!(
            KeyValue::parse(KeyField::ShardMode, "BLOCK"),
            Some(KeyValue::Shard(ShardMode::Block))
        );
        assert_eq!(KeyValue::parse(KeyField::Input0Datatype, "L1_INTERLEAVED"), None);
    }

    #[test]
    fn partition_subset_of_rows() {
        let ds = dataset();
        let grouping = partition_rows(&ds, &config(None), [1, 2]);
        assert_eq!(grouping.groups.len(), 1);
        assert!(grouping.is_fittable(grouping.groups.keys().next().unwrap()));
    }
}
