use serde::{Deserialize, Serialize};

/// Profiler report column names.
pub mod columns {
    pub const INPUT_0_MEMORY: &str = "INPUT_0_MEMORY";
    pub const INPUT_1_MEMORY: &str = "INPUT_1_MEMORY";
    pub const OUTPUT_0_MEMORY: &str = "OUTPUT_0_MEMORY";
    pub const INPUT_0_DATATYPE: &str = "INPUT_0_DATATYPE";
    pub const INPUT_0_X: &str = "INPUT_0_X";
    pub const INPUT_0_Y: &str = "INPUT_0_Y";
    pub const CORE_COUNT: &str = "CORE COUNT";
    pub const DURATION: &str = "DEVICE KERNEL DURATION [ns]";
    pub const TILES_PER_CORE: &str = "TILES PER CORE";
    pub const GRID_X: &str = "GRID_X";
    pub const GRID_Y: &str = "GRID_Y";
    pub const SHARD_X: &str = "SHARD_X";
    pub const SHARD_Y: &str = "SHARD_Y";
    pub const START_X: &str = "START_X";
    pub const START_Y: &str = "START_Y";

    /// Columns every profiler report must carry.
    pub const REQUIRED: [&str; 8] = [
        INPUT_0_MEMORY,
        INPUT_1_MEMORY,
        OUTPUT_0_MEMORY,
        INPUT_0_DATATYPE,
        INPUT_0_X,
        INPUT_0_Y,
        CORE_COUNT,
        DURATION,
    ];
}

/// Memory layout of a tensor on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryLayout {
    DramInterleaved,
    L1Interleaved,
    L1HeightSharded,
    L1WidthSharded,
    L1BlockSharded,
}

impl MemoryLayout {
    pub const ALL: [Self; 5] = [
        Self::DramInterleaved,
        Self::L1Interleaved,
        Self::L1HeightSharded,
        Self::L1WidthSharded,
        Self::L1BlockSharded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DramInterleaved => "DRAM_INTERLEAVED",
            Self::L1Interleaved => "L1_INTERLEAVED",
            Self::L1HeightSharded => "L1_HEIGHT_SHARDED",
            Self::L1WidthSharded => "L1_WIDTH_SHARDED",
            Self::L1BlockSharded => "L1_BLOCK_SHARDED",
        }
    }

    /// Parse a profiler value, accepting an optional `DEV_<N>_` device prefix.
    pub fn parse(raw: &str) -> Option<Self> {
        let name = strip_device_prefix(raw.trim());
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    pub fn shard_mode(self) -> ShardMode {
        match self {
            Self::DramInterleaved | Self::L1Interleaved => ShardMode::Interleaved,
            Self::L1HeightSharded => ShardMode::Height,
            Self::L1WidthSharded => ShardMode::Width,
            Self::L1BlockSharded => ShardMode::Block,
        }
    }
}

impl std::fmt::Display for MemoryLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip a leading `DEV_<digits>_` prefix, if any.
pub fn strip_device_prefix(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("DEV_") else {
        return raw;
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return raw;
    }
    rest[digits..].strip_prefix('_').unwrap_or(raw)
}

/// Element datatype of the first input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "BFLOAT16")]
    Bfloat16,
    #[serde(rename = "BFLOAT8_B")]
    Bfloat8B,
    #[serde(rename = "BFLOAT4_B")]
    Bfloat4B,
}

impl DataType {
    pub const ALL: [Self; 3] = [Self::Bfloat16, Self::Bfloat8B, Self::Bfloat4B];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bfloat16 => "BFLOAT16",
            Self::Bfloat8B => "BFLOAT8_B",
            Self::Bfloat4B => "BFLOAT4_B",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let name = raw.trim();
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sharding strategy implied by the first input's memory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardMode {
    Interleaved,
    Height,
    Width,
    Block,
}

impl ShardMode {
    pub const ALL: [Self; 4] = [Self::Interleaved, Self::Height, Self::Width, Self::Block];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interleaved => "INTERLEAVED",
            Self::Height => "HEIGHT",
            Self::Width => "WIDTH",
            Self::Block => "BLOCK",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let name = raw.trim();
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl std::fmt::Display for ShardMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field that may participate in a configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyField {
    #[serde(rename = "INPUT_0_MEMORY")]
    Input0Memory,
    #[serde(rename = "INPUT_1_MEMORY")]
    Input1Memory,
    #[serde(rename = "OUTPUT_0_MEMORY")]
    OutputMemory,
    #[serde(rename = "INPUT_0_DATATYPE")]
    Input0Datatype,
    #[serde(rename = "SHARD_MODE")]
    ShardMode,
}

impl KeyField {
    /// Column header used for this field in coefficient files.
    pub fn column(self) -> &'static str {
        match self {
            Self::Input0Memory => columns::INPUT_0_MEMORY,
            Self::Input1Memory => columns::INPUT_1_MEMORY,
            Self::OutputMemory => columns::OUTPUT_0_MEMORY,
            Self::Input0Datatype => columns::INPUT_0_DATATYPE,
            Self::ShardMode => "SHARD_MODE",
        }
    }
}

/// One device-side measurement from a profiler report.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    /// 1-based line in the source file (header is line 1).
    pub line: usize,
    pub input_0_memory: MemoryLayout,
    pub input_1_memory: MemoryLayout,
    pub output_memory: MemoryLayout,
    pub input_0_datatype: DataType,
    pub input_0_x: u64,
    pub input_0_y: u64,
    pub core_count: u64,
    pub grid_x: u64,
    pub grid_y: u64,
    pub tiles_per_core: Option<u64>,
    pub shard_x: Option<u64>,
    pub shard_y: Option<u64>,
    pub start_x: Option<u64>,
    pub start_y: Option<u64>,
    pub duration_ns: f64,
}

impl MeasurementRecord {
    pub fn shard_mode(&self) -> ShardMode {
        self.input_0_memory.shard_mode()
    }
}

/// Records ingested from one profiler report.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<MeasurementRecord>,
    /// Rows dropped for missing required values or a non-positive duration.
    pub dropped: usize,
    /// Host-side `(torch)` rows skipped.
    pub skipped_host_rows: usize,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
