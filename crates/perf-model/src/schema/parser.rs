use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use log::{debug, info};

use crate::error::{PerfModelError, Result};
use crate::schema::config::PipelineConfig;
use crate::schema::types::{DataType, Dataset, MeasurementRecord, MemoryLayout, columns};

/// Prefix marking host-side reference rows in profiler reports.
pub const HOST_ROW_PREFIX: &str = "(torch)";

/// Read a profiler CSV into a [`Dataset`] for the given pipeline.
///
/// # Errors
///
/// Returns [`PerfModelError::Io`] if the file cannot be opened,
/// [`PerfModelError::MissingColumns`] if a required header is absent,
/// or [`PerfModelError::InvalidInput`] for a value that does not parse.
pub fn read_measurements(path: &Path, config: &PipelineConfig) -> Result<Dataset> {
    let file = std::fs::File::open(path)?;
    parse_measurements(file, &path.display().to_string(), config)
}

/// Parse profiler CSV text into a [`Dataset`].
pub fn parse_measurements_str(text: &str, config: &PipelineConfig) -> Result<Dataset> {
    parse_measurements(text.as_bytes(), "<input>", config)
}

/// Header positions of every column the ingestor reads.
struct Layout {
    input_0_memory: usize,
    input_1_memory: usize,
    output_memory: usize,
    input_0_datatype: usize,
    input_0_x: usize,
    input_0_y: usize,
    core_count: usize,
    duration: usize,
    tiles_per_core: Option<usize>,
    grid_x: Option<usize>,
    grid_y: Option<usize>,
    shard_x: Option<usize>,
    shard_y: Option<usize>,
    start_x: Option<usize>,
    start_y: Option<usize>,
    /// Positions whose value must be non-empty for a row to be kept.
    required: Vec<usize>,
}

impl Layout {
    fn from_headers(
        headers: &StringRecord,
        source_name: &str,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let mut missing = Vec::new();
        let mut required = Vec::new();
        for name in config.required_columns() {
            match find(name) {
                Some(pos) => required.push(pos),
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(PerfModelError::MissingColumns {
                source_name: source_name.to_string(),
                columns: missing,
            });
        }

        // Presence of the fixed set was checked above.
        let at = |name: &str| find(name).unwrap_or_default();
        Ok(Self {
            input_0_memory: at(columns::INPUT_0_MEMORY),
            input_1_memory: at(columns::INPUT_1_MEMORY),
            output_memory: at(columns::OUTPUT_0_MEMORY),
            input_0_datatype: at(columns::INPUT_0_DATATYPE),
            input_0_x: at(columns::INPUT_0_X),
            input_0_y: at(columns::INPUT_0_Y),
            core_count: at(columns::CORE_COUNT),
            duration: at(columns::DURATION),
            tiles_per_core: find(columns::TILES_PER_CORE),
            grid_x: find(columns::GRID_X),
            grid_y: find(columns::GRID_Y),
            shard_x: find(columns::SHARD_X),
            shard_y: find(columns::SHARD_Y),
            start_x: find(columns::START_X),
            start_y: find(columns::START_Y),
            required,
        })
    }
}

fn parse_measurements<R: Read>(
    reader: R,
    source_name: &str,
    config: &PipelineConfig,
) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let layout = Layout::from_headers(&headers, source_name, config)?;

    let mut dataset = Dataset::default();
    for (i, row) in reader.records().enumerate() {
        let row = row?;
        let line = row
            .position()
            .and_then(|p| usize::try_from(p.line()).ok())
            .unwrap_or(i + 2);

        if row
            .get(0)
            .is_some_and(|first| first.trim_start().starts_with(HOST_ROW_PREFIX))
        {
            dataset.skipped_host_rows += 1;
            continue;
        }

        if layout.required.iter().any(|&pos| value(&row, pos).is_none()) {
            debug!("{source_name}:{line}: dropping row with missing required value");
            dataset.dropped += 1;
            continue;
        }

        match parse_row(&row, &layout, line, &headers)? {
            Some(record) => dataset.records.push(record),
            None => {
                debug!("{source_name}:{line}: dropping row with non-positive duration");
                dataset.dropped += 1;
            }
        }
    }

    info!(
        "{source_name}: {} record(s), {} dropped, {} host row(s) skipped",
        dataset.records.len(),
        dataset.dropped,
        dataset.skipped_host_rows
    );
    Ok(dataset)
}

/// Trimmed, non-empty field at `pos`.
fn value(row: &StringRecord, pos: usize) -> Option<&str> {
    row.get(pos).map(str::trim).filter(|v| !v.is_empty())
}

struct RowContext<'a> {
    row: &'a StringRecord,
    headers: &'a StringRecord,
    line: usize,
}

impl RowContext<'_> {
    fn header(&self, pos: usize) -> &str {
        self.headers.get(pos).unwrap_or("?")
    }

    fn invalid(&self, pos: usize, raw: &str, what: &str) -> PerfModelError {
        PerfModelError::invalid(format!(
            "line {}: column '{}' has {what} value '{raw}'",
            self.line,
            self.header(pos).trim()
        ))
    }

    fn memory(&self, pos: usize) -> Result<MemoryLayout> {
        let raw = value(self.row, pos).unwrap_or_default();
        MemoryLayout::parse(raw).ok_or_else(|| self.invalid(pos, raw, "unknown memory layout"))
    }

    fn datatype(&self, pos: usize) -> Result<DataType> {
        let raw = value(self.row, pos).unwrap_or_default();
        DataType::parse(raw).ok_or_else(|| self.invalid(pos, raw, "unknown datatype"))
    }

    fn count(&self, pos: usize) -> Result<u64> {
        let raw = value(self.row, pos).unwrap_or_default();
        parse_count(raw).ok_or_else(|| self.invalid(pos, raw, "a non-integer"))
    }

    fn optional_count(&self, pos: Option<usize>) -> Result<Option<u64>> {
        match pos.and_then(|p| value(self.row, p).map(|raw| (p, raw))) {
            Some((p, raw)) => parse_count(raw)
                .map(Some)
                .ok_or_else(|| self.invalid(p, raw, "a non-integer")),
            None => Ok(None),
        }
    }

    fn real(&self, pos: usize) -> Result<f64> {
        let raw = value(self.row, pos).unwrap_or_default();
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.invalid(pos, raw, "a non-numeric"))
    }
}

/// Parse a non-negative integer, accepting integral float text such as `"1024.0"`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn parse_count(raw: &str) -> Option<u64> {
    if let Ok(v) = raw.parse::<u64>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok()?;
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
        Some(v as u64)
    } else {
        None
    }
}

fn parse_row(
    row: &StringRecord,
    layout: &Layout,
    line: usize,
    headers: &StringRecord,
) -> Result<Option<MeasurementRecord>> {
    let ctx = RowContext { row, headers, line };

    let duration_ns = ctx.real(layout.duration)?;
    if duration_ns <= 0.0 {
        return Ok(None);
    }

    Ok(Some(MeasurementRecord {
        line,
        input_0_memory: ctx.memory(layout.input_0_memory)?,
        input_1_memory: ctx.memory(layout.input_1_memory)?,
        output_memory: ctx.memory(layout.output_memory)?,
        input_0_datatype: ctx.datatype(layout.input_0_datatype)?,
        input_0_x: ctx.count(layout.input_0_x)?,
        input_0_y: ctx.count(layout.input_0_y)?,
        core_count: ctx.count(layout.core_count)?,
        grid_x: ctx.optional_count(layout.grid_x)?.unwrap_or(0),
        grid_y: ctx.optional_count(layout.grid_y)?.unwrap_or(0),
        tiles_per_core: ctx.optional_count(layout.tiles_per_core)?,
        shard_x: ctx.optional_count(layout.shard_x)?,
        shard_y: ctx.optional_count(layout.shard_y)?,
        start_x: ctx.optional_count(layout.start_x)?,
        start_y: ctx.optional_count(layout.start_y)?,
        duration_ns,
    }))
}
