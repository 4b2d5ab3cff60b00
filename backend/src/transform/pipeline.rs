//! High-level pipeline API from raw grid to verified records.
//!
//! This module combines all steps: header detection, date mapping, block
//! segmentation, extraction, the master join, date filtering and sorting.
//!
//! # Example
//!
//! ```rust,ignore
//! use ctqflow::transform::{transform_workbooks, verify_output, TransformOptions};
//! use std::path::Path;
//!
//! let options = TransformOptions::default();
//! let run = transform_workbooks(Path::new("inspection.xlsx"), Path::new("master.xlsx"), &options)?;
//! let verification = verify_output(&run.output.records, &run.master, &options)?;
//! println!("{} values out of spec", verification.violation_count());
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::error::{PipelineError, PipelineResult};
use crate::master::{add_management_code, verify, MasterSchema, Verification};
use crate::models::{InfoMapping, MasterTable, MeasurementBlock, MeasurementRecord, RawGrid};
use crate::parser::{self, workbook};

use super::dates::DateParser;
use super::extractor::extract_records;
use super::scanner::{date_mapping, locate_header, DEFAULT_MAX_ROW_CHECK, DEFAULT_MIN_DATE_COUNT, DEFAULT_SAMPLE_ROWS};
use super::segmenter::{default_search_cols, segment_blocks, DEFAULT_MARKER};

/// Options for the transformation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformOptions {
    /// Rows sampled when scoring columns for dates
    pub sample_rows: usize,

    /// Rows searched for the date header row
    pub max_row_check: usize,

    /// Date cells a row needs to count as the header
    pub min_date_count: usize,

    /// Columns searched for block markers
    pub search_cols: Vec<usize>,

    /// Marker token opening a measurement block
    pub marker: String,

    /// Year for month/day-only headers (current year when unset)
    pub default_year: Option<i32>,

    /// Inclusive lower bound on measurement dates
    pub start_date: Option<NaiveDate>,

    /// Inclusive upper bound on measurement dates
    pub end_date: Option<NaiveDate>,

    /// Master header mapping
    pub schema: MasterSchema,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
            max_row_check: DEFAULT_MAX_ROW_CHECK,
            min_date_count: DEFAULT_MIN_DATE_COUNT,
            search_cols: default_search_cols(),
            marker: DEFAULT_MARKER.to_string(),
            default_year: None,
            start_date: None,
            end_date: None,
            schema: MasterSchema::default(),
        }
    }
}

impl TransformOptions {
    pub fn date_parser(&self) -> DateParser {
        DateParser::new(self.default_year)
    }

    /// Set both date bounds from user text. Empty input leaves a bound unset.
    pub fn with_date_bounds(mut self, start: Option<&str>, end: Option<&str>) -> PipelineResult<Self> {
        let parser = self.date_parser();
        self.start_date = start.map(|s| parse_date_bound(&parser, s)).transpose()?.flatten();
        self.end_date = end.map(|s| parse_date_bound(&parser, s)).transpose()?.flatten();
        Ok(self)
    }
}

fn parse_date_bound(parser: &DateParser, raw: &str) -> PipelineResult<Option<NaiveDate>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parser
        .parse_str(raw)
        .map(Some)
        .ok_or_else(|| PipelineError::InvalidDateBound(raw.to_string()))
}

/// A block as reported in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub ctq_name: String,
    pub start_row: usize,
    pub end_row: usize,
}

impl From<&MeasurementBlock> for BlockSummary {
    fn from(block: &MeasurementBlock) -> Self {
        Self {
            ctq_name: block.ctq_name.clone(),
            start_row: block.start_row,
            end_row: block.end_row,
        }
    }
}

/// What a run detected and how many records survived each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformSummary {
    pub date_col: usize,
    pub date_row: usize,
    pub mapped_dates: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub blocks: Vec<BlockSummary>,
    /// Records before date filtering
    pub extracted: usize,
    /// Records removed by the date bounds
    pub filtered_out: usize,
    /// Records in the output
    pub records: usize,
    /// Output records without a management code
    pub unmatched: usize,
}

/// Tidy records plus the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct TransformOutput {
    pub records: Vec<MeasurementRecord>,
    pub summary: TransformSummary,
}

/// Transform a raw grid into tidy, joined records.
///
/// Steps:
/// 1. Locate the date header (column, then row)
/// 2. Map header cells to dates
/// 3. Segment blocks at marker rows
/// 4. Extract one record per non-missing cell
/// 5. Attach management codes from the master
/// 6. Apply the inclusive date bounds and sort by `(date, CTQ name)`
pub fn transform_grid(
    grid: &RawGrid,
    info: &InfoMapping,
    master: &MasterTable,
    options: &TransformOptions,
) -> PipelineResult<TransformOutput> {
    let parser = options.date_parser();

    log_info("🔍 Locating date header...");
    let header = locate_header(grid, options.sample_rows, options.min_date_count, options.max_row_check, &parser)?;
    log_success(format!("Date header at row {}, column {}", header.row, header.col));

    let mapping = date_mapping(grid, header.row, header.col, &parser);
    let first_date = mapping.iter().map(|(_, d)| d).min();
    let last_date = mapping.iter().map(|(_, d)| d).max();
    match (first_date, last_date) {
        (Some(first), Some(last)) => log_success(format!("{} date column(s): {} → {}", mapping.len(), first, last)),
        _ => log_warning("Header row holds no parseable dates"),
    }

    log_info(format!("✂️  Segmenting blocks at '{}' markers...", options.marker));
    let blocks = segment_blocks(grid, header.row, &mapping, &options.search_cols, &options.marker);
    if blocks.is_empty() {
        log_warning(format!("No '{}' marker with a CTQ name found", options.marker));
    } else {
        log_success(format!("{} block(s)", blocks.len()));
        for block in &blocks {
            log_info_indent(format!("{} (rows {}..{})", block.ctq_name, block.start_row, block.end_row), 1);
        }
    }

    let records = extract_records(grid, &blocks, &mapping, info);
    let extracted = records.len();
    log_success(format!("Extracted {} records", extracted));

    let joined = add_management_code(records, master, &options.schema)?;

    let (mut records, filtered_out) = filter_by_date(joined.records, options.start_date, options.end_date);
    if filtered_out > 0 {
        log_info(format!("📅 {} record(s) outside the date range removed", filtered_out));
    }
    sort_records(&mut records);

    let unmatched = records.iter().filter(|r| r.management_code.is_none()).count();
    let summary = TransformSummary {
        date_col: header.col,
        date_row: header.row,
        mapped_dates: mapping.len(),
        first_date,
        last_date,
        blocks: blocks.iter().map(BlockSummary::from).collect(),
        extracted,
        filtered_out,
        records: records.len(),
        unmatched,
    };

    Ok(TransformOutput { records, summary })
}

/// Keep records whose date lies within the inclusive bounds.
///
/// Returns the kept records and the number removed.
pub fn filter_by_date(
    records: Vec<MeasurementRecord>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> (Vec<MeasurementRecord>, usize) {
    let before = records.len();
    let kept: Vec<MeasurementRecord> = records
        .into_iter()
        .filter(|r| start.map_or(true, |s| r.measurement_date >= s))
        .filter(|r| end.map_or(true, |e| r.measurement_date <= e))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Stable sort by `(measurement_date, ctq_name)`.
pub fn sort_records(records: &mut [MeasurementRecord]) {
    records.sort_by(|a, b| {
        a.measurement_date
            .cmp(&b.measurement_date)
            .then_with(|| a.ctq_name.cmp(&b.ctq_name))
    });
}

/// Run the verifier over pipeline output.
pub fn verify_output(
    records: &[MeasurementRecord],
    master: &MasterTable,
    options: &TransformOptions,
) -> PipelineResult<Verification> {
    Ok(verify(records, master, &options.schema)?)
}

/// Everything read from disk for one run.
#[derive(Debug, Clone)]
pub struct LoadedInputs {
    pub info: InfoMapping,
    pub grid: RawGrid,
    pub master: MasterTable,
}

/// Read the measurement source and the master.
///
/// A workbook input carries its own Information sheet; a CSV grid takes its
/// metadata from `info_path`. An explicit `info_path` always wins.
pub fn load_inputs(
    input: &Path,
    info_path: Option<&Path>,
    master_path: &Path,
    schema: &MasterSchema,
) -> PipelineResult<LoadedInputs> {
    log_info(format!("📖 Reading {}...", input.display()));

    let (mut info, grid) = if parser::has_extension(input, "csv") {
        let bytes = std::fs::read(input).map_err(crate::error::ReadError::from)?;
        (InfoMapping::new(), parser::read_csv_grid(&bytes)?)
    } else {
        workbook::read_measurement_workbook(input)?
    };

    if let Some(path) = info_path {
        info = parser::read_info_file(path)?;
    } else if info.is_empty() {
        log_warning("No information mapping given; metadata columns will be empty");
    }
    log_success(format!("Grid: {} rows × {} columns", grid.height(), grid.width()));

    let master = parser::read_table_file(master_path, &schema.sheet)?;

    Ok(LoadedInputs { info, grid, master })
}

/// Pipeline output together with the master it was joined against.
#[derive(Debug, Clone)]
pub struct WorkbookRun {
    pub output: TransformOutput,
    pub master: MasterTable,
}

/// Read both sources from disk and transform.
pub fn transform_workbooks(input: &Path, master_path: &Path, options: &TransformOptions) -> PipelineResult<WorkbookRun> {
    transform_files(input, None, master_path, options)
}

/// [`transform_workbooks`] with an explicit information file.
pub fn transform_files(
    input: &Path,
    info_path: Option<&Path>,
    master_path: &Path,
    options: &TransformOptions,
) -> PipelineResult<WorkbookRun> {
    let inputs = load_inputs(input, info_path, master_path, &options.schema)?;
    let output = transform_grid(&inputs.grid, &inputs.info, &inputs.master, options)?;
    Ok(WorkbookRun {
        output,
        master: inputs.master,
    })
}
