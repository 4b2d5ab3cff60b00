//! Domain models for the ctqflow pipeline.
//!
//! - [`CellValue`] - one heterogeneous spreadsheet cell
//! - [`RawGrid`] - an immutable 2-D grid with no header semantics
//! - [`DateMapping`] - column index → calendar date
//! - [`MeasurementBlock`] - rows belonging to one CTQ item
//! - [`InfoMapping`] - organization metadata from the Information sheet
//! - [`MeasurementRecord`] - the tidy output unit
//! - [`MasterTable`] - the specification master, as read
//! - [`SpecLimits`] / [`VerifiedRecord`] - verification output

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::SchemaError;

static THOUSANDS_GROUPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("static regex"));

fn parse_number(text: &str) -> Option<f64> {
    let plain = if THOUSANDS_GROUPED.is_match(text) {
        text.replace(',', "")
    } else {
        text.to_string()
    };
    plain.parse::<f64>().ok().filter(|n| n.is_finite())
}

// =============================================================================
// Column Labels
// =============================================================================

/// Column labels used by the measurement template and the master sheet.
pub mod columns {
    pub const FIRST_TIER_COMPANY: &str = "1차 업체명";
    pub const REGION: &str = "지역명";
    pub const SECOND_TIER_COMPANY: &str = "2차업체명";
    pub const MODEL: &str = "모델명";
    pub const OPERATOR: &str = "측정자";
    pub const EQUIPMENT: &str = "측정장비";
    pub const PART_NAME: &str = "부품명";
    pub const PART_NO: &str = "Part No";
    pub const CTQ_NAME: &str = "CTQ/P 관리항목명";
    pub const MEASUREMENT_DATE: &str = "측정일자";
    pub const MEASUREMENT_VALUE: &str = "측정값";
    pub const MANAGEMENT_CODE: &str = "관리번호";
    pub const USL: &str = "USL";
    pub const LSL: &str = "LSL";
    pub const TARGET: &str = "Target";
    pub const UCL: &str = "UCL";
    pub const LCL: &str = "LCL";
    pub const SPEC_OVER: &str = "spec_over";

    /// Information sheet key naming the measurement data sheet.
    pub const DATA_SHEET: &str = "Data_sheet";
}

// =============================================================================
// Cells
// =============================================================================

/// A single spreadsheet cell.
///
/// Deserializes from plain JSON scalars: `null`, booleans, numbers and strings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Date(NaiveDateTime),
    Text(String),
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    /// Build a text cell, mapping blank strings to [`CellValue::Empty`].
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }

    /// True for empty cells and whitespace-only text.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// The raw text of a text cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view: numbers directly, text when it parses as a float.
    ///
    /// Commas are accepted only as thousands grouping (`1,234.5`); a decimal
    /// comma such as `10,2` is not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => parse_number(s.trim()),
            _ => None,
        }
    }

    /// Display text; integral numbers are rendered without a fractional part.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Date(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::Date(dt)
    }
}

// =============================================================================
// Raw Grid
// =============================================================================

/// Immutable rows × columns of cells, addressed by `(row, col)`.
///
/// Ragged input is padded with empty cells to the widest row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<CellValue>>", into = "Vec<Vec<CellValue>>")]
pub struct RawGrid {
    rows: Vec<Vec<CellValue>>,
    width: usize,
}

impl RawGrid {
    pub fn new(mut rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, CellValue::Empty);
        }
        Self { rows, width }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.width == 0
    }

    /// Cell at `(row, col)`; out-of-range positions read as empty.
    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

impl From<Vec<Vec<CellValue>>> for RawGrid {
    fn from(rows: Vec<Vec<CellValue>>) -> Self {
        RawGrid::new(rows)
    }
}

impl From<RawGrid> for Vec<Vec<CellValue>> {
    fn from(grid: RawGrid) -> Self {
        grid.rows
    }
}

// =============================================================================
// Date Mapping
// =============================================================================

/// Column index → calendar date, ordered by column.
///
/// Dates may repeat across columns (several readings on the same day).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateMapping {
    entries: Vec<(usize, NaiveDate)>,
}

impl DateMapping {
    /// Build from `(column, date)` pairs. A later pair for the same column wins.
    pub fn new(pairs: impl IntoIterator<Item = (usize, NaiveDate)>) -> Self {
        let map: BTreeMap<usize, NaiveDate> = pairs.into_iter().collect();
        Self {
            entries: map.into_iter().collect(),
        }
    }

    pub fn get(&self, col: usize) -> Option<NaiveDate> {
        self.entries
            .binary_search_by_key(&col, |(c, _)| *c)
            .ok()
            .map(|i| self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, NaiveDate)> + '_ {
        self.entries.iter().copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|(c, _)| *c)
    }

    pub fn first_column(&self) -> Option<usize> {
        self.entries.first().map(|(c, _)| *c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Blocks
// =============================================================================

/// Rows `[start_row, end_row)` holding the measurements of one CTQ item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementBlock {
    pub start_row: usize,
    pub end_row: usize,
    pub ctq_name: String,
}

impl MeasurementBlock {
    pub fn rows(&self) -> std::ops::Range<usize> {
        self.start_row..self.end_row
    }

    pub fn len(&self) -> usize {
        self.end_row.saturating_sub(self.start_row)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Information Mapping
// =============================================================================

/// Key/value metadata from the Information sheet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfoMapping(BTreeMap<String, String>);

impl InfoMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into().trim().to_string(), v.into()))
                .collect(),
        )
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into().trim().to_string(), value.into());
    }

    /// Trimmed value for `key`, or an empty string.
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(|v| v.trim()).unwrap_or("")
    }

    /// Trimmed value for a key that must be present and non-empty.
    pub fn require(&self, key: &str) -> Result<&str, SchemaError> {
        match self.get(key) {
            "" => Err(SchemaError::MissingInfoKey(key.to_string())),
            v => Ok(v),
        }
    }

    pub fn data_sheet(&self) -> Result<&str, SchemaError> {
        self.require(columns::DATA_SHEET)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Measurement Records
// =============================================================================

/// One tidy observation: an entity measured for one CTQ item on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Filled by the master join; `None` when no master row matched.
    pub management_code: Option<String>,
    pub first_tier_company: String,
    pub region: String,
    pub second_tier_company: String,
    pub model: String,
    pub operator: String,
    pub equipment: String,
    pub part_name: String,
    pub ctq_name: String,
    pub measurement_date: NaiveDate,
    /// Raw cell value, unconverted.
    pub measurement_value: CellValue,
    pub part_no: String,
}

impl MeasurementRecord {
    /// Metadata-only record built from the information mapping.
    pub fn from_info(info: &InfoMapping, ctq_name: &str, date: NaiveDate, value: CellValue) -> Self {
        Self {
            management_code: None,
            first_tier_company: info.get(columns::FIRST_TIER_COMPANY).to_string(),
            region: info.get(columns::REGION).to_string(),
            second_tier_company: info.get(columns::SECOND_TIER_COMPANY).to_string(),
            model: info.get(columns::MODEL).to_string(),
            operator: info.get(columns::OPERATOR).to_string(),
            equipment: info.get(columns::EQUIPMENT).to_string(),
            part_name: info.get(columns::PART_NAME).to_string(),
            ctq_name: ctq_name.trim().to_string(),
            measurement_date: date,
            measurement_value: value,
            part_no: info.get(columns::PART_NO).to_string(),
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.measurement_value.as_f64()
    }

    /// Value of a key column, by its template label.
    pub fn key_field(&self, column: &str) -> Option<&str> {
        let v = match column {
            columns::FIRST_TIER_COMPANY => &self.first_tier_company,
            columns::REGION => &self.region,
            columns::SECOND_TIER_COMPANY => &self.second_tier_company,
            columns::MODEL => &self.model,
            columns::PART_NAME => &self.part_name,
            columns::CTQ_NAME => &self.ctq_name,
            columns::PART_NO => &self.part_no,
            columns::OPERATOR => &self.operator,
            columns::EQUIPMENT => &self.equipment,
            _ => return None,
        };
        Some(v)
    }
}

// =============================================================================
// Master Table
// =============================================================================

/// The specification master as read from its sheet: a header row plus rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MasterTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl MasterTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let headers = headers.into_iter().map(|h| h.trim().to_string()).collect();
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Verification Output
// =============================================================================

/// Specification and control limits of one management code.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecLimits {
    pub usl: Option<f64>,
    pub lsl: Option<f64>,
    pub target: Option<f64>,
    pub ucl: Option<f64>,
    pub lcl: Option<f64>,
}

impl SpecLimits {
    /// True when `value` lies outside a present limit. Absent limits never flag.
    pub fn is_violated_by(&self, value: f64) -> bool {
        self.usl.is_some_and(|usl| value > usl) || self.lsl.is_some_and(|lsl| value < lsl)
    }
}

/// Spec row filtered to the codes actually measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecRow {
    pub management_code: String,
    pub part_name: String,
    pub ctq_name: String,
    pub limits: SpecLimits,
}

/// Out-of-spec marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecOver {
    #[serde(rename = "NG")]
    Ng,
}

impl fmt::Display for SpecOver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NG")
    }
}

/// A record annotated with its limits and out-of-spec flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedRecord {
    #[serde(flatten)]
    pub record: MeasurementRecord,
    /// `None` when no spec row exists for the record's management code.
    pub limits: Option<SpecLimits>,
    pub spec_over: Option<SpecOver>,
}

impl VerifiedRecord {
    pub fn is_ng(&self) -> bool {
        self.spec_over.is_some()
    }
}
