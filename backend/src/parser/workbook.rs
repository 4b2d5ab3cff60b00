//! Workbook (xlsx / xlsm / xls / ods) reading via calamine.
//!
//! Grids keep absolute sheet coordinates: calamine ranges start at the first
//! used cell, so leading empty rows and columns are restored before the grid
//! is handed to the scanner.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use chrono::NaiveDateTime;
use std::io::{BufReader, Read, Seek};

use crate::api::logs::log_info;
use crate::error::{ReadResult, SchemaError};
use crate::models::{CellValue, InfoMapping, MasterTable, RawGrid};

use super::{info_from_table, table_from_rows};

/// Sheet holding the organization metadata.
pub const INFO_SHEET: &str = "Information";

/// Convert one calamine cell.
///
/// Error cells (`#N/A`, `#DIV/0!`) read as empty.
pub fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => CellValue::Date(ndt),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map(CellValue::Date)
            .unwrap_or_else(|_| CellValue::text(s.as_str())),
        Data::DurationIso(s) => CellValue::text(s.as_str()),
    }
}

/// Grid in absolute sheet coordinates.
pub fn range_to_grid(range: &Range<Data>) -> RawGrid {
    let (row_offset, col_offset) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => return RawGrid::default(),
    };

    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; col_offset];
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }
    RawGrid::new(rows)
}

/// Header-first table from a used range.
pub fn range_to_table(range: &Range<Data>) -> MasterTable {
    let mut rows = range.rows().map(|row| row.iter().map(cell_from_data).collect::<Vec<_>>());
    match rows.next() {
        Some(headers) => table_from_rows(headers, rows.collect()),
        None => MasterTable::default(),
    }
}

fn sheet_range<RS>(workbook: &mut Sheets<RS>, sheet: &str) -> ReadResult<Range<Data>>
where
    RS: Read + Seek,
{
    let available = workbook.sheet_names().to_vec();
    if !available.iter().any(|name| name == sheet) {
        return Err(SchemaError::MissingSheet {
            sheet: sheet.to_string(),
            available,
        }
        .into());
    }
    Ok(workbook.worksheet_range(sheet)?)
}

fn open(path: &Path) -> ReadResult<Sheets<BufReader<std::fs::File>>> {
    Ok(open_workbook_auto(path)?)
}

/// Read one sheet as a header-first table.
pub fn read_table(path: &Path, sheet: &str) -> ReadResult<MasterTable> {
    let mut workbook = open(path)?;
    Ok(range_to_table(&sheet_range(&mut workbook, sheet)?))
}

/// Read a measurement workbook: the `Information` sheet, then the data sheet
/// it names.
pub fn read_measurement_workbook(path: &Path) -> ReadResult<(InfoMapping, RawGrid)> {
    let mut workbook = open(path)?;

    let info = info_from_table(&range_to_table(&sheet_range(&mut workbook, INFO_SHEET)?))?;
    let data_sheet = info.data_sheet()?.to_string();
    log_info(format!("📄 Reading data sheet '{}' from {}", data_sheet, path.display()));

    let grid = range_to_grid(&sheet_range(&mut workbook, &data_sheet)?);
    Ok((info, grid))
}

/// Read the master table from `sheet` of a workbook.
pub fn read_master_workbook(path: &Path, sheet: &str) -> ReadResult<MasterTable> {
    let table = read_table(path, sheet)?;
    log_info(format!(
        "📋 Master '{}': {} rows, {} columns",
        sheet,
        table.len(),
        table.headers.len()
    ));
    Ok(table)
}
