//! Readers turning CSV exports and workbooks into grids and tables.
//!
//! Nothing here knows about markers or dates: CSV sources become a header-less
//! [`RawGrid`] or a header-first [`MasterTable`], with encoding and delimiter
//! auto-detection. Workbook sources live in [`workbook`].

pub mod workbook;

use std::path::Path;

use crate::error::{ReadError, ReadResult, SchemaError};
use crate::models::{CellValue, InfoMapping, MasterTable, RawGrid};

/// Information sheet key column.
pub const INFO_KEY_COLUMN: &str = "Contents";
/// Information sheet value column.
pub const INFO_VALUE_COLUMN: &str = "Value";

/// Detect the encoding of raw bytes using chardet
///
/// Valid UTF-8 is taken as UTF-8 without asking the detector.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "euc-kr" | "cp949" | "uhc" | "ks_c_5601-1987" => "euc-kr".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> ReadResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match String::from_utf8(bytes.to_vec()) {
            Ok(s) => s,
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
        "euc-kr" | "cp949" => decode_with(encoding_rs::EUC_KR, bytes, encoding)?,
        "iso-8859-1" | "latin-1" | "latin1" => decode_with(encoding_rs::WINDOWS_1252, bytes, encoding)?,
        "windows-1252" | "cp1252" => decode_with(encoding_rs::WINDOWS_1252, bytes, encoding)?,
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    Ok(decoded)
}

fn decode_with(enc: &'static encoding_rs::Encoding, bytes: &[u8], label: &str) -> ReadResult<String> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors {
        return Err(ReadError::Encoding(label.to_string()));
    }
    Ok(text.into_owned())
}

/// Detect the delimiter by counting occurrences in the first non-empty line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Type a raw CSV field: blank → empty, numeric → number, else text.
pub fn typed_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(raw.to_string()),
    }
}

/// Keep a raw CSV field as text; blank → empty.
fn text_cell(raw: &str) -> CellValue {
    if raw.trim().is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(raw.to_string())
    }
}

fn csv_rows(content: &str, delimiter: char, cell: fn(&str) -> CellValue) -> ReadResult<Vec<Vec<CellValue>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(cell).collect());
    }
    Ok(rows)
}

/// Decoded content plus what was detected.
#[derive(Debug, Clone)]
pub struct DecodedSource {
    pub content: String,
    pub encoding: String,
    pub delimiter: char,
}

/// Detect encoding and delimiter, then decode.
pub fn decode_auto(bytes: &[u8]) -> ReadResult<DecodedSource> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ReadError::EmptySource);
    }
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    Ok(DecodedSource {
        content,
        encoding,
        delimiter,
    })
}

/// Parse CSV bytes as a header-less grid.
pub fn read_csv_grid(bytes: &[u8]) -> ReadResult<RawGrid> {
    let source = decode_auto(bytes)?;
    Ok(RawGrid::new(csv_rows(&source.content, source.delimiter, typed_cell)?))
}

/// Parse CSV bytes as a table whose first row holds the headers.
///
/// Fields stay text so key values such as `0123` survive the join; limits are
/// read through [`CellValue::as_f64`].
pub fn read_csv_table(bytes: &[u8]) -> ReadResult<MasterTable> {
    let source = decode_auto(bytes)?;
    let mut rows = csv_rows(&source.content, source.delimiter, text_cell)?.into_iter();
    let headers = rows.next().ok_or(ReadError::EmptySource)?;
    Ok(table_from_rows(headers, rows.collect()))
}

/// Header cells become column names; fully blank rows are dropped.
pub fn table_from_rows(headers: Vec<CellValue>, rows: Vec<Vec<CellValue>>) -> MasterTable {
    let headers = headers.iter().map(CellValue::to_text).collect();
    let rows = rows
        .into_iter()
        .filter(|row| row.iter().any(|c| !c.is_missing()))
        .collect();
    MasterTable::new(headers, rows)
}

/// Build the information mapping from a `Contents` / `Value` table.
pub fn info_from_table(table: &MasterTable) -> Result<InfoMapping, SchemaError> {
    let (key_idx, value_idx) = match (table.column_index(INFO_KEY_COLUMN), table.column_index(INFO_VALUE_COLUMN)) {
        (Some(k), Some(v)) => (k, v),
        _ => {
            return Err(SchemaError::MissingInfoColumns {
                key_column: INFO_KEY_COLUMN.to_string(),
                value_column: INFO_VALUE_COLUMN.to_string(),
            })
        }
    };

    let mut info = InfoMapping::new();
    for row in 0..table.len() {
        let key = table.cell(row, key_idx).to_text();
        if key.trim().is_empty() {
            continue;
        }
        info.insert(key, table.cell(row, value_idx).to_text());
    }
    Ok(info)
}

/// Read a table from a CSV file, or from `sheet` of a workbook.
pub fn read_table_file(path: &Path, sheet: &str) -> ReadResult<MasterTable> {
    if has_extension(path, "csv") {
        let bytes = std::fs::read(path)?;
        read_csv_table(&bytes)
    } else {
        workbook::read_master_workbook(path, sheet)
    }
}

/// Read an information mapping from a JSON object or a `Contents`/`Value` CSV.
pub fn read_info_file(path: &Path) -> ReadResult<InfoMapping> {
    let bytes = std::fs::read(path)?;
    if has_extension(path, "json") {
        Ok(serde_json::from_slice(&bytes)?)
    } else {
        Ok(info_from_table(&read_csv_table(&bytes)?)?)
    }
}

pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
