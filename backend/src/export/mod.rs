//! CSV / JSON output of tidy and verified records.
//!
//! Column order is fixed: the management code first, then the template
//! labels, with limits and `spec_over` appended for verified output.

use chrono::NaiveDate;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::ExportResult;
use crate::models::{columns, MeasurementRecord, VerifiedRecord};

/// Columns of a tidy record, in output order.
pub const RECORD_HEADERS: [&str; 12] = [
    columns::MANAGEMENT_CODE,
    columns::FIRST_TIER_COMPANY,
    columns::REGION,
    columns::SECOND_TIER_COMPANY,
    columns::MODEL,
    columns::OPERATOR,
    columns::EQUIPMENT,
    columns::PART_NAME,
    columns::CTQ_NAME,
    columns::MEASUREMENT_DATE,
    columns::MEASUREMENT_VALUE,
    columns::PART_NO,
];

/// Extra columns of a verified record.
pub const VERIFIED_EXTRA_HEADERS: [&str; 6] = [
    columns::USL,
    columns::LSL,
    columns::TARGET,
    columns::UCL,
    columns::LCL,
    columns::SPEC_OVER,
];

fn record_fields(r: &MeasurementRecord) -> Vec<String> {
    vec![
        r.management_code.clone().unwrap_or_default(),
        r.first_tier_company.clone(),
        r.region.clone(),
        r.second_tier_company.clone(),
        r.model.clone(),
        r.operator.clone(),
        r.equipment.clone(),
        r.part_name.clone(),
        r.ctq_name.clone(),
        r.measurement_date.format("%Y-%m-%d").to_string(),
        r.measurement_value.to_text(),
        r.part_no.clone(),
    ]
}

fn limit(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

/// Write tidy records as CSV.
pub fn write_records_csv<W: Write>(writer: W, records: &[MeasurementRecord]) -> ExportResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(RECORD_HEADERS)?;
    for r in records {
        wtr.write_record(record_fields(r))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write verified records as CSV, `spec_over` last.
pub fn write_verified_csv<W: Write>(writer: W, records: &[VerifiedRecord]) -> ExportResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(RECORD_HEADERS.iter().chain(VERIFIED_EXTRA_HEADERS.iter()))?;

    for v in records {
        let mut fields = record_fields(&v.record);
        let l = v.limits.unwrap_or_default();
        fields.extend([limit(l.usl), limit(l.lsl), limit(l.target), limit(l.ucl), limit(l.lcl)]);
        fields.push(v.spec_over.map(|s| s.to_string()).unwrap_or_default());
        wtr.write_record(&fields)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Pretty JSON of any serializable output.
pub fn write_json<W: Write, T: Serialize + ?Sized>(writer: W, value: &T) -> ExportResult<()> {
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Create `path` and hand a buffered writer to `write`.
pub fn to_file<F>(path: &Path, write: F) -> ExportResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> ExportResult<()>,
{
    let mut out = BufWriter::new(File::create(path)?);
    write(&mut out)?;
    out.flush()?;
    Ok(())
}

fn clean(s: &str) -> String {
    s.trim().replace('/', "-")
}

/// File name for an export of `records`, stamped with `today`.
///
/// Built from the first record's metadata; the CTQ name is included only for
/// `Torque` exports. Returns `empty_data` when there are no records.
pub fn suggest_filename(records: &[MeasurementRecord], today: NaiveDate) -> String {
    let Some(first) = records.first() else {
        return "empty_data".to_string();
    };

    let mut parts = vec![
        "CTQ".to_string(),
        clean(&first.first_tier_company),
        clean(&first.region),
        clean(&first.second_tier_company),
        clean(&first.model),
        clean(&first.part_name),
    ];
    if first.ctq_name.trim() == "Torque" {
        parts.push(clean(&first.ctq_name));
    }
    parts.push(today.format("%Y%m%d").to_string());

    format!("{}.csv", parts.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, InfoMapping, SpecLimits, SpecOver};

    fn record(ctq: &str, value: CellValue) -> MeasurementRecord {
        let info = InfoMapping::from_pairs([
            (columns::FIRST_TIER_COMPANY, "Hanil"),
            (columns::REGION, "Changwon"),
            (columns::SECOND_TIER_COMPANY, "Daesung"),
            (columns::MODEL, "WM/100"),
            (columns::PART_NAME, "Bracket"),
        ]);
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let mut r = MeasurementRecord::from_info(&info, ctq, date, value);
        r.management_code = Some("MC-001".into());
        r
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_filename_torque_includes_ctq() {
        let name = suggest_filename(&[record("Torque", CellValue::Number(1.0))], today());
        assert_eq!(name, "CTQ_Hanil_Changwon_Daesung_WM-100_Bracket_Torque_20240309.csv");
    }

    #[test]
    fn test_filename_other_ctq_omitted() {
        let name = suggest_filename(&[record("Gap Width", CellValue::Number(1.0))], today());
        assert_eq!(name, "CTQ_Hanil_Changwon_Daesung_WM-100_Bracket_20240309.csv");
        assert_eq!(suggest_filename(&[], today()), "empty_data");
    }

    #[test]
    fn test_records_csv_code_first() {
        let mut buf = Vec::new();
        write_records_csv(&mut buf, &[record("Torque", CellValue::Number(10.25))]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert!(lines.next().unwrap().starts_with("관리번호,1차 업체명"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("MC-001,Hanil"));
        assert!(row.contains("2024-01-05,10.25"));
    }

    #[test]
    fn test_verified_csv_spec_over_last() {
        let v = VerifiedRecord {
            record: record("Torque", CellValue::Number(10.8)),
            limits: Some(SpecLimits {
                usl: Some(10.5),
                lsl: Some(9.5),
                ..Default::default()
            }),
            spec_over: Some(SpecOver::Ng),
        };
        let mut buf = Vec::new();
        write_verified_csv(&mut buf, &[v]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert!(lines.next().unwrap().ends_with("USL,LSL,Target,UCL,LCL,spec_over"));
        assert!(lines.next().unwrap().ends_with("10.5,9.5,,,,NG"));
    }

    #[test]
    fn test_to_file_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let records = vec![record("Torque", CellValue::Number(1.0))];
        to_file(&path, |out| write_json(out, &records)).unwrap();

        let back: Vec<MeasurementRecord> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, records);
    }
}
