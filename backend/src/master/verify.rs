//! Specification-limit verification of joined records.
//!
//! A record is `NG` when `(USL present AND value > USL) OR (LSL present AND
//! value < LSL)`. An undefined limit is no constraint: records whose code has
//! no spec row, records without a code, and non-numeric values are never
//! flagged.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::SchemaError;
use crate::models::{columns, MasterTable, MeasurementRecord, SpecLimits, SpecOver, SpecRow, VerifiedRecord};

use super::{MasterSchema, LIMIT_COLUMNS};

/// Full annotated dataset plus the violations subset.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub full: Vec<VerifiedRecord>,
    pub violations: Vec<VerifiedRecord>,
    /// Spec rows of the codes present in the records.
    pub specs: Vec<SpecRow>,
    /// Limit columns absent from the master (treated as undefined).
    pub missing_limit_columns: Vec<String>,
}

impl Verification {
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }
}

/// Spec rows for the management codes that appear in `records`.
///
/// The first row per code wins. Returns the spec rows and the limit columns
/// the master does not have.
pub fn spec_for_measured(
    records: &[MeasurementRecord],
    master: &MasterTable,
    schema: &MasterSchema,
) -> Result<(Vec<SpecRow>, Vec<String>), SchemaError> {
    let renamed = schema.apply(master);
    let code_idx = renamed
        .column_index(columns::MANAGEMENT_CODE)
        .ok_or_else(|| SchemaError::MissingMasterColumns(vec![columns::MANAGEMENT_CODE.to_string()]))?;

    let missing: Vec<String> = LIMIT_COLUMNS
        .iter()
        .filter(|c| !renamed.has_column(c))
        .map(|c| c.to_string())
        .collect();

    let used: BTreeSet<&str> = records.iter().filter_map(|r| r.management_code.as_deref()).collect();
    let limit = |row: usize, name: &str| {
        renamed
            .column_index(name)
            .and_then(|idx| renamed.cell(row, idx).as_f64())
    };
    let text = |row: usize, name: &str| {
        renamed
            .column_index(name)
            .map(|idx| renamed.cell(row, idx).to_text().trim().to_string())
            .unwrap_or_default()
    };

    let mut specs: Vec<SpecRow> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut conflicting = 0;

    for row in 0..renamed.len() {
        let code = renamed.cell(row, code_idx).to_text().trim().to_string();
        if !used.contains(code.as_str()) {
            continue;
        }

        let spec = SpecRow {
            management_code: code.clone(),
            part_name: text(row, columns::PART_NAME),
            ctq_name: text(row, columns::CTQ_NAME),
            limits: SpecLimits {
                usl: limit(row, columns::USL),
                lsl: limit(row, columns::LSL),
                target: limit(row, columns::TARGET),
                ucl: limit(row, columns::UCL),
                lcl: limit(row, columns::LCL),
            },
        };

        match seen.get(&code) {
            Some(&i) if specs[i].limits != spec.limits => conflicting += 1,
            Some(_) => {}
            None => {
                seen.insert(code, specs.len());
                specs.push(spec);
            }
        }
    }

    if conflicting > 0 {
        log_warning(format!("{} duplicate spec row(s) with different limits ignored", conflicting));
    }

    Ok((specs, missing))
}

/// Flag out-of-spec records.
pub fn verify(
    records: &[MeasurementRecord],
    master: &MasterTable,
    schema: &MasterSchema,
) -> Result<Verification, SchemaError> {
    let (specs, missing_limit_columns) = spec_for_measured(records, master, schema)?;
    if !missing_limit_columns.is_empty() {
        log_warning(format!(
            "Master is missing limit column(s): {} (treated as undefined)",
            missing_limit_columns.join(", ")
        ));
    }
    log_info(format!("📏 Verifying {} records against {} spec row(s)...", records.len(), specs.len()));

    let by_code: HashMap<&str, SpecLimits> = specs
        .iter()
        .map(|s| (s.management_code.as_str(), s.limits))
        .collect();

    let full: Vec<VerifiedRecord> = records
        .iter()
        .map(|record| {
            let limits = record
                .management_code
                .as_deref()
                .and_then(|code| by_code.get(code).copied());
            let spec_over = match (limits, record.value()) {
                (Some(l), Some(v)) if l.is_violated_by(v) => Some(SpecOver::Ng),
                _ => None,
            };
            VerifiedRecord {
                record: record.clone(),
                limits,
                spec_over,
            }
        })
        .collect();

    let violations: Vec<VerifiedRecord> = full.iter().filter(|r| r.is_ng()).cloned().collect();

    if violations.is_empty() {
        log_success("No out-of-spec values");
    } else {
        log_warning(format!("{} of {} values out of spec", violations.len(), full.len()));
    }

    Ok(Verification {
        full,
        violations,
        specs,
        missing_limit_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, InfoMapping};
    use chrono::NaiveDate;

    fn master(rows: Vec<(&str, Option<f64>, Option<f64>)>) -> MasterTable {
        let headers = ["관리번호", "부품", "공정CTQ/CTP 관리 항목명", "USL", "LSL", "Target", "UCL", "LCL"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cell = |v: Option<f64>| v.map(CellValue::Number).unwrap_or_default();
        let rows = rows
            .into_iter()
            .map(|(code, usl, lsl)| {
                vec![
                    code.into(),
                    "Bracket".into(),
                    "Torque".into(),
                    cell(usl),
                    cell(lsl),
                    CellValue::Number(10.0),
                    CellValue::Empty,
                    CellValue::Empty,
                ]
            })
            .collect();
        MasterTable::new(headers, rows)
    }

    fn record(code: Option<&str>, value: CellValue) -> MeasurementRecord {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut r = MeasurementRecord::from_info(&InfoMapping::new(), "Torque", date, value);
        r.management_code = code.map(str::to_string);
        r
    }

    #[test]
    fn test_flags_outside_limits() {
        let master = master(vec![("MC-1", Some(10.5), Some(9.5))]);
        let records = vec![
            record(Some("MC-1"), CellValue::Number(10.8)),
            record(Some("MC-1"), CellValue::Number(10.0)),
            record(Some("MC-1"), CellValue::Number(9.4)),
        ];
        let result = verify(&records, &master, &MasterSchema::default()).unwrap();

        assert_eq!(result.full.len(), 3);
        assert_eq!(result.full[0].spec_over, Some(SpecOver::Ng));
        assert_eq!(result.full[1].spec_over, None);
        assert_eq!(result.full[2].spec_over, Some(SpecOver::Ng));
        assert_eq!(result.violation_count(), 2);
    }

    #[test]
    fn test_absent_usl_never_flags_high_values() {
        let master = master(vec![("MC-1", None, Some(9.5))]);
        let result = verify(&[record(Some("MC-1"), CellValue::Number(10.8))], &master, &MasterSchema::default()).unwrap();
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_unmatched_code_never_violates() {
        let master = master(vec![("MC-1", Some(10.5), Some(9.5))]);
        let records = vec![
            record(Some("MC-1"), CellValue::Number(11.0)),
            record(None, CellValue::Number(99.0)),
            record(Some("MC-404"), CellValue::Number(99.0)),
        ];
        let result = verify(&records, &master, &MasterSchema::default()).unwrap();

        assert_eq!(result.full.len(), 3);
        assert_eq!(result.full[1].record.management_code, None);
        assert_eq!(result.full[1].limits, None);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].record.management_code.as_deref(), Some("MC-1"));
    }

    #[test]
    fn test_text_values() {
        let master = master(vec![("MC-1", Some(10.5), Some(9.5))]);
        let records = vec![
            record(Some("MC-1"), CellValue::Text("10.9".into())),
            record(Some("MC-1"), CellValue::Text("OK".into())),
        ];
        let result = verify(&records, &master, &MasterSchema::default()).unwrap();
        assert_eq!(result.violations.len(), 1);
    }

    #[test]
    fn test_decimal_comma_text_is_not_flagged() {
        let master = master(vec![("MC-1", Some(10.5), Some(9.5))]);
        let records = vec![
            record(Some("MC-1"), CellValue::Text("10,2".into())),
            record(Some("MC-1"), CellValue::Text("1,050".into())),
        ];
        let result = verify(&records, &master, &MasterSchema::default()).unwrap();

        assert_eq!(result.full[0].spec_over, None);
        assert_eq!(result.full[1].spec_over, Some(SpecOver::Ng));
        assert_eq!(result.violation_count(), 1);
    }

    #[test]
    fn test_widening_limits_never_adds_violations() {
        let values = [8.0, 9.4, 9.5, 9.9, 10.0, 10.5, 10.6, 12.0];
        let records: Vec<_> = values.iter().map(|v| record(Some("MC-1"), CellValue::Number(*v))).collect();

        let bands = [
            (Some(10.0), Some(9.9)),
            (Some(10.5), Some(9.5)),
            (Some(11.0), Some(9.0)),
            (None, Some(9.0)),
            (None, None),
        ];
        let counts: Vec<usize> = bands
            .iter()
            .map(|&(usl, lsl)| {
                verify(&records, &master(vec![("MC-1", usl, lsl)]), &MasterSchema::default())
                    .unwrap()
                    .violation_count()
            })
            .collect();

        assert!(counts.windows(2).all(|w| w[1] <= w[0]), "counts: {:?}", counts);
        assert_eq!(*counts.last().unwrap(), 0);
    }

    #[test]
    fn test_spec_rows_filtered_to_used_codes() {
        let master = master(vec![("MC-1", Some(1.0), None), ("MC-2", Some(2.0), None), ("MC-1", Some(1.0), None)]);
        let (specs, missing) = spec_for_measured(&[record(Some("MC-1"), CellValue::Number(0.5))], &master, &MasterSchema::default()).unwrap();

        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].part_name, "Bracket");
        assert_eq!(specs[0].limits.target, Some(10.0));
        assert!(missing.is_empty());
    }

    #[test]
    fn test_missing_code_column_fails() {
        let master = MasterTable::new(vec!["USL".into()], vec![]);
        assert!(verify(&[], &master, &MasterSchema::default()).is_err());
    }
}
