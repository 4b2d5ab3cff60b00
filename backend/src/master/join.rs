//! Left join of tidy records against the master on the composite key.

use std::collections::HashMap;

use crate::api::logs::{log_info, log_success, log_warning, log_warning_indent};
use crate::error::SchemaError;
use crate::models::{columns, MasterTable, MeasurementRecord};

use super::{normalize_key, MasterSchema, KEY_COLUMNS};

type CompositeKey = [String; KEY_COLUMNS.len()];

/// Normalized composite key → management code.
#[derive(Debug, Clone, Default)]
pub struct MasterIndex {
    codes: HashMap<CompositeKey, String>,
    /// Keys that mapped to more than one distinct code (first one kept).
    conflicts: Vec<(CompositeKey, String)>,
}

impl MasterIndex {
    /// Rename the master's headers and index it by composite key.
    ///
    /// Rows without a management code are not indexed.
    pub fn build(master: &MasterTable, schema: &MasterSchema) -> Result<Self, SchemaError> {
        let renamed = schema.apply(master);
        MasterSchema::check_join_columns(&renamed)?;

        let key_idx: Vec<usize> = KEY_COLUMNS
            .iter()
            .filter_map(|c| renamed.column_index(c))
            .collect();
        let code_idx = renamed
            .column_index(columns::MANAGEMENT_CODE)
            .ok_or_else(|| SchemaError::MissingMasterColumns(vec![columns::MANAGEMENT_CODE.to_string()]))?;

        let mut index = MasterIndex::default();
        for row in 0..renamed.len() {
            let code = renamed.cell(row, code_idx).to_text().trim().to_string();
            if code.is_empty() {
                continue;
            }
            let key: CompositeKey = std::array::from_fn(|i| normalize_key(&renamed.cell(row, key_idx[i]).to_text()));

            match index.codes.get(&key) {
                Some(existing) if *existing != code => index.conflicts.push((key, code)),
                Some(_) => {}
                None => {
                    index.codes.insert(key, code);
                }
            }
        }

        Ok(index)
    }

    fn record_key(record: &MeasurementRecord) -> CompositeKey {
        std::array::from_fn(|i| normalize_key(record.key_field(KEY_COLUMNS[i]).unwrap_or("")))
    }

    /// Management code of a record, if the master has its key.
    pub fn lookup(&self, record: &MeasurementRecord) -> Option<&str> {
        self.codes.get(&Self::record_key(record)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// `(joined key, ignored code)` for every conflicting master row.
    pub fn conflicts(&self) -> impl Iterator<Item = (String, &str)> {
        self.conflicts.iter().map(|(k, c)| (k.join(" | "), c.as_str()))
    }
}

/// Records after the join plus match counts.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub records: Vec<MeasurementRecord>,
    pub matched: usize,
    pub unmatched: usize,
}

/// Attach management codes to `records`.
///
/// Every record is kept; unmatched ones get `management_code = None`.
/// Fails when the master lacks any join column.
pub fn add_management_code(
    records: Vec<MeasurementRecord>,
    master: &MasterTable,
    schema: &MasterSchema,
) -> Result<JoinOutcome, SchemaError> {
    let index = MasterIndex::build(master, schema)?;
    log_info(format!("🔗 Joining {} records against {} master keys...", records.len(), index.len()));

    let conflicts: Vec<_> = index.conflicts().collect();
    if !conflicts.is_empty() {
        log_warning(format!("{} master row(s) repeat a key with a different management code", conflicts.len()));
        for (key, code) in conflicts.iter().take(3) {
            log_warning_indent(format!("{} → {} (ignored)", key, code), 1);
        }
    }

    let mut matched = 0;
    let records: Vec<MeasurementRecord> = records
        .into_iter()
        .map(|mut record| {
            record.management_code = index.lookup(&record).map(str::to_string);
            if record.management_code.is_some() {
                matched += 1;
            }
            record
        })
        .collect();
    let unmatched = records.len() - matched;

    if unmatched > 0 {
        log_warning(format!("{} record(s) have no matching master row", unmatched));
    } else {
        log_success(format!("All {} records matched a management code", matched));
    }

    Ok(JoinOutcome {
        records,
        matched,
        unmatched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, InfoMapping};
    use chrono::NaiveDate;

    fn master_headers() -> Vec<String> {
        ["관리번호", "1차 업체명", "지역명", "2차 업체명", "모델명", "부품", "공정CTQ/CTP 관리 항목명", "Part No", "USL", "LSL"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn master_row(code: &str, ctq: &str, part_no: CellValue) -> Vec<CellValue> {
        vec![
            code.into(),
            "Hanil".into(),
            "Changwon".into(),
            "Daesung".into(),
            "WM-100".into(),
            "Bracket".into(),
            ctq.into(),
            part_no,
            CellValue::Number(10.5),
            CellValue::Number(9.5),
        ]
    }

    fn record(ctq: &str) -> MeasurementRecord {
        let info = InfoMapping::from_pairs([
            (columns::FIRST_TIER_COMPANY, "Hanil "),
            (columns::REGION, "changwon"),
            (columns::SECOND_TIER_COMPANY, "Daesung"),
            (columns::MODEL, "WM 100"),
            (columns::PART_NAME, "Bracket"),
            (columns::PART_NO, "12345"),
        ]);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        MeasurementRecord::from_info(&info, ctq, date, CellValue::Number(10.0))
    }

    #[test]
    fn test_join_normalizes_both_sides() {
        let master = MasterTable::new(
            master_headers(),
            vec![
                master_row("MC-001", "Torque", CellValue::Number(12345.0)),
                master_row("MC-002", "Gap-Width", CellValue::Number(12345.0)),
            ],
        );
        let outcome = add_management_code(vec![record("Torque"), record("Gap Width")], &master, &MasterSchema::default()).unwrap();

        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.records[0].management_code.as_deref(), Some("MC-001"));
        assert_eq!(outcome.records[1].management_code.as_deref(), Some("MC-002"));
    }

    #[test]
    fn test_unmatched_records_kept() {
        let master = MasterTable::new(master_headers(), vec![master_row("MC-001", "Torque", "12345".into())]);
        let outcome = add_management_code(vec![record("Torque"), record("Flatness")], &master, &MasterSchema::default()).unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.unmatched, 1);
        assert_eq!(outcome.records[1].management_code, None);
    }

    #[test]
    fn test_missing_master_column_fails() {
        let mut headers = master_headers();
        headers.retain(|h| h != "Part No");
        let master = MasterTable::new(headers, vec![]);
        let err = add_management_code(vec![record("Torque")], &master, &MasterSchema::default()).unwrap_err();
        assert_eq!(err, SchemaError::MissingMasterColumns(vec!["Part No".into()]));
    }

    #[test]
    fn test_conflicting_codes_first_wins() {
        let master = MasterTable::new(
            master_headers(),
            vec![
                master_row("MC-001", "Torque", "12345".into()),
                master_row("MC-009", " torque ", "12345".into()),
            ],
        );
        let index = MasterIndex::build(&master, &MasterSchema::default()).unwrap();
        assert_eq!(index.lookup(&record("Torque")), Some("MC-001"));
        assert_eq!(index.conflicts().count(), 1);
    }

    #[test]
    fn test_blank_codes_not_indexed() {
        let master = MasterTable::new(master_headers(), vec![master_row("  ", "Torque", "12345".into())]);
        let index = MasterIndex::build(&master, &MasterSchema::default()).unwrap();
        assert!(index.is_empty());
    }
}
