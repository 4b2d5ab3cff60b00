//! Expands measurement blocks into tidy long-format records.

use crate::models::{DateMapping, InfoMapping, MeasurementBlock, MeasurementRecord, RawGrid};

/// Emit one record per non-missing cell in every block × mapped column.
///
/// Values pass through unchanged; numeric interpretation is left to the
/// verifier and analysis stages. Order follows block, row, then column, but
/// callers needing an order must sort explicitly.
pub fn extract_records(
    grid: &RawGrid,
    blocks: &[MeasurementBlock],
    mapping: &DateMapping,
    info: &InfoMapping,
) -> Vec<MeasurementRecord> {
    let mut records = Vec::new();

    for block in blocks {
        for row in block.rows().filter(|&r| r < grid.height()) {
            for (col, date) in mapping.iter() {
                let cell = grid.get(row, col);
                if cell.is_missing() {
                    continue;
                }
                records.push(MeasurementRecord::from_info(info, &block.ctq_name, date, cell.clone()));
            }
        }
    }

    records
}
