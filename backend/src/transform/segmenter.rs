//! Splits a measurement sheet into per-CTQ blocks at marker cells.
//!
//! Sheets repeat a fixed-row template per CTQ item, but the number of rows per
//! item varies. The only reliable boundary is the marker cell:
//!
//! ```text
//!        col 0     col 1        col 2       col 3
//! row 4  No.       Item         2024-01-01  2024-01-02   <- date row
//! row 5  POINT 1   Torque                                <- block "Torque"
//! row 6            #1           10.1        10.2
//! row 7            #2           10.0        10.3
//! row 8  POINT 2   Gap-Width                             <- block "Gap Width"
//! row 9            #1           0.51        0.49
//! row 10                                                 <- trailing block ends
//! ```

use crate::models::{DateMapping, MeasurementBlock, RawGrid};

pub const DEFAULT_MARKER: &str = "POINT";

/// Default marker search columns: 0 through 10.
pub fn default_search_cols() -> Vec<usize> {
    (0..=10).collect()
}

/// A marker row, whether or not its CTQ name is usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerHit {
    pub row: usize,
    pub col: usize,
    /// Normalized CTQ name; `None` when missing or blank.
    pub ctq_name: Option<String>,
}

/// Normalize a CTQ item name: hyphens become spaces, outer whitespace goes.
pub fn normalize_ctq_name(raw: &str) -> String {
    raw.replace('-', " ").trim().to_string()
}

/// Find marker rows from `start_row` downward.
///
/// In each row only the first matching search column counts.
pub fn find_markers(grid: &RawGrid, start_row: usize, search_cols: &[usize], marker: &str) -> Vec<MarkerHit> {
    let marker = marker.trim().to_uppercase();
    let cols: Vec<usize> = search_cols.iter().copied().filter(|&c| c < grid.width()).collect();

    (start_row..grid.height())
        .filter_map(|row| {
            let col = cols.iter().copied().find(|&col| {
                let cell = grid.get(row, col);
                !cell.is_missing() && cell.to_text().trim().to_uppercase().contains(&marker)
            })?;

            let name_col = col + 1;
            let ctq_name = if name_col < grid.width() && !grid.get(row, name_col).is_missing() {
                Some(normalize_ctq_name(&grid.get(row, name_col).to_text())).filter(|n| !n.is_empty())
            } else {
                None
            };

            Some(MarkerHit { row, col, ctq_name })
        })
        .collect()
}

/// Partition rows into blocks.
///
/// Each marker row ends the previous block. The final block continues past its
/// marker row while any date-mapped column holds a value. Markers without a
/// CTQ name yield no block.
pub fn segment_blocks(
    grid: &RawGrid,
    date_row: usize,
    mapping: &DateMapping,
    search_cols: &[usize],
    marker: &str,
) -> Vec<MeasurementBlock> {
    let markers = find_markers(grid, date_row, search_cols, marker);

    markers
        .iter()
        .enumerate()
        .filter_map(|(i, hit)| {
            let ctq_name = hit.ctq_name.clone()?;
            let end_row = match markers.get(i + 1) {
                Some(next) => next.row,
                None => trailing_end(grid, hit.row, mapping),
            };
            Some(MeasurementBlock {
                start_row: hit.row,
                end_row,
                ctq_name,
            })
        })
        .collect()
}

/// End of the last block: first row after `start` with no value in any
/// date-mapped column.
fn trailing_end(grid: &RawGrid, start: usize, mapping: &DateMapping) -> usize {
    let has_data = |row: usize| mapping.columns().any(|col| !grid.get(row, col).is_missing());
    (start + 1..grid.height())
        .find(|&row| !has_data(row))
        .unwrap_or(grid.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use chrono::NaiveDate;

    fn mapping(cols: &[usize]) -> DateMapping {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        DateMapping::new(cols.iter().map(|&c| (c, d)))
    }

    fn sheet() -> RawGrid {
        let e = || CellValue::Empty;
        let n = CellValue::Number;
        RawGrid::new(vec![
            vec!["No.".into(), "Item".into(), "2024-01-01".into(), "2024-01-02".into()],
            vec![" point 1 ".into(), "Torque".into(), e(), e()],
            vec![e(), "#1".into(), n(10.1), n(10.2)],
            vec![e(), "#2".into(), n(10.0), n(10.3)],
            vec!["POINT 2".into(), "Gap-Width ".into(), e(), e()],
            vec![e(), "#1".into(), n(0.51), n(0.49)],
            vec![e(), e(), e(), e()],
            vec![e(), "note".into(), n(99.0), e()],
        ])
    }

    #[test]
    fn test_blocks_follow_markers() {
        let blocks = segment_blocks(&sheet(), 0, &mapping(&[2, 3]), &default_search_cols(), DEFAULT_MARKER);
        assert_eq!(
            blocks,
            vec![
                MeasurementBlock { start_row: 1, end_row: 4, ctq_name: "Torque".into() },
                MeasurementBlock { start_row: 4, end_row: 6, ctq_name: "Gap Width".into() },
            ]
        );
    }

    #[test]
    fn test_block_count_matches_markers() {
        let mut rows = Vec::new();
        for i in 0..7 {
            rows.push(vec![format!("POINT {}", i).into(), format!("CTQ-{}", i).into(), CellValue::Number(1.0)]);
            for _ in 0..(i % 3 + 1) {
                rows.push(vec![CellValue::Empty, CellValue::Empty, CellValue::Number(2.0)]);
            }
        }
        let grid = RawGrid::new(rows);
        let blocks = segment_blocks(&grid, 0, &mapping(&[2]), &default_search_cols(), DEFAULT_MARKER);

        assert_eq!(blocks.len(), 7);
        for pair in blocks.windows(2) {
            assert!(pair[0].start_row < pair[1].start_row);
            assert_eq!(pair[0].end_row, pair[1].start_row);
        }
        assert_eq!(blocks[3].ctq_name, "CTQ 3");
        assert_eq!(blocks.last().unwrap().end_row, grid.height());
    }

    #[test]
    fn test_unnamed_marker_skipped_but_bounds_previous() {
        let grid = RawGrid::new(vec![
            vec!["POINT".into(), "A".into(), CellValue::Number(1.0)],
            vec![CellValue::Empty, CellValue::Empty, CellValue::Number(1.0)],
            vec!["POINT".into(), " - ".into(), CellValue::Number(1.0)],
            vec![CellValue::Empty, CellValue::Empty, CellValue::Number(1.0)],
        ]);
        let blocks = segment_blocks(&grid, 0, &mapping(&[2]), &default_search_cols(), DEFAULT_MARKER);
        assert_eq!(blocks, vec![MeasurementBlock { start_row: 0, end_row: 2, ctq_name: "A".into() }]);
    }

    #[test]
    fn test_markers_above_date_row_ignored() {
        let blocks = segment_blocks(&sheet(), 2, &mapping(&[2, 3]), &default_search_cols(), DEFAULT_MARKER);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].ctq_name, "Gap Width");
    }

    #[test]
    fn test_marker_outside_search_cols_ignored() {
        let blocks = segment_blocks(&sheet(), 0, &mapping(&[2, 3]), &[1, 2], DEFAULT_MARKER);
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_name_column_past_grid_edge() {
        let grid = RawGrid::new(vec![vec![CellValue::Empty, "POINT".into()]]);
        let hits = find_markers(&grid, 0, &default_search_cols(), DEFAULT_MARKER);
        assert_eq!(hits, vec![MarkerHit { row: 0, col: 1, ctq_name: None }]);
    }
}
