//! Locates the date header inside an unstructured grid.
//!
//! Measurement sheets have no fixed layout: the date header may start at any
//! row and column. Position is therefore inferred from content:
//!
//! 1. [`find_date_start_col`] scores each column by how many date-like cells
//!    appear in a small sample window and picks the best (leftmost on ties).
//! 2. [`find_date_row`] walks down from the top and takes the first row with
//!    enough parseable dates from that column rightward.
//! 3. [`date_mapping`] turns that row into a column → date mapping.
//!
//! All three are pure functions of the grid.

use crate::error::{GridError, GridResult};
use crate::models::{DateMapping, RawGrid};

use super::dates::DateParser;

pub const DEFAULT_SAMPLE_ROWS: usize = 10;
pub const DEFAULT_MIN_DATE_COUNT: usize = 1;
pub const DEFAULT_MAX_ROW_CHECK: usize = 20;

/// Date-likeness score of every column over the first `sample_rows` rows.
pub fn column_scores(grid: &RawGrid, sample_rows: usize, parser: &DateParser) -> Vec<usize> {
    let rows = sample_rows.min(grid.height());
    (0..grid.width())
        .map(|col| {
            (0..rows)
                .filter(|&row| parser.is_date_like(grid.get(row, col)))
                .count()
        })
        .collect()
}

/// Index of the column holding the most date-like cells.
pub fn find_date_start_col(grid: &RawGrid, sample_rows: usize, parser: &DateParser) -> GridResult<usize> {
    let scores = column_scores(grid, sample_rows, parser);

    // max_by_key keeps the last maximum; fold keeps the first.
    let best = scores
        .iter()
        .enumerate()
        .fold(None::<(usize, usize)>, |best, (col, &score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((col, score)),
        });

    match best {
        Some((col, score)) if score > 0 => Ok(col),
        _ => Err(GridError::NoDateColumnFound { sample_rows }),
    }
}

/// First row whose cells from `date_col` rightward hold at least
/// `min_date_count` parseable dates.
pub fn find_date_row(
    grid: &RawGrid,
    date_col: usize,
    min_date_count: usize,
    max_row_check: usize,
    parser: &DateParser,
) -> GridResult<usize> {
    let limit = max_row_check.min(grid.height());
    let row_dates = |row: usize| {
        grid.row(row)
            .iter()
            .skip(date_col)
            .filter(|cell| parser.parse_cell(cell).is_some())
            .count()
    };

    (0..limit)
        .find(|&row| row_dates(row) >= min_date_count)
        .ok_or(GridError::NoDateRowFound {
            date_col,
            min_date_count,
            max_row_check,
        })
}

/// Parse every cell of the date row from `date_col` to the last column.
///
/// Unparseable cells are skipped. Repeated dates are all kept.
pub fn date_mapping(grid: &RawGrid, date_row: usize, date_col: usize, parser: &DateParser) -> DateMapping {
    DateMapping::new(
        grid.row(date_row)
            .iter()
            .enumerate()
            .skip(date_col)
            .filter_map(|(col, cell)| parser.parse_cell(cell).map(|d| (col, d))),
    )
}

/// Where the header was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLocation {
    pub row: usize,
    pub col: usize,
}

/// Column detection followed by row detection.
pub fn locate_header(
    grid: &RawGrid,
    sample_rows: usize,
    min_date_count: usize,
    max_row_check: usize,
    parser: &DateParser,
) -> GridResult<HeaderLocation> {
    let col = find_date_start_col(grid, sample_rows, parser)?;
    let row = find_date_row(grid, col, min_date_count, max_row_check, parser)?;
    Ok(HeaderLocation { row, col })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use chrono::NaiveDate;

    fn parser() -> DateParser {
        DateParser::new(Some(2024))
    }

    /// `height` × `width` grid of labels and numbers with dates injected at
    /// `(row, col..col + n)`.
    fn grid_with_header(height: usize, width: usize, row: usize, col: usize, n: usize) -> RawGrid {
        let mut rows = vec![vec![CellValue::Empty; width]; height];
        rows[0][0] = "Inspection sheet".into();
        for (r, cells) in rows.iter_mut().enumerate().skip(row + 1) {
            cells[0] = format!("label {}", r).into();
            for cell in cells.iter_mut().skip(col) {
                *cell = CellValue::Number(10.0 + r as f64 / 10.0);
            }
        }
        for i in 0..n {
            rows[row][col + i] = format!("2024-01-{:02}", i + 1).into();
        }
        RawGrid::new(rows)
    }

    #[test]
    fn test_injected_header_found() {
        for (row, col) in [(0, 0), (3, 2), (7, 5), (9, 1)] {
            let grid = grid_with_header(15, 10, row, col, 3);
            let loc = locate_header(&grid, 10, 1, 20, &parser()).unwrap();
            assert_eq!(loc, HeaderLocation { row, col }, "header at ({}, {})", row, col);
        }
    }

    #[test]
    fn test_no_dates_fails() {
        let grid = RawGrid::new(vec![
            vec!["POINT".into(), "Torque".into(), CellValue::Number(1.0)],
            vec![CellValue::Empty, CellValue::Number(10.5), CellValue::Number(11.0)],
        ]);
        let err = find_date_start_col(&grid, 10, &parser()).unwrap_err();
        assert_eq!(err, GridError::NoDateColumnFound { sample_rows: 10 });
    }

    #[test]
    fn test_empty_grid_fails() {
        let err = find_date_start_col(&RawGrid::default(), 10, &parser()).unwrap_err();
        assert!(matches!(err, GridError::NoDateColumnFound { .. }));
    }

    #[test]
    fn test_tie_breaks_leftmost() {
        let grid = RawGrid::new(vec![vec![
            CellValue::Empty,
            "2024-01-01".into(),
            "2024-01-02".into(),
        ]]);
        assert_eq!(find_date_start_col(&grid, 10, &parser()).unwrap(), 1);
    }

    #[test]
    fn test_header_outside_sample_window() {
        let grid = grid_with_header(30, 6, 12, 2, 3);
        assert!(find_date_start_col(&grid, 10, &parser()).is_err());
        assert_eq!(find_date_start_col(&grid, 15, &parser()).unwrap(), 2);
    }

    #[test]
    fn test_date_row_bounded() {
        let grid = grid_with_header(30, 6, 12, 2, 3);
        let err = find_date_row(&grid, 2, 1, 10, &parser()).unwrap_err();
        assert!(matches!(err, GridError::NoDateRowFound { max_row_check: 10, .. }));
        assert_eq!(find_date_row(&grid, 2, 1, 20, &parser()).unwrap(), 12);
    }

    #[test]
    fn test_min_date_count() {
        let grid = RawGrid::new(vec![
            vec!["2024-01-01".into(), CellValue::Empty],
            vec!["2024-01-01".into(), "2024-01-02".into()],
        ]);
        assert_eq!(find_date_row(&grid, 0, 2, 20, &parser()).unwrap(), 1);
    }

    #[test]
    fn test_mapping_skips_unparseable_and_keeps_duplicates() {
        let grid = RawGrid::new(vec![vec![
            "No.".into(),
            "2024-01-01".into(),
            "remark".into(),
            "2024-01-01".into(),
            "1/3".into(),
        ]]);
        let mapping = date_mapping(&grid, 0, 1, &parser());
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        assert_eq!(mapping.iter().collect::<Vec<_>>(), vec![(1, d(1)), (3, d(1)), (4, d(3))]);
    }
}
