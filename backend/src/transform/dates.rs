//! Date recognition for header cells.
//!
//! Header rows are typed by hand, so the same sheet may mix `2024-01-06`,
//! `1/6`, `2024.01.06.` and real spreadsheet dates. Everything here is
//! best-effort: an unrecognised cell is simply not a date.

use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::CellValue;

/// Delimited numeric date shape, e.g. `1/6`, `01-07-2024`, `2024.01.08`.
static DATE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,4}[/.-]\d{1,2}([/.-]\d{2,4})?$").expect("static regex"));

static NUMERIC_PARTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,4})([/.\-])(\d{1,2})(?:[/.\-](\d{1,4}))?$").expect("static regex")
});

static TIME_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2}(\.\d+)?)?$").expect("static regex"));

static KOREAN_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})\s*년\s*(\d{1,2})\s*월\s*(\d{1,2})\s*일?$").expect("static regex")
});

const NAMED_MONTH_FORMATS: &[&str] = &["%d-%b-%Y", "%b %d, %Y", "%d %b %Y", "%B %d, %Y"];

/// Parses header cells into calendar dates.
///
/// Month/day-only headers (`1/6`) take `default_year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParser {
    default_year: i32,
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DateParser {
    /// `None` uses the current local year.
    pub fn new(default_year: Option<i32>) -> Self {
        Self {
            default_year: default_year.unwrap_or_else(|| Local::now().year()),
        }
    }

    pub fn default_year(&self) -> i32 {
        self.default_year
    }

    /// Calendar date of a cell, if it is a typed date or a recognised string.
    pub fn parse_cell(&self, cell: &CellValue) -> Option<NaiveDate> {
        match cell {
            CellValue::Date(dt) => Some(dt.date()),
            CellValue::Text(s) => self.parse_str(s),
            _ => None,
        }
    }

    /// Looser test used for column scoring: the shape alone is enough.
    pub fn is_date_like(&self, cell: &CellValue) -> bool {
        match cell {
            CellValue::Date(_) => true,
            CellValue::Text(s) => DATE_SHAPE.is_match(s.trim()) || self.parse_str(s).is_some(),
            _ => false,
        }
    }

    pub fn parse_str(&self, raw: &str) -> Option<NaiveDate> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if let Some(caps) = KOREAN_DATE.captures(s) {
            return ymd(&caps[1], &caps[2], &caps[3]);
        }

        for fmt in NAMED_MONTH_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return Some(d);
            }
        }

        let date_part = strip_time(s);
        let date_part = date_part.strip_suffix('.').unwrap_or(date_part);
        self.parse_numeric(date_part)
    }

    fn parse_numeric(&self, s: &str) -> Option<NaiveDate> {
        let caps = NUMERIC_PARTS.captures(s)?;
        let first = &caps[1];
        let delimiter = &caps[2];
        let second = &caps[3];

        match caps.get(4).map(|m| m.as_str()) {
            None if first.len() == 4 => ymd(first, second, "1"),
            None => NaiveDate::from_ymd_opt(self.default_year, first.parse().ok()?, second.parse().ok()?),
            Some(third) if first.len() == 4 => ymd(first, second, third),
            Some(third) if third.len() == 4 => ymd(third, first, second),
            Some(third) if first.len() <= 2 && third.len() <= 2 => {
                // Two-digit years: dotted headers are year-first (24.01.08),
                // slashed/dashed ones are US month-first (01/08/24).
                if delimiter == "." {
                    ymd(&expand_year(first)?, second, third)
                } else {
                    ymd(&expand_year(third)?, first, second)
                }
            }
            Some(_) => None,
        }
    }
}

/// Drop a trailing `HH:MM[:SS]` after a space or ISO `T`.
fn strip_time(s: &str) -> &str {
    let split_at = s.find(['T', ' ']);
    match split_at {
        Some(idx) if TIME_SUFFIX.is_match(s[idx + 1..].trim()) => s[..idx].trim_end(),
        _ => s,
    }
}

fn expand_year(yy: &str) -> Option<String> {
    let n: i32 = yy.parse().ok()?;
    Some((2000 + n).to_string())
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_iso_and_dotted() {
        let p = DateParser::new(Some(2024));
        assert_eq!(p.parse_str("2024-01-08"), Some(date(2024, 1, 8)));
        assert_eq!(p.parse_str("2024.01.08"), Some(date(2024, 1, 8)));
        assert_eq!(p.parse_str("2024.01.08."), Some(date(2024, 1, 8)));
        assert_eq!(p.parse_str("2024/1/8"), Some(date(2024, 1, 8)));
    }

    #[test]
    fn test_month_first_with_year() {
        let p = DateParser::new(Some(2024));
        assert_eq!(p.parse_str("01-07-2024"), Some(date(2024, 1, 7)));
        assert_eq!(p.parse_str("1/7/24"), Some(date(2024, 1, 7)));
    }

    #[test]
    fn test_two_digit_dotted_is_year_first() {
        let p = DateParser::new(Some(2024));
        assert_eq!(p.parse_str("24.01.08"), Some(date(2024, 1, 8)));
    }

    #[test]
    fn test_month_day_uses_default_year() {
        let p = DateParser::new(Some(2023));
        assert_eq!(p.parse_str("1/6"), Some(date(2023, 1, 6)));
        assert_eq!(p.parse_str("13/40"), None);
    }

    #[test]
    fn test_time_suffix_ignored() {
        let p = DateParser::new(Some(2024));
        assert_eq!(p.parse_str("2024-03-01 00:00:00"), Some(date(2024, 3, 1)));
        assert_eq!(p.parse_str("2024-03-01T08:30"), Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_korean_and_named_months() {
        let p = DateParser::new(Some(2024));
        assert_eq!(p.parse_str("2024년 3월 5일"), Some(date(2024, 3, 5)));
        assert_eq!(p.parse_str("05-Mar-2024"), Some(date(2024, 3, 5)));
    }

    #[test]
    fn test_non_dates() {
        let p = DateParser::new(Some(2024));
        assert_eq!(p.parse_str("Torque"), None);
        assert_eq!(p.parse_str("POINT 1"), None);
        assert_eq!(p.parse_str(""), None);
        assert!(!p.is_date_like(&CellValue::Number(10.5)));
    }

    #[test]
    fn test_typed_date_cell() {
        let p = DateParser::default();
        let dt = date(2024, 5, 1).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(p.parse_cell(&CellValue::Date(dt)), Some(date(2024, 5, 1)));
        assert!(p.is_date_like(&CellValue::Date(dt)));
    }
}
