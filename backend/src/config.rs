//! Environment configuration.
//!
//! `main` loads `.env` through dotenvy before calling [`Settings::from_env`];
//! CLI flags override whatever is set here.

use std::path::PathBuf;

use crate::cache::DEFAULT_PROFILE_DIR;
use crate::transform::TransformOptions;

pub const DEFAULT_PORT: u16 = 3000;

/// Process-wide settings read from `CTQFLOW_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub profile_dir: PathBuf,
    pub sample_rows: Option<usize>,
    pub max_row_check: Option<usize>,
    pub min_date_count: Option<usize>,
    pub default_year: Option<i32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            profile_dir: PathBuf::from(DEFAULT_PROFILE_DIR),
            sample_rows: None,
            max_row_check: None,
            min_date_count: None,
            default_year: None,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// Unset or unparseable variables fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            port: parse_var(&lookup, "CTQFLOW_PORT").unwrap_or(defaults.port),
            profile_dir: lookup("CTQFLOW_PROFILE_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.profile_dir),
            sample_rows: parse_var(&lookup, "CTQFLOW_SAMPLE_ROWS"),
            max_row_check: parse_var(&lookup, "CTQFLOW_MAX_ROW_CHECK"),
            min_date_count: parse_var(&lookup, "CTQFLOW_MIN_DATE_COUNT"),
            default_year: parse_var(&lookup, "CTQFLOW_DEFAULT_YEAR"),
        }
    }

    /// Transform options with the environment overrides applied.
    pub fn transform_options(&self) -> TransformOptions {
        let mut options = TransformOptions::default();
        if let Some(n) = self.sample_rows {
            options.sample_rows = n;
        }
        if let Some(n) = self.max_row_check {
            options.max_row_check = n;
        }
        if let Some(n) = self.min_date_count {
            options.min_date_count = n;
        }
        options.default_year = self.default_year;
        options
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(settings(&[]), Settings::default());
        assert_eq!(Settings::default().port, 3000);
    }

    #[test]
    fn test_overrides_reach_options() {
        let s = settings(&[
            ("CTQFLOW_PORT", "8080"),
            ("CTQFLOW_SAMPLE_ROWS", "25"),
            ("CTQFLOW_DEFAULT_YEAR", "2023"),
            ("CTQFLOW_PROFILE_DIR", "/tmp/profiles"),
        ]);
        assert_eq!(s.port, 8080);
        assert_eq!(s.profile_dir, PathBuf::from("/tmp/profiles"));

        let options = s.transform_options();
        assert_eq!(options.sample_rows, 25);
        assert_eq!(options.max_row_check, 20);
        assert_eq!(options.default_year, Some(2023));
    }

    #[test]
    fn test_garbage_values_ignored() {
        let s = settings(&[("CTQFLOW_PORT", "eighty"), ("CTQFLOW_MIN_DATE_COUNT", "-1")]);
        assert_eq!(s.port, 3000);
        assert_eq!(s.min_date_count, None);
    }
}
