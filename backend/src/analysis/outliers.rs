//! Outlier detection over a series of numeric values.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{AnalysisError, AnalysisResult};

const IQR_FACTOR: f64 = 1.5;
const Z_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Outside `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]`
    Iqr,
    /// `|z| > 3`
    ZScore,
    /// Outside the specification limits
    SpecLimit { lsl: Option<f64>, usl: Option<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outliers {
    pub method: OutlierMethod,
    /// Lower fence, when the method has one
    pub lower: Option<f64>,
    /// Upper fence, when the method has one
    pub upper: Option<f64>,
    pub indices: Vec<usize>,
}

impl Outliers {
    pub fn count(&self) -> usize {
        self.indices.len()
    }
}

/// Linear-interpolated quantile of sorted values, `q` in `[0, 1]`.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(sorted[0]);
    }

    let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (rank.ceil() as usize).min(n - 1);
    let frac = rank - lower as f64;

    Some(sorted[lower] * (1.0 - frac) + sorted[upper] * frac)
}

pub fn detect_outliers(values: &[f64], method: OutlierMethod) -> AnalysisResult<Outliers> {
    let (lower, upper) = match method {
        OutlierMethod::Iqr => {
            if values.len() < 4 {
                return Err(AnalysisError::InsufficientData {
                    needed: 4,
                    got: values.len(),
                });
            }
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let q1 = quantile(&sorted, 0.25).unwrap_or_default();
            let q3 = quantile(&sorted, 0.75).unwrap_or_default();
            let iqr = q3 - q1;
            (Some(q1 - IQR_FACTOR * iqr), Some(q3 + IQR_FACTOR * iqr))
        }
        OutlierMethod::ZScore => {
            if values.len() < 2 {
                return Err(AnalysisError::InsufficientData {
                    needed: 2,
                    got: values.len(),
                });
            }
            let mean = values.iter().mean();
            let std = values.iter().std_dev();
            if std <= 0.0 {
                return Err(AnalysisError::ZeroVariation);
            }
            (Some(mean - Z_THRESHOLD * std), Some(mean + Z_THRESHOLD * std))
        }
        OutlierMethod::SpecLimit { lsl, usl } => {
            if lsl.is_none() && usl.is_none() {
                return Err(AnalysisError::MissingLimit("USL or LSL"));
            }
            (lsl, usl)
        }
    };

    let indices = values
        .iter()
        .enumerate()
        .filter(|(_, &v)| lower.is_some_and(|l| v < l) || upper.is_some_and(|u| v > u))
        .map(|(i, _)| i)
        .collect();

    Ok(Outliers {
        method,
        lower,
        upper,
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_iqr_flags_extreme_value() {
        let values = [10.0, 10.2, 9.9, 10.1, 10.0, 25.0, 10.05];
        let found = detect_outliers(&values, OutlierMethod::Iqr).unwrap();
        assert_eq!(found.indices, vec![5]);
    }

    #[test]
    fn test_zscore() {
        let mut values = vec![10.0; 20];
        values[3] = 10.1;
        values[7] = 9.9;
        values.push(30.0);
        let found = detect_outliers(&values, OutlierMethod::ZScore).unwrap();
        assert_eq!(found.indices, vec![20]);

        assert_eq!(detect_outliers(&[5.0, 5.0], OutlierMethod::ZScore), Err(AnalysisError::ZeroVariation));
    }

    #[test]
    fn test_spec_limit_one_sided() {
        let method = OutlierMethod::SpecLimit { lsl: Some(9.5), usl: None };
        let found = detect_outliers(&[9.0, 10.0, 100.0], method).unwrap();
        assert_eq!(found.indices, vec![0]);
    }

    #[test]
    fn test_iqr_needs_four_values() {
        assert_eq!(
            detect_outliers(&[1.0, 2.0, 3.0], OutlierMethod::Iqr),
            Err(AnalysisError::InsufficientData { needed: 4, got: 3 })
        );
    }
}
