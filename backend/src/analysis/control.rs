//! Individuals and moving-range (I-MR) control limits.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{AnalysisError, AnalysisResult};

/// E2 = 3 / d2(n=2)
pub const E2: f64 = 2.660;
/// D4 for moving ranges of span two.
pub const D4_MR: f64 = 3.267;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImrLimits {
    pub center: f64,
    pub ucl: f64,
    pub lcl: f64,
    pub mr_center: f64,
    pub mr_ucl: f64,
    /// `|x[i+1] - x[i]|`, one shorter than the input.
    pub moving_ranges: Vec<f64>,
    /// Indices of individual values outside `[lcl, ucl]`.
    pub beyond_limits: Vec<usize>,
}

impl ImrLimits {
    pub fn in_control(&self) -> bool {
        self.beyond_limits.is_empty()
    }
}

/// Control limits of individual observations in order.
pub fn imr_limits(values: &[f64]) -> AnalysisResult<ImrLimits> {
    if values.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            needed: 2,
            got: values.len(),
        });
    }

    let moving_ranges: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let mr_center = moving_ranges.iter().mean();
    let center = values.iter().mean();
    let ucl = center + E2 * mr_center;
    let lcl = center - E2 * mr_center;

    let beyond_limits = values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > ucl || v < lcl)
        .map(|(i, _)| i)
        .collect();

    Ok(ImrLimits {
        center,
        ucl,
        lcl,
        mr_center,
        mr_ucl: D4_MR * mr_center,
        moving_ranges,
        beyond_limits,
    })
}
