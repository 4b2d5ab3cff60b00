//! Process capability indices (Cp, Cpk, Pp, Ppk).
//!
//! Short-term indices use the within sigma estimated from the average moving
//! range of consecutive observations (`MR̄ / d2`, `d2 = 1.128` for spans of
//! two); long-term indices use the overall sample standard deviation.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::SpecLimits;

/// d2 for moving ranges of span two.
pub const D2_MR: f64 = 1.128;

/// Computed capability indices.
///
/// Indices needing a limit that is absent are `None`: Cp and Pp need both
/// limits, Cpk and Ppk need at least one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub n: usize,
    pub mean: f64,
    pub std_dev_overall: f64,
    pub std_dev_within: f64,
    pub cp: Option<f64>,
    pub cpk: Option<f64>,
    pub cpu: Option<f64>,
    pub cpl: Option<f64>,
    pub pp: Option<f64>,
    pub ppk: Option<f64>,
    pub ppu: Option<f64>,
    pub ppl: Option<f64>,
}

/// Average absolute difference between consecutive values.
pub fn mean_moving_range(values: &[f64]) -> AnalysisResult<f64> {
    if values.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            needed: 2,
            got: values.len(),
        });
    }
    let ranges = values.windows(2).map(|w| (w[1] - w[0]).abs());
    Ok(ranges.mean())
}

/// Capability of `values` (in observation order) against `limits`.
pub fn capability(values: &[f64], limits: &SpecLimits) -> AnalysisResult<Capability> {
    if limits.usl.is_none() && limits.lsl.is_none() {
        return Err(AnalysisError::MissingLimit("USL or LSL"));
    }
    if values.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            needed: 2,
            got: values.len(),
        });
    }

    let mean = values.iter().mean();
    let std_dev_overall = values.iter().std_dev();
    let std_dev_within = mean_moving_range(values)? / D2_MR;
    if std_dev_overall <= 0.0 || std_dev_within <= 0.0 {
        return Err(AnalysisError::ZeroVariation);
    }

    let (cp, cpu, cpl, cpk) = indices(limits, mean, std_dev_within);
    let (pp, ppu, ppl, ppk) = indices(limits, mean, std_dev_overall);

    Ok(Capability {
        n: values.len(),
        mean,
        std_dev_overall,
        std_dev_within,
        cp,
        cpk,
        cpu,
        cpl,
        pp,
        ppk,
        ppu,
        ppl,
    })
}

/// `(spread, upper, lower, min-of-sides)` for one sigma.
fn indices(limits: &SpecLimits, mean: f64, sigma: f64) -> (Option<f64>, Option<f64>, Option<f64>, Option<f64>) {
    let upper = limits.usl.map(|u| (u - mean) / (3.0 * sigma));
    let lower = limits.lsl.map(|l| (mean - l) / (3.0 * sigma));
    let spread = match (limits.usl, limits.lsl) {
        (Some(u), Some(l)) => Some((u - l) / (6.0 * sigma)),
        _ => None,
    };
    let k = match (upper, lower) {
        (Some(u), Some(l)) => Some(u.min(l)),
        (one, other) => one.or(other),
    };
    (spread, upper, lower, k)
}
