//! Least-squares trend lines.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

use crate::error::{AnalysisError, AnalysisResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub n: usize,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Two-sided p-value of the slope; `None` when it is undefined.
    pub p_value: Option<f64>,
}

impl Trend {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit `y = intercept + slope·x`.
pub fn trend(x: &[f64], y: &[f64]) -> AnalysisResult<Trend> {
    let n = x.len().min(y.len());
    if n < 3 {
        return Err(AnalysisError::InsufficientData { needed: 3, got: n });
    }
    let (x, y) = (&x[..n], &y[..n]);

    let mean_x = x.iter().mean();
    let mean_y = y.iter().mean();
    let sxx: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum();
    let syy: f64 = y.iter().map(|v| (v - mean_y).powi(2)).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mean_x) * (b - mean_y)).sum();

    if sxx == 0.0 {
        return Err(AnalysisError::ZeroVariation);
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    // A flat series has no variation to explain.
    let (r_squared, p_value) = if syy == 0.0 {
        (0.0, None)
    } else {
        let r2 = ((sxy * sxy) / (sxx * syy)).min(1.0);
        (r2, slope_p_value(r2, n))
    };

    Ok(Trend {
        n,
        slope,
        intercept,
        r_squared,
        p_value,
    })
}

/// Trend over observation order (`x = 0, 1, 2, …`).
pub fn trend_by_index(values: &[f64]) -> AnalysisResult<Trend> {
    let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    trend(&x, values)
}

/// Trend over days since the first date; the slope is per day.
pub fn trend_by_date(dates: &[NaiveDate], values: &[f64]) -> AnalysisResult<Trend> {
    let Some(first) = Iterator::min(dates.iter()) else {
        return Err(AnalysisError::InsufficientData { needed: 3, got: 0 });
    };
    let x: Vec<f64> = dates.iter().map(|d| (*d - *first).num_days() as f64).collect();
    trend(&x, values)
}

fn slope_p_value(r_squared: f64, n: usize) -> Option<f64> {
    let df = (n - 2) as f64;
    if r_squared >= 1.0 {
        return Some(0.0);
    }
    let t = (r_squared * df / (1.0 - r_squared)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some(2.0 * (1.0 - dist.cdf(t)))
}
