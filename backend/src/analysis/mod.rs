//! Process analysis over verified records.
//!
//! - [`capability`]: Cp / Cpk / Pp / Ppk
//! - [`control`]: I-MR control limits
//! - [`outliers`]: IQR, z-score and spec-limit outliers
//! - [`trend`]: least-squares trend lines
//!
//! [`summarize`] runs all of them per characteristic. A statistic that cannot
//! be computed for a group is recorded as a note instead of failing the report.

pub mod capability;
pub mod control;
pub mod outliers;
pub mod trend;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::AnalysisResult;
use crate::models::{SpecLimits, VerifiedRecord};

pub use capability::{capability, Capability};
pub use control::{imr_limits, ImrLimits};
pub use outliers::{detect_outliers, OutlierMethod, Outliers};
pub use trend::{trend, trend_by_date, trend_by_index, Trend};

/// Statistics of one characteristic: a management code, or a CTQ name for
/// records that matched no code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicReport {
    pub management_code: Option<String>,
    pub ctq_name: String,
    pub part_name: String,
    /// Records in the group
    pub count: usize,
    /// Records with a numeric value
    pub numeric_count: usize,
    pub violations: usize,
    pub limits: Option<SpecLimits>,
    pub capability: Option<Capability>,
    pub control: Option<ImrLimits>,
    pub outliers: Option<Outliers>,
    pub trend: Option<Trend>,
    /// Why a statistic is missing
    pub notes: Vec<String>,
}

fn keep<T>(result: AnalysisResult<T>, label: &str, notes: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            notes.push(format!("{}: {}", label, e));
            None
        }
    }
}

/// One report per characteristic, ordered by management code then CTQ name.
///
/// Values are taken in record order, so callers should pass records sorted by
/// measurement date.
pub fn summarize(records: &[VerifiedRecord]) -> Vec<CharacteristicReport> {
    let mut groups: BTreeMap<(Option<&str>, &str), Vec<&VerifiedRecord>> = BTreeMap::new();
    for r in records {
        let code = r.record.management_code.as_deref();
        let ctq = if code.is_some() { "" } else { r.record.ctq_name.as_str() };
        groups.entry((code, ctq)).or_default().push(r);
    }

    groups
        .into_values()
        .map(|group| report(&group))
        .collect()
}

fn report(group: &[&VerifiedRecord]) -> CharacteristicReport {
    let first = &group[0].record;
    let values: Vec<f64> = group.iter().filter_map(|r| r.record.value()).collect();
    let limits = group.iter().find_map(|r| r.limits);
    let mut notes = Vec::new();

    let capability = match &limits {
        Some(l) => keep(capability(&values, l), "capability", &mut notes),
        None => {
            notes.push("capability: no specification limits".to_string());
            None
        }
    };
    let control = keep(imr_limits(&values), "control limits", &mut notes);
    let outliers = keep(detect_outliers(&values, OutlierMethod::Iqr), "outliers", &mut notes);
    let trend = keep(trend_by_index(&values), "trend", &mut notes);

    CharacteristicReport {
        management_code: first.management_code.clone(),
        ctq_name: first.ctq_name.clone(),
        part_name: first.part_name.clone(),
        count: group.len(),
        numeric_count: values.len(),
        violations: group.iter().filter(|r| r.is_ng()).count(),
        limits,
        capability,
        control,
        outliers,
        trend,
        notes,
    }
}
