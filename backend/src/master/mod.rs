//! Specification master: column mapping, key normalization, join and verify.
//!
//! The master sheet is maintained by a different team than the measurement
//! sheets, so its headers differ (`부품` vs `부품명`) and its key values drift
//! in spacing, case and hyphenation. [`MasterSchema`] maps the headers and
//! [`normalize_key`] is the one normalization both sides of every join use.

pub mod join;
pub mod verify;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SchemaError;
use crate::models::{columns, MasterTable};

pub use join::{add_management_code, JoinOutcome, MasterIndex};
pub use verify::{spec_for_measured, verify, Verification};

/// Composite join key, by template label.
pub const KEY_COLUMNS: [&str; 7] = [
    columns::FIRST_TIER_COMPANY,
    columns::REGION,
    columns::SECOND_TIER_COMPANY,
    columns::PART_NAME,
    columns::CTQ_NAME,
    columns::MODEL,
    columns::PART_NO,
];

/// Limit columns read by the verifier.
pub const LIMIT_COLUMNS: [&str; 5] = [columns::USL, columns::LSL, columns::TARGET, columns::UCL, columns::LCL];

const DEFAULT_MASTER_SHEET: &str = "Master";

/// Normalize a join-key value: trim, collapse whitespace, fold case and treat
/// `-` / `_` as spaces.
pub fn normalize_key(raw: &str) -> String {
    raw.replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// How a master sheet's headers map onto the template labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterSchema {
    /// Sheet holding the master table.
    #[serde(default = "default_sheet")]
    pub sheet: String,

    /// Source header → template label.
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
}

fn default_sheet() -> String {
    DEFAULT_MASTER_SHEET.to_string()
}

impl Default for MasterSchema {
    fn default() -> Self {
        let renames = [
            ("부품", columns::PART_NAME),
            ("공정CTQ/CTP 관리 항목명", columns::CTQ_NAME),
            ("2차 업체명", columns::SECOND_TIER_COMPANY),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            sheet: default_sheet(),
            renames,
        }
    }
}

impl MasterSchema {
    /// Parse a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Header label after renaming.
    pub fn target_of<'a>(&'a self, header: &'a str) -> &'a str {
        self.renames.get(header.trim()).map(String::as_str).unwrap_or(header.trim())
    }

    /// Copy of `master` with headers renamed to template labels.
    pub fn apply(&self, master: &MasterTable) -> MasterTable {
        MasterTable {
            headers: master.headers.iter().map(|h| self.target_of(h).to_string()).collect(),
            rows: master.rows.clone(),
        }
    }

    /// Headers a master sheet is expected to carry before renaming.
    pub fn expected_source_columns(&self) -> Vec<String> {
        let inverse: BTreeMap<&str, &str> = self
            .renames
            .iter()
            .map(|(from, to)| (to.as_str(), from.as_str()))
            .collect();

        KEY_COLUMNS
            .iter()
            .chain(std::iter::once(&columns::MANAGEMENT_CODE))
            .map(|label| inverse.get(label).copied().unwrap_or(*label).to_string())
            .collect()
    }

    /// Fail with every missing join column of a renamed table.
    pub fn check_join_columns(renamed: &MasterTable) -> Result<(), SchemaError> {
        let missing: Vec<String> = KEY_COLUMNS
            .iter()
            .chain(std::iter::once(&columns::MANAGEMENT_CODE))
            .filter(|c| !renamed.has_column(c))
            .map(|c| c.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::MissingMasterColumns(missing))
        }
    }
}
