//! REST API request and response types.
//!
//! Payloads are camelCase JSON. Grids travel as arrays of rows of plain JSON
//! scalars; the master travels as `{ "headers": [...], "rows": [[...]] }`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::analysis::{summarize, CharacteristicReport};
use crate::export::suggest_filename;
use crate::master::Verification;
use crate::models::{InfoMapping, MasterTable, MeasurementRecord, RawGrid, SpecRow, VerifiedRecord};
use crate::transform::{TransformOptions, TransformOutput, TransformSummary};

/// Body of `POST /api/transform` and `POST /api/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    /// Measurement sheet, header-less
    pub grid: RawGrid,

    /// Information sheet as key/value pairs
    #[serde(default)]
    pub info: InfoMapping,

    pub master: MasterTable,

    #[serde(default)]
    pub options: TransformOptions,
}

/// Response of `POST /api/transform`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResponse {
    /// Unique run identifier
    pub run_id: String,

    /// "ready" when every record matched a management code, else "warning"
    pub status: String,

    pub summary: TransformSummary,

    pub records: Vec<MeasurementRecord>,

    pub suggested_filename: String,
}

impl From<TransformOutput> for TransformResponse {
    fn from(output: TransformOutput) -> Self {
        let today = chrono::Local::now().date_naive();
        TransformResponse {
            run_id: Uuid::new_v4().to_string(),
            status: if output.summary.unmatched == 0 { "ready" } else { "warning" }.to_string(),
            suggested_filename: suggest_filename(&output.records, today),
            summary: output.summary,
            records: output.records,
        }
    }
}

/// Response of `POST /api/verify`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub run_id: String,

    /// "ready" when nothing is out of spec, else "warning"
    pub status: String,

    pub summary: TransformSummary,

    pub full: Vec<VerifiedRecord>,

    pub violations: Vec<VerifiedRecord>,

    pub specs: Vec<SpecRow>,

    pub missing_limit_columns: Vec<String>,

    pub reports: Vec<CharacteristicReport>,
}

impl VerifyResponse {
    pub fn new(summary: TransformSummary, verification: Verification) -> Self {
        let reports = summarize(&verification.full);
        VerifyResponse {
            run_id: Uuid::new_v4().to_string(),
            status: if verification.violations.is_empty() { "ready" } else { "warning" }.to_string(),
            summary,
            full: verification.full,
            violations: verification.violations,
            specs: verification.specs,
            missing_limit_columns: verification.missing_limit_columns,
            reports,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "runId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "records": [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_json() {
        let body = json!({
            "grid": [["No", "2024-01-01"], ["POINT", null], [null, 10.5]],
            "info": { "모델명": "WM-100" },
            "master": { "headers": ["관리번호"], "rows": [["MC-1"]] },
            "options": { "marker": "PT" }
        });
        let req: TransformRequest = serde_json::from_value(body).unwrap();

        assert_eq!(req.grid.height(), 3);
        assert_eq!(req.info.get("모델명"), "WM-100");
        assert_eq!(req.master.headers, vec!["관리번호"]);
        assert_eq!(req.options.marker, "PT");
        assert_eq!(req.options.sample_rows, 10);
    }

    #[test]
    fn test_options_keys_are_camel_case() {
        let body = json!({
            "grid": [],
            "master": { "headers": [], "rows": [] },
            "options": {
                "defaultYear": 2023,
                "startDate": "2023-03-01",
                "searchCols": [0, 1],
                "minDateCount": 2,
                "schema": { "sheet": "Spec" }
            }
        });
        let req: TransformRequest = serde_json::from_value(body).unwrap();

        assert_eq!(req.options.default_year, Some(2023));
        assert_eq!(req.options.start_date, chrono::NaiveDate::from_ymd_opt(2023, 3, 1));
        assert_eq!(req.options.search_cols, vec![0, 1]);
        assert_eq!(req.options.min_date_count, 2);
        assert_eq!(req.options.schema.sheet, "Spec");

        let echoed = serde_json::to_value(&req.options).unwrap();
        assert!(echoed.get("maxRowCheck").is_some());
        assert!(echoed.get("max_row_check").is_none());
    }

    #[test]
    fn test_options_optional() {
        let body = json!({ "grid": [], "master": { "headers": [], "rows": [] } });
        let req: TransformRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.options, TransformOptions::default());
        assert!(req.info.is_empty());
    }

    #[test]
    fn test_error_response_shape() {
        let v = error_response("No date column found");
        assert_eq!(v["status"], "error");
        assert_eq!(v["error"], "No date column found");
        assert!(v["records"].as_array().unwrap().is_empty());
    }
}
