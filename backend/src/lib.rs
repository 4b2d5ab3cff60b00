//! # ctqflow - CTQ measurement extraction and specification checks
//!
//! ctqflow reads inspection workbooks whose layout is only loosely fixed: a
//! date header somewhere near the top, `POINT` marker rows opening one block
//! per CTQ item, and measurements laid out as a date matrix. It turns them
//! into tidy records, joins them with the specification master and flags
//! out-of-spec values.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Workbook / │────▶│   Scanner   │────▶│  Segmenter  │────▶│  Extractor  │
//! │  CSV grid   │     │ (date hdr)  │     │  (POINT)    │     │ (tidy rows) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                     ┌─────────────┐     ┌─────────────┐     ┌──────▼──────┐
//!                     │  Analysis   │◀────│  Verifier   │◀────│   Joiner    │
//!                     │ (Cpk, I-MR) │     │  (NG flag)  │     │ (관리번호)  │
//!                     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ctqflow::{transform_workbooks, verify_output, TransformOptions};
//! use std::path::Path;
//!
//! let options = TransformOptions::default();
//! let run = transform_workbooks(Path::new("inspection.xlsx"), Path::new("master.xlsx"), &options)?;
//! let verification = verify_output(&run.output.records, &run.master, &options)?;
//! println!("{} of {} values out of spec", verification.violation_count(), verification.full.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, grids, records and spec limits
//! - [`parser`] - Workbook and CSV readers with auto-detection
//! - [`transform`] - Scanner, segmenter, extractor and pipeline
//! - [`master`] - Master schema, join and verification
//! - [`analysis`] - Capability, control limits, outliers and trends
//! - [`export`] - CSV / JSON output
//! - [`cache`] - Master profile registry
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server and log broadcasting

// Core modules
pub mod error;
pub mod models;

// Reading
pub mod parser;

// Transformation
pub mod transform;

// Master join and verification
pub mod master;

// Statistics
pub mod analysis;

// Output
pub mod export;

// Profiles
pub mod cache;

// Settings
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AnalysisError,
    ExportError,
    GridError,
    PipelineError,
    ReadError,
    RegistryError,
    SchemaError,
    ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    columns,
    CellValue,
    DateMapping,
    InfoMapping,
    MasterTable,
    MeasurementBlock,
    MeasurementRecord,
    RawGrid,
    SpecLimits,
    SpecOver,
    SpecRow,
    VerifiedRecord,
};

// =============================================================================
// Re-exports - Readers
// =============================================================================

pub use parser::{
    detect_delimiter,
    detect_encoding,
    decode_content,
    read_csv_grid,
    read_csv_table,
    read_info_file,
    read_table_file,
};

pub use parser::workbook::{read_master_workbook, read_measurement_workbook};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    date_mapping,
    extract_records,
    find_date_row,
    find_date_start_col,
    segment_blocks,
    DateParser,
};

pub use transform::pipeline::{
    load_inputs,
    transform_files,
    transform_grid,
    transform_workbooks,
    verify_output,
    TransformOptions,
    TransformOutput,
    TransformSummary,
};

// =============================================================================
// Re-exports - Master
// =============================================================================

pub use master::{add_management_code, normalize_key, verify, MasterSchema, Verification};

// =============================================================================
// Re-exports - Analysis
// =============================================================================

pub use analysis::{summarize, CharacteristicReport};

// =============================================================================
// Re-exports - Registry (Cache)
// =============================================================================

pub use cache::{ProfileRegistry, StoredProfile};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, TransformRequest, TransformResponse, VerifyResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
