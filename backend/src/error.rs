//! Error types for the ctqflow pipeline.
//!
//! - [`GridError`] - structural detection failures inside a raw grid
//! - [`SchemaError`] - missing master columns, info keys or sheets
//! - [`ReadError`] - workbook / CSV reading errors
//! - [`AnalysisError`] - statistics on too few or degenerate samples
//! - [`RegistryError`] - master profile registry errors
//! - [`ExportError`] - CSV / JSON output errors
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Conversion is automatic via `From` implementations, so `?` works across
//! layer boundaries.

use thiserror::Error;

// =============================================================================
// Structural Detection Errors
// =============================================================================

/// The grid does not match the expected measurement template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// No column has a single date-like cell in the sample window.
    #[error("No date column found in the first {sample_rows} rows")]
    NoDateColumnFound { sample_rows: usize },

    /// No row starting at the date column holds enough dates.
    #[error("No date row found in the first {max_row_check} rows from column {date_col} (needed {min_date_count} date cell(s))")]
    NoDateRowFound {
        date_col: usize,
        min_date_count: usize,
        max_row_check: usize,
    },
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Configuration or data-layout errors the caller must fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Master table lacks columns needed for the join or verification.
    #[error("Master table is missing required column(s): {}", .0.join(", "))]
    MissingMasterColumns(Vec<String>),

    /// Information mapping lacks a required key.
    #[error("Information sheet is missing required key: {0}")]
    MissingInfoKey(String),

    /// Information sheet lacks its key/value header columns.
    #[error("Information sheet must have '{key_column}' and '{value_column}' columns")]
    MissingInfoColumns {
        key_column: String,
        value_column: String,
    },

    /// Workbook has no sheet with the requested name.
    #[error("Sheet '{sheet}' not found (available: {})", .available.join(", "))]
    MissingSheet { sheet: String, available: Vec<String> },
}

// =============================================================================
// Read Errors
// =============================================================================

/// Errors while reading workbooks and CSV sources.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Spreadsheet could not be opened or decoded.
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    /// Invalid CSV content.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid JSON content.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bytes could not be decoded with the detected encoding.
    #[error("Failed to decode content as {0}")]
    Encoding(String),

    /// Source contained no rows.
    #[error("Source is empty")]
    EmptySource,

    /// Wrong sheet or column layout.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

// =============================================================================
// Analysis Errors
// =============================================================================

/// Statistics that cannot be computed for the given samples.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Not enough numeric samples.
    #[error("Insufficient data: need at least {needed} value(s), got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Every sample is identical, so dispersion-based indices are undefined.
    #[error("Zero variation: standard deviation is 0")]
    ZeroVariation,

    /// Index requires a specification limit that is absent.
    #[error("Missing specification limit: {0}")]
    MissingLimit(&'static str),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the master profile registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Profile not found.
    #[error("Profile not found: {0}")]
    NotFound(String),

    /// Invalid profile data.
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// IO error.
    #[error("Registry IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing output files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON write error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Grid structure not recognised.
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// Missing columns or keys.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Reading failed.
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    /// Profile registry failure.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Writing output failed.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Date bound could not be parsed.
    #[error("Invalid date bound '{0}'")]
    InvalidDateBound(String),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Socket / bind failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for grid scanning.
pub type GridResult<T> = Result<T, GridError>;

/// Result type for reading operations.
pub type ReadResult<T> = Result<T, ReadError>;

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
