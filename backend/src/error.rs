//! Error types for the reconciliation engine.
//!
//! One enum per concern, wired together with `From` so `?` works across
//! boundaries:
//!
//! - [`CsvError`] - tabular input decoding and parsing
//! - [`InputShapeError`] - sheet or mapping cannot produce anything
//! - [`StoreError`] - record store reads and batch commits
//! - [`BulkActionError`] - bulk mutation assembly and commit
//! - [`RegistryError`] - stored mapping registry
//! - [`ValidationError`] - record schema validation
//! - [`PipelineError`] - top-level orchestration
//! - [`ServerError`] - HTTP surface
//!
//! Expected failures (empty selection, nothing to import, invalid mapping)
//! are turned into a `success: false` envelope by
//! [`crate::transform::pipeline`], never surfaced as panics.

use thiserror::Error;

use crate::models::MappingPurpose;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors during CSV decoding and parsing.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode the detected encoding.
    #[error("Failed to decode content: {0}")]
    EncodingError(String),

    /// Malformed CSV record.
    #[error("Invalid CSV at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Input Shape Errors
// =============================================================================

/// The sheet or the approved mapping cannot yield any record.
///
/// Always reported before the store is touched.
#[derive(Debug, Error)]
pub enum InputShapeError {
    /// Header row plus at least one data row is required.
    #[error("Spreadsheet must contain a header row and at least one data row (found {found} data rows)")]
    TooFewRows { found: usize },

    /// Every header was blank.
    #[error("Spreadsheet has no usable header")]
    NoHeaders,

    /// No header is mapped to a field the purpose needs.
    #[error("No column is mapped to {expected} ({purpose})")]
    MissingRequiredField {
        purpose: MappingPurpose,
        expected: String,
    },
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by a [`crate::store::RecordStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A mutation targets a record that no longer exists.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The atomic batch was rejected; nothing was written.
    #[error("Batch write failed: {0}")]
    WriteFailed(String),

    /// Backend IO error.
    #[error("Store IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Backend (de)serialization error.
    #[error("Store JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A lock was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,

    /// Blocking file task panicked or was cancelled.
    #[error("Store task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

// =============================================================================
// Bulk Action Errors
// =============================================================================

/// Errors from [`crate::bulk::apply_bulk_action`].
#[derive(Debug, Error)]
pub enum BulkActionError {
    /// Review produced no target once sentinels were removed.
    #[error("Please select at least one connection to perform the action on")]
    NoSelection,

    /// The batch commit failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the mapping registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Stored mapping not found.
    #[error("Mapping not found: {0}")]
    NotFound(String),

    /// Invalid stored mapping data.
    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    /// IO error.
    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors during record validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Schema validation failed.
    #[error("Validation failed: {errors:?}")]
    SchemaError { errors: Vec<String> },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level orchestration errors.
///
/// Returned by the `try_*` functions of [`crate::transform::pipeline`] and
/// folded into an [`crate::models::ActionResponse`] by their public wrappers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Sheet or mapping unusable.
    #[error("{0}")]
    InputShape(#[from] InputShapeError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Bulk action error.
    #[error("{0}")]
    Bulk(#[from] BulkActionError),

    /// Mapping was valid but no row produced a record.
    #[error("No valid connections with a name could be processed based on your mapping")]
    NothingToImport,
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
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // CsvError -> PipelineError
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // StoreError -> BulkActionError -> PipelineError
        let store_err = StoreError::NotFound("abc".into());
        let bulk_err: BulkActionError = store_err.into();
        let pipeline_err: PipelineError = bulk_err.into();
        assert!(pipeline_err.to_string().contains("abc"));
    }

    #[test]
    fn test_missing_field_message() {
        let err = InputShapeError::MissingRequiredField {
            purpose: MappingPurpose::Import,
            expected: "name, firstName or lastName".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("firstName"));
        assert!(msg.contains("import"));
    }

    #[test]
    fn test_no_selection_is_plain_message() {
        let err: PipelineError = BulkActionError::NoSelection.into();
        assert!(err.to_string().starts_with("Please select"));
    }
}
