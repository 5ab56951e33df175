//! Engine-level error taxonomy.
//!
//! Every public operation of the engine returns [`EngineResult`]. Errors from
//! lower layers (record sources, export, templates) convert into
//! [`ReportError`] through `#[from]` so callers can use `?` throughout.

use thiserror::Error;

use crate::config::SettingsError;
use crate::export::ExportError;
use crate::source::SourceError;
use crate::templates::TemplateError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, ReportError>;

/// Errors surfaced by the report engine.
#[derive(Error, Debug)]
pub enum ReportError {
    /// The report specification is malformed or references unknown fields.
    ///
    /// Raised before any data access.
    #[error("invalid report spec: {field}: {reason}")]
    InvalidSpec {
        /// The offending field, operator or section.
        field: String,
        /// Human-readable description of the problem.
        reason: String,
    },

    /// The backing record source failed to answer a query.
    #[error("source query failed: {0}")]
    SourceQuery(#[from] SourceError),

    /// The execution did not complete before its deadline.
    #[error("report execution exceeded deadline of {timeout_ms} ms")]
    DeadlineExceeded { timeout_ms: u64 },

    /// A value had a shape the aggregation step cannot handle.
    #[error("aggregation failed: {0}")]
    Aggregation(String),

    /// Export failed (unsupported format, empty dataset, encoder failure).
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Template lookup or loading failed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Engine configuration could not be applied.
    #[error(transparent)]
    Config(#[from] SettingsError),
}

impl ReportError {
    /// Create an invalid-spec error.
    pub fn invalid_spec(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an aggregation error.
    pub fn aggregation(message: impl Into<String>) -> Self {
        Self::Aggregation(message.into())
    }

    /// Check if this error came from the record source.
    ///
    /// Only source errors are eligible for the strategy fallback chain.
    pub fn is_source_error(&self) -> bool {
        matches!(self, Self::SourceQuery(_))
    }
}
