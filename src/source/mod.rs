//! Record sources and source resolution.
//!
//! The [`RecordSource`] trait abstracts over the backing store that holds
//! business records. Every source can `fetch` filtered raw records; sources
//! that speak SQL additionally expose a dialect, their column sets and query
//! execution, which enables push-down aggregation.
//!
//! # Example
//!
//! ```ignore
//! use quarry::source::{MemorySource, RecordSource, Table};
//!
//! async fn example(source: &impl RecordSource) -> SourceResult<()> {
//!     let rows = source.fetch(Table::Orders, &[], None).await?;
//!     Ok(())
//! }
//! ```

mod memory;
pub mod resolver;
mod sqlite;
mod table;

pub use memory::MemorySource;
pub use resolver::{resolve, Resolution};
pub use sqlite::SqliteSource;
pub use table::Table;

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::spec::{DateBounds, Predicate};
use crate::sql::{Dialect, PreparedQuery};
use crate::value::Record;

/// Result type for record source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors reported by record sources.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The requested table does not exist in this source.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A referenced field has no backing column.
    #[error("unknown field '{field}' in table '{table}'")]
    UnknownField { table: String, field: String },

    /// The source cannot answer this request (e.g. no push-down support).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The query was issued but failed.
    #[error("query failed: {0}")]
    Query(String),

    /// The source could not be reached.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for SourceError {
    fn from(err: rusqlite::Error) -> Self {
        SourceError::Query(err.to_string())
    }
}

/// A backing store of business records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Fetch raw records of `table` matching every filter and the date range.
    ///
    /// The date range applies to [`Table::timestamp_column`].
    async fn fetch(
        &self,
        table: Table,
        filters: &[Predicate],
        date_range: Option<&DateBounds>,
    ) -> SourceResult<Vec<Record>>;

    /// SQL dialect for push-down queries, or `None` if push-down is not
    /// supported.
    fn push_down_dialect(&self) -> Option<Dialect> {
        None
    }

    /// Column names of `table`.
    async fn columns(&self, table: Table) -> SourceResult<HashSet<String>> {
        Err(SourceError::Unsupported(format!(
            "{} does not expose columns of {}",
            self.name(),
            table
        )))
    }

    /// Execute a prepared aggregate query.
    async fn execute(&self, query: &PreparedQuery) -> SourceResult<Vec<Record>> {
        let _ = query;
        Err(SourceError::Unsupported(format!(
            "{} does not support push-down",
            self.name()
        )))
    }
}
