//! # Quarry
//!
//! A declarative report-aggregation engine with result caching and
//! multi-format export.
//!
//! ## Architecture
//!
//! Callers describe a report as a [`ReportSpec`] (dimensions, metrics,
//! filters, sorting, date range, pagination) and the engine turns it into
//! aggregated rows:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 ReportSpec / Template                    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [spec::validate]
//! ┌─────────────────────────────────────────────────────────┐
//! │          ResolvedSpec (typed FieldNames)                 │──► [cache] hit?
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [source::resolve]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Strategy chain: PushDown (SQL) → PullAndAggregate      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [aggregate::format, sort]
//! ┌─────────────────────────────────────────────────────────┐
//! │          ReportResult (rows + metadata)                  │──► [export]
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod export;
pub mod sort;
pub mod source;
pub mod spec;
pub mod sql;
pub mod templates;
pub mod value;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::cache::{CacheStats, ResultCache};
    pub use crate::config::Settings;
    pub use crate::engine::{ReportEngine, ReportEngineBuilder};
    pub use crate::error::{EngineResult, ReportError};
    pub use crate::execution::ExecutionStrategy;
    pub use crate::export::{ExportEncoder, ExportFormat, ExportOptions, TabularHandoff};
    pub use crate::source::{MemorySource, RecordSource, SqliteSource, Table};
    pub use crate::spec::{
        Aggregation, DateRange, Dimension, Filter, FilterOperator, Granularity, Metric,
        MetricFormat, ReportResult, ReportSpec, Sort, SortDirection,
    };
    pub use crate::templates::{Template, TemplateCatalog};
}

// Also export at crate root for convenience
pub use engine::ReportEngine;
pub use error::{EngineResult, ReportError};
pub use spec::{ReportResult, ReportSpec};
