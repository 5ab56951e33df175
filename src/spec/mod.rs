//! Report specification model and field catalog.
//!
//! - [`types`] - caller-facing wire types (`ReportSpec`, `ReportResult`, ...)
//! - [`field`] - the closed [`FieldName`] registry with extractors and SQL forms
//! - [`catalog`] - selectable dimensions and metrics
//! - [`predicate`] - resolved filters and in-process evaluation
//! - [`validate`] - spec validation into a [`ResolvedSpec`]

pub mod catalog;
pub mod field;
pub mod predicate;
pub mod types;
pub mod validate;

pub use catalog::{label_for, list_dimensions, list_metrics};
pub use field::FieldName;
pub use predicate::{DateBounds, Predicate};
pub use types::{
    Aggregation, DataType, DateRange, Dimension, Filter, FilterOperator, Granularity, Metric,
    MetricFormat, ReportResult, ReportSpec, ResultMetadata, Row, Sort, SortDirection,
    ExecutionStrategy,
};
pub use validate::{validate, ResolvedDimension, ResolvedMetric, ResolvedSort, ResolvedSpec};
