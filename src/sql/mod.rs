//! Parameterized SQL generation for push-down execution.
//!
//! - [`query`] - single-table SELECT builder producing a [`PreparedQuery`]
//! - [`expr`] - expression AST with bound parameters
//! - [`predicate`] - filter and date-range predicates
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod predicate;
pub mod query;


pub use dialect::{Dialect, SqlDialect};
pub use expr::{Expr, ExprExt, SqlValue};
pub use query::{PreparedQuery, Query, SelectExpr};

use crate::spec::Granularity;

/// Errors raised while building a query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SqlError {
    #[error("value cannot be bound as a parameter: {0}")]
    UnsupportedValue(String),

    #[error("{dialect} cannot bucket dates by {granularity:?}")]
    UnsupportedGranularity {
        dialect: &'static str,
        granularity: Granularity,
    },

    #[error("unknown column: {0}")]
    UnknownColumn(String),
}
