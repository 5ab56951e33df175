//! Push-down: one parameterized aggregate query executed by the source.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::aggregate::metric_value;
use crate::source::{RecordSource, SourceError, SourceResult, Table};
use crate::spec::{Aggregation, FieldName, ResolvedSpec, Row};
use crate::sql::expr::{aggregate, count_distinct, count_star, numeric, AggregateFunction};
use crate::sql::predicate::{date_range_expr, filter_expr};
use crate::sql::{Dialect, Expr, PreparedQuery, Query, SqlError};
use crate::value::{as_number, Record};

fn field_sql(
    field: FieldName,
    table: Table,
    columns: &HashSet<String>,
) -> SourceResult<Expr> {
    field.sql_expr(columns).map_err(|e| to_source_error(e, table))
}

fn to_source_error(err: SqlError, table: Table) -> SourceError {
    match err {
        SqlError::UnknownColumn(field) => SourceError::UnknownField {
            table: table.name().to_string(),
            field,
        },
        other => SourceError::Unsupported(other.to_string()),
    }
}

/// Aggregate call for one metric. Numeric aggregates see non-numeric cells
/// as NULL, so they are skipped exactly as the in-process path skips them.
fn metric_sql(aggregation: Aggregation, field: FieldName, expr: Expr) -> Expr {
    let func = match aggregation {
        Aggregation::Count => return count_star(),
        Aggregation::CountDistinct => return count_distinct(expr),
        Aggregation::Sum => AggregateFunction::Sum,
        Aggregation::Avg => AggregateFunction::Avg,
        Aggregation::Min => AggregateFunction::Min,
        Aggregation::Max => AggregateFunction::Max,
    };
    // Derived formulas coerce their own inputs.
    let value = if field.is_derived() { expr } else { numeric(expr) };
    aggregate(func, value)
}

/// Build the aggregate query for `spec` against a table with `columns`.
///
/// Constructs the dialect cannot express come back as
/// [`SourceError::Unsupported`] or [`SourceError::UnknownField`].
pub fn build_query(
    spec: &ResolvedSpec,
    table: Table,
    columns: &HashSet<String>,
    dialect: Dialect,
) -> SourceResult<PreparedQuery> {
    if !spec.groups_all_dimensions() {
        return Err(SourceError::Unsupported(
            "grouping by a subset of dimensions".into(),
        ));
    }

    let mut query = Query::from(table.name());

    for dimension in &spec.dimensions {
        let mut expr = field_sql(dimension.field, table, columns)?;
        if let Some(granularity) = dimension.granularity {
            expr = Expr::DateBucket {
                granularity,
                expr: Box::new(Expr::Timestamp(Box::new(expr))),
            };
        }
        query = query
            .select(expr.clone(), dimension.field.as_str())
            .group_by(expr);
    }

    for metric in &spec.metrics {
        let expr = field_sql(metric.field, table, columns)?;
        query = query.select(
            metric_sql(metric.aggregation, metric.field, expr),
            metric.key(),
        );
    }

    for predicate in &spec.filters {
        let field = field_sql(predicate.field, table, columns)?;
        let expr = filter_expr(predicate, field).map_err(|e| to_source_error(e, table))?;
        query = query.filter(expr);
    }

    if let Some(bounds) = &spec.date_range {
        let column = table.timestamp_column();
        if !columns.contains(column) {
            return Err(SourceError::UnknownField {
                table: table.name().to_string(),
                field: column.to_string(),
            });
        }
        query = query.filter(date_range_expr(bounds, column));
    }

    query
        .to_prepared(dialect)
        .map_err(|e| to_source_error(e, table))
}

/// Reshape result records into output rows: dimensions then metrics, with
/// metrics as floats and SQL NULL aggregates as 0.
fn normalize(records: Vec<Record>, spec: &ResolvedSpec) -> Vec<Row> {
    records
        .into_iter()
        .map(|mut record| {
            let mut row = Row::new();
            for dimension in &spec.dimensions {
                let key = dimension.field.as_str();
                row.insert(
                    key.to_string(),
                    record.remove(key).unwrap_or(Value::Null),
                );
            }
            for metric in &spec.metrics {
                let value = record
                    .get(metric.key())
                    .and_then(as_number)
                    .unwrap_or(0.0);
                row.insert(metric.key().to_string(), metric_value(value));
            }
            row
        })
        .collect()
}

pub(super) async fn run(
    source: &dyn RecordSource,
    spec: &ResolvedSpec,
    table: Table,
) -> SourceResult<Vec<Row>> {
    let dialect = source.push_down_dialect().ok_or_else(|| {
        SourceError::Unsupported(format!("{} does not support push-down", source.name()))
    })?;
    let columns = source.columns(table).await?;
    let query = build_query(spec, table, &columns, dialect)?;
    debug!(sql = %query.sql, params = query.params.len(), "push-down query");

    let records = source.execute(&query).await?;
    Ok(normalize(records, spec))
}
