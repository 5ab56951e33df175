//! In-process aggregation.
//!
//! - [`group`] - partitioning records by (bucketed) dimension values
//! - [`format`] - `_formatted` display columns
//!
//! Metric values are extracted per record through [`FieldName::extract`], so
//! derived fields aggregate with the same formulas the push-down path emits.

pub mod format;
pub mod group;

pub use format::{apply_formats, format_metric};
pub use group::{bucket, group_and_aggregate};

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{EngineResult, ReportError};
use crate::spec::{Aggregation, FieldName};
use crate::value::{as_number, Record};

/// Wrap an aggregate as a JSON number. Non-finite results collapse to 0.
pub fn metric_value(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .or_else(|| serde_json::Number::from_f64(0.0))
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Numeric values of `field` across `records`.
///
/// Booleans, nulls and non-numeric strings are skipped; objects and arrays
/// are an error.
pub fn numeric_values(field: FieldName, records: &[&Record]) -> EngineResult<Vec<f64>> {
    let mut values = Vec::with_capacity(records.len());
    for record in records {
        match field.extract(record) {
            Some(v @ (Value::Object(_) | Value::Array(_))) => {
                return Err(ReportError::aggregation(format!(
                    "field '{}' holds a non-scalar value: {}",
                    field, v
                )));
            }
            Some(v) => values.extend(as_number(&v)),
            None => {}
        }
    }
    Ok(values)
}

/// Aggregate `field` over one partition.
///
/// Empty inputs yield 0 for every function.
pub fn aggregate(
    aggregation: Aggregation,
    field: FieldName,
    records: &[&Record],
) -> EngineResult<Value> {
    let result = match aggregation {
        Aggregation::Count => records.len() as f64,
        Aggregation::CountDistinct => {
            let mut seen = HashSet::new();
            for record in records {
                match field.extract(record) {
                    None | Some(Value::Null) => {}
                    Some(v) => {
                        seen.insert(v.to_string());
                    }
                }
            }
            seen.len() as f64
        }
        Aggregation::Sum => numeric_values(field, records)?
            .into_iter()
            .fold(0.0, |acc, v| acc + v),
        Aggregation::Avg => {
            let values = numeric_values(field, records)?;
            if values.is_empty() {
                0.0
            } else {
                values.iter().fold(0.0, |acc, v| acc + v) / values.len() as f64
            }
        }
        Aggregation::Min => numeric_values(field, records)?
            .into_iter()
            .reduce(f64::min)
            .unwrap_or(0.0),
        Aggregation::Max => numeric_values(field, records)?
            .into_iter()
            .reduce(f64::max)
            .unwrap_or(0.0),
    };
    Ok(metric_value(result))
}
