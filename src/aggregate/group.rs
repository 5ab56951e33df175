//! Partitioning records into groups.

use std::collections::HashMap;

use chrono::Datelike;
use serde_json::Value;

use super::aggregate;
use crate::error::{EngineResult, ReportError};
use crate::spec::{Granularity, ResolvedDimension, ResolvedSpec, Row};
use crate::value::{parse_datetime, Record};

/// Bucket a date value at `granularity`.
///
/// Day `2024-03-15`, week `2024-W11` (ISO), month `2024-03`, quarter
/// `2024-Q1`, year `2024`. Null passes through.
pub fn bucket(granularity: Granularity, value: &Value) -> EngineResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let ts = parse_datetime(value).ok_or_else(|| {
        ReportError::aggregation(format!("cannot bucket non-date value {}", value))
    })?;
    let label = match granularity {
        Granularity::Day => ts.format("%Y-%m-%d").to_string(),
        Granularity::Week => {
            let week = ts.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        Granularity::Month => ts.format("%Y-%m").to_string(),
        Granularity::Quarter => format!("{}-Q{}", ts.year(), (ts.month() - 1) / 3 + 1),
        Granularity::Year => ts.format("%Y").to_string(),
    };
    Ok(Value::String(label))
}

fn dimension_value(dimension: &ResolvedDimension, record: &Record) -> EngineResult<Value> {
    let raw = dimension.field.extract(record).unwrap_or(Value::Null);
    match dimension.granularity {
        Some(granularity) => bucket(granularity, &raw),
        None => Ok(raw),
    }
}

/// Group `records` by the spec's group keys and aggregate every metric.
///
/// Output rows carry the dimensions, then the metrics, keyed by field name.
/// Groups appear in first-seen order. Dimensions outside the group keys take
/// the value of the group's first record. Without group keys every record
/// lands in a single row.
pub fn group_and_aggregate(records: &[Record], spec: &ResolvedSpec) -> EngineResult<Vec<Row>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Record>> = Vec::new();

    for record in records {
        let key = spec
            .group_keys
            .iter()
            .map(|d| dimension_value(d, record))
            .collect::<EngineResult<Vec<_>>>()?;
        // Serialized tuples keep `1` and `"1"` apart.
        let key = Value::Array(key).to_string();
        match index.get(&key) {
            Some(&i) => groups[i].push(record),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![record]);
            }
        }
    }

    if spec.group_keys.is_empty() && groups.is_empty() {
        groups.push(Vec::new());
    }

    let mut rows = Vec::with_capacity(groups.len());
    for members in groups {
        let mut row = Row::new();
        for dimension in &spec.dimensions {
            let value = match members.first() {
                Some(first) => dimension_value(dimension, first)?,
                None => Value::Null,
            };
            row.insert(dimension.field.as_str().to_string(), value);
        }
        for metric in &spec.metrics {
            let value = aggregate(metric.aggregation, metric.field, &members)?;
            row.insert(metric.key().to_string(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}
