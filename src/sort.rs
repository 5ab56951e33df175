//! Sorting and pagination of aggregated rows.

use std::cmp::Ordering;

use serde_json::Value;

use crate::spec::{ResolvedSort, Row, SortDirection};

/// Rank of a value kind in ascending order. Nulls come last.
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Number(_) => 0,
        Value::Bool(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) | Value::Object(_) => 3,
        Value::Null => 4,
    }
}

/// Ascending comparison of two cell values.
///
/// Numbers compare numerically, strings case-folded with the raw text as a
/// tiebreak. Missing cells compare as null.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x
            .to_lowercase()
            .cmp(&y.to_lowercase())
            .then_with(|| x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Stable multi-key sort. The first non-equal key decides; no keys keeps
/// the current order.
pub fn sort_rows(rows: &mut [Row], sorting: &[ResolvedSort]) {
    if sorting.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for key in sorting {
            let field = key.field.as_str();
            let ord = compare_values(a.get(field), b.get(field));
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Slice `[offset, offset + limit)`. Out-of-range offsets yield no rows.
pub fn paginate(rows: Vec<Row>, limit: Option<usize>, offset: Option<usize>) -> Vec<Row> {
    let offset = offset.unwrap_or(0);
    let iter = rows.into_iter().skip(offset);
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}
