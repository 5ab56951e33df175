//! Resolved filter predicates and their in-process evaluation.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde_json::Value;

use super::field::FieldName;
use super::types::FilterOperator;
use crate::value::{loose_cmp, loose_eq, parse_datetime, Record};

/// A validated filter bound to a typed field.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: FieldName,
    pub operator: FilterOperator,
    pub value: Value,
    /// Upper bound, present iff `operator` is `Between`.
    pub value2: Option<Value>,
}

impl Predicate {
    /// Evaluate against a record.
    ///
    /// Follows SQL semantics: a missing value never matches, not even for
    /// `not_equals` or `not_in`.
    pub fn matches(&self, record: &Record) -> bool {
        let Some(actual) = self.field.extract(record) else {
            return false;
        };
        if actual.is_null() {
            return false;
        }

        let cmp = |expected: &Value| loose_cmp(&actual, expected);

        match self.operator {
            FilterOperator::Equals => loose_eq(&actual, &self.value),
            FilterOperator::NotEquals => !loose_eq(&actual, &self.value),
            FilterOperator::Contains => {
                let needle = match &self.value {
                    Value::String(s) => s.to_lowercase(),
                    other => other.to_string().to_lowercase(),
                };
                let haystack = match &actual {
                    Value::String(s) => s.to_lowercase(),
                    other => other.to_string().to_lowercase(),
                };
                haystack.contains(&needle)
            }
            FilterOperator::Gt => cmp(&self.value) == Some(Ordering::Greater),
            FilterOperator::Gte => matches!(
                cmp(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::Lt => cmp(&self.value) == Some(Ordering::Less),
            FilterOperator::Lte => {
                matches!(cmp(&self.value), Some(Ordering::Less | Ordering::Equal))
            }
            FilterOperator::In => self.set_contains(&actual),
            FilterOperator::NotIn => !self.set_contains(&actual),
            FilterOperator::Between => {
                let Some(high) = &self.value2 else {
                    return false;
                };
                matches!(cmp(&self.value), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(cmp(high), Some(Ordering::Less | Ordering::Equal))
            }
        }
    }

    fn set_contains(&self, actual: &Value) -> bool {
        self.value
            .as_array()
            .is_some_and(|items| items.iter().any(|item| loose_eq(actual, item)))
    }
}

/// Half-open timestamp bounds of a date range: `start <= ts < end`.
///
/// Both bounds sit on whole seconds, so a fractional timestamp compares the
/// same way here as after SQLite's `datetime()` truncates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBounds {
    pub start: NaiveDateTime,
    /// Exclusive.
    pub end: NaiveDateTime,
}

impl DateBounds {
    /// Whether `value` parses as a timestamp within the bounds.
    pub fn contains(&self, value: &Value) -> bool {
        parse_datetime(value).is_some_and(|ts| ts >= self.start && ts < self.end)
    }

    /// Bounds formatted for binding as SQL parameters.
    pub fn as_sql_strings(&self) -> (String, String) {
        const FMT: &str = "%Y-%m-%d %H:%M:%S";
        (
            self.start.format(FMT).to_string(),
            self.end.format(FMT).to_string(),
        )
    }
}
