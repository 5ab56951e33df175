//! Spec validation.
//!
//! [`validate`] turns a caller-supplied [`ReportSpec`] into a [`ResolvedSpec`]
//! whose fields are typed [`FieldName`]s. Every downstream stage works on the
//! resolved form, so string field names never reach query construction.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};

use super::catalog::{dimension_entry, label_for, metric_entry};
use super::field::FieldName;
use super::predicate::{DateBounds, Predicate};
use super::types::{
    Aggregation, DataType, DateRange, FilterOperator, Granularity, MetricFormat, ReportSpec,
    SortDirection,
};
use crate::error::{EngineResult, ReportError};
use crate::value::parse_datetime_str;

/// A dimension bound to a catalog field.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDimension {
    pub field: FieldName,
    pub label: String,
    /// Only set for date-typed fields.
    pub granularity: Option<Granularity>,
}

/// A metric bound to a catalog field.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetric {
    pub field: FieldName,
    pub label: String,
    pub aggregation: Aggregation,
    pub format: Option<MetricFormat>,
}

impl ResolvedMetric {
    /// Output column key.
    pub fn key(&self) -> &'static str {
        self.field.as_str()
    }

    /// Companion display column key.
    pub fn formatted_key(&self) -> String {
        format!("{}_formatted", self.field.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSort {
    pub field: FieldName,
    pub direction: SortDirection,
}

/// A validated, typed report specification.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSpec {
    pub dimensions: Vec<ResolvedDimension>,
    pub metrics: Vec<ResolvedMetric>,
    pub filters: Vec<Predicate>,
    pub sorting: Vec<ResolvedSort>,
    /// Effective group keys: `grouping` when given, else all dimensions.
    pub group_keys: Vec<ResolvedDimension>,
    pub date_range: Option<DateBounds>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ResolvedSpec {
    /// Every field the spec touches, for source resolution.
    pub fn touched_fields(&self) -> BTreeSet<FieldName> {
        let mut fields = BTreeSet::new();
        fields.extend(self.dimensions.iter().map(|d| d.field));
        fields.extend(self.metrics.iter().map(|m| m.field));
        fields.extend(self.filters.iter().map(|f| f.field));
        fields.extend(self.sorting.iter().map(|s| s.field));
        fields
    }

    /// Whether the group keys cover every dimension.
    pub fn groups_all_dimensions(&self) -> bool {
        self.dimensions
            .iter()
            .all(|d| self.group_keys.iter().any(|g| g.field == d.field))
    }
}

fn resolve_field(raw: &str, location: &str) -> EngineResult<FieldName> {
    raw.parse::<FieldName>()
        .map_err(|reason| ReportError::invalid_spec(location, reason))
}

/// Validate a spec against the catalog.
///
/// Fails on the first problem found, naming the offending field or operator.
pub fn validate(spec: &ReportSpec) -> EngineResult<ResolvedSpec> {
    if spec.dimensions.is_empty() {
        return Err(ReportError::invalid_spec(
            "dimensions",
            "at least one dimension is required",
        ));
    }
    if spec.metrics.is_empty() {
        return Err(ReportError::invalid_spec(
            "metrics",
            "at least one metric is required",
        ));
    }

    // Output column keys are field names, so each field may appear once
    // across dimensions and metrics.
    let mut keys = BTreeSet::new();

    let mut dimensions = Vec::with_capacity(spec.dimensions.len());
    for (i, d) in spec.dimensions.iter().enumerate() {
        let location = format!("dimensions[{}].{}", i, d.field);
        let field = resolve_field(&d.field, &location)?;
        let entry = dimension_entry(field)
            .ok_or_else(|| ReportError::invalid_spec(&location, "field is not groupable"))?;
        if !keys.insert(field) {
            return Err(ReportError::invalid_spec(location, "duplicate dimension"));
        }
        let label = if d.label.is_empty() {
            entry.label.to_string()
        } else {
            d.label.clone()
        };
        let granularity = match entry.data_type {
            DataType::Date => d.granularity,
            _ => None,
        };
        dimensions.push(ResolvedDimension {
            field,
            label,
            granularity,
        });
    }

    let mut metrics = Vec::with_capacity(spec.metrics.len());
    for (i, m) in spec.metrics.iter().enumerate() {
        let location = format!("metrics[{}].{}", i, m.field);
        let field = resolve_field(&m.field, &location)?;
        if !keys.insert(field) {
            return Err(ReportError::invalid_spec(
                location,
                "field already has an output column",
            ));
        }
        let label = if m.label.is_empty() {
            metric_entry(field)
                .map(|e| e.label)
                .unwrap_or_else(|| label_for(field))
                .to_string()
        } else {
            m.label.clone()
        };
        metrics.push(ResolvedMetric {
            field,
            label,
            aggregation: m.aggregation,
            format: m.format,
        });
    }

    let mut filters = Vec::with_capacity(spec.filters.len());
    for (i, f) in spec.filters.iter().enumerate() {
        let location = format!("filters[{}].{}", i, f.field);
        let field = resolve_field(&f.field, &location)?;
        match f.operator {
            FilterOperator::Between if f.value2.is_none() => {
                return Err(ReportError::invalid_spec(
                    format!("filters[{}].value2", i),
                    "operator 'between' requires value2",
                ));
            }
            FilterOperator::In | FilterOperator::NotIn if !f.value.is_array() => {
                return Err(ReportError::invalid_spec(
                    location,
                    format!("operator '{}' requires an array value", f.operator.as_str()),
                ));
            }
            _ => {}
        }
        filters.push(Predicate {
            field,
            operator: f.operator,
            value: f.value.clone(),
            value2: match f.operator {
                FilterOperator::Between => f.value2.clone(),
                _ => None,
            },
        });
    }

    let mut sorting = Vec::with_capacity(spec.sorting.len());
    for (i, s) in spec.sorting.iter().enumerate() {
        let field = resolve_field(&s.field, &format!("sorting[{}].{}", i, s.field))?;
        sorting.push(ResolvedSort {
            field,
            direction: s.direction,
        });
    }

    let group_keys = match spec.grouping.as_deref() {
        Some(grouping) if !grouping.is_empty() => {
            let mut keys = Vec::with_capacity(grouping.len());
            for (i, raw) in grouping.iter().enumerate() {
                let location = format!("grouping[{}].{}", i, raw);
                let field = resolve_field(raw, &location)?;
                let dimension = dimensions
                    .iter()
                    .find(|d| d.field == field)
                    .ok_or_else(|| {
                        ReportError::invalid_spec(&location, "grouping field is not a dimension")
                    })?;
                keys.push(dimension.clone());
            }
            keys
        }
        _ => dimensions.clone(),
    };

    let date_range = spec.date_range.as_ref().map(resolve_date_range).transpose()?;

    Ok(ResolvedSpec {
        dimensions,
        metrics,
        filters,
        sorting,
        group_keys,
        date_range,
        limit: spec.limit,
        offset: spec.offset,
    })
}

fn resolve_date_range(range: &DateRange) -> EngineResult<DateBounds> {
    let start = parse_datetime_str(&range.start).ok_or_else(|| {
        ReportError::invalid_spec("dateRange.start", format!("invalid date '{}'", range.start))
    })?;
    let start = start.with_nanosecond(0).unwrap_or(start);

    let end = match NaiveDate::parse_from_str(range.end.trim(), "%Y-%m-%d") {
        // A bare end date covers the whole day.
        Ok(date) => date.succ_opt().map(|next| next.and_time(NaiveTime::MIN)),
        Err(_) => {
            let end = parse_datetime_str(&range.end).ok_or_else(|| {
                ReportError::invalid_spec("dateRange.end", format!("invalid date '{}'", range.end))
            })?;
            // An explicit end instant is inclusive to the second.
            end.with_nanosecond(0)
                .and_then(|end| end.checked_add_signed(Duration::seconds(1)))
        }
    }
    .ok_or_else(|| ReportError::invalid_spec("dateRange.end", "date out of range"))?;

    if start >= end {
        return Err(ReportError::invalid_spec(
            "dateRange",
            "start must not be after end",
        ));
    }
    Ok(DateBounds { start, end })
}
