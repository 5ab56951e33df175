//! The fixed catalog of selectable dimensions and metrics.

use once_cell::sync::Lazy;

use super::field::FieldName;
use super::types::{Aggregation, DataType, Dimension, Metric, MetricFormat};

/// Catalog entry for a groupable field.
#[derive(Debug, Clone, Copy)]
pub struct DimensionEntry {
    pub field: FieldName,
    pub label: &'static str,
    pub data_type: DataType,
}

/// Catalog entry for an aggregatable field.
#[derive(Debug, Clone, Copy)]
pub struct MetricEntry {
    pub field: FieldName,
    pub label: &'static str,
    pub aggregation: Aggregation,
    pub format: Option<MetricFormat>,
}

const DIMENSIONS: &[DimensionEntry] = &[
    dim(FieldName::CreatedAt, "Order Date", DataType::Date),
    dim(FieldName::Status, "Order Status", DataType::String),
    dim(FieldName::Category, "Product Category", DataType::String),
    dim(FieldName::PaymentMethod, "Payment Method", DataType::String),
    dim(FieldName::Region, "Region", DataType::String),
    dim(FieldName::Channel, "Sales Channel", DataType::String),
    dim(FieldName::CustomerSegment, "Customer Segment", DataType::String),
    dim(FieldName::ProductName, "Product", DataType::String),
    dim(FieldName::Brand, "Brand", DataType::String),
    dim(FieldName::Country, "Country", DataType::String),
    dim(FieldName::Date, "Date", DataType::Date),
];

const METRICS: &[MetricEntry] = &[
    metric(FieldName::Revenue, "Revenue", Aggregation::Sum, Some(MetricFormat::Currency)),
    metric(FieldName::Orders, "Orders", Aggregation::Sum, Some(MetricFormat::Number)),
    metric(
        FieldName::AvgOrderValue,
        "Average Order Value",
        Aggregation::Avg,
        Some(MetricFormat::Currency),
    ),
    metric(FieldName::Cost, "Cost", Aggregation::Sum, Some(MetricFormat::Currency)),
    metric(FieldName::Profit, "Profit", Aggregation::Sum, Some(MetricFormat::Currency)),
    metric(
        FieldName::ProfitMargin,
        "Profit Margin",
        Aggregation::Avg,
        Some(MetricFormat::Percentage),
    ),
    metric(FieldName::Quantity, "Units Sold", Aggregation::Sum, Some(MetricFormat::Number)),
    metric(FieldName::Discount, "Discounts", Aggregation::Sum, Some(MetricFormat::Currency)),
    metric(
        FieldName::CustomerId,
        "Unique Customers",
        Aggregation::CountDistinct,
        Some(MetricFormat::Number),
    ),
    metric(FieldName::Price, "Price", Aggregation::Avg, Some(MetricFormat::Currency)),
    metric(FieldName::Stock, "Stock on Hand", Aggregation::Sum, Some(MetricFormat::Number)),
    metric(
        FieldName::LifetimeValue,
        "Customer Lifetime Value",
        Aggregation::Avg,
        Some(MetricFormat::Currency),
    ),
    metric(FieldName::Sessions, "Sessions", Aggregation::Sum, Some(MetricFormat::Number)),
    metric(
        FieldName::ConversionRate,
        "Conversion Rate",
        Aggregation::Avg,
        Some(MetricFormat::Percentage),
    ),
];

const fn dim(field: FieldName, label: &'static str, data_type: DataType) -> DimensionEntry {
    DimensionEntry {
        field,
        label,
        data_type,
    }
}

const fn metric(
    field: FieldName,
    label: &'static str,
    aggregation: Aggregation,
    format: Option<MetricFormat>,
) -> MetricEntry {
    MetricEntry {
        field,
        label,
        aggregation,
        format,
    }
}

static DIMENSION_LIST: Lazy<Vec<Dimension>> = Lazy::new(|| {
    DIMENSIONS
        .iter()
        .map(|e| Dimension {
            field: e.field.as_str().to_string(),
            label: e.label.to_string(),
            data_type: e.data_type,
            granularity: None,
        })
        .collect()
});

static METRIC_LIST: Lazy<Vec<Metric>> = Lazy::new(|| {
    METRICS
        .iter()
        .map(|e| Metric {
            field: e.field.as_str().to_string(),
            label: e.label.to_string(),
            aggregation: e.aggregation,
            format: e.format,
        })
        .collect()
});

/// All selectable dimensions.
pub fn list_dimensions() -> &'static [Dimension] {
    &DIMENSION_LIST
}

/// All selectable metrics, with their default aggregation and format.
pub fn list_metrics() -> &'static [Metric] {
    &METRIC_LIST
}

pub fn dimension_entry(field: FieldName) -> Option<&'static DimensionEntry> {
    DIMENSIONS.iter().find(|e| e.field == field)
}

pub fn metric_entry(field: FieldName) -> Option<&'static MetricEntry> {
    METRICS.iter().find(|e| e.field == field)
}

/// Display label for any catalog field.
pub fn label_for(field: FieldName) -> &'static str {
    dimension_entry(field)
        .map(|e| e.label)
        .or_else(|| metric_entry(field).map(|e| e.label))
        .unwrap_or_else(|| field.as_str())
}
