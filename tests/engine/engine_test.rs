use quarry::prelude::*;
use quarry::spec::Row;
use quarry::templates::TemplateError;
use serde_json::{json, Value};
use std::sync::Arc;

fn orders() -> Vec<quarry::value::Record> {
    [
        json!({"id": 1, "category": "A", "status": "delivered", "total": 4, "customer_id": "c1", "created_at": "2024-01-05"}),
        json!({"id": 2, "category": "A", "status": "delivered", "total": 6, "customer_id": "c2", "created_at": "2024-02-10"}),
        json!({"id": 3, "category": "A", "status": "cancelled", "total": 100, "customer_id": "c1", "created_at": "2024-02-11"}),
        json!({"id": 4, "category": "B", "status": "delivered", "total": 20, "customer_id": "c3", "created_at": "2024-03-01"}),
        json!({"id": 5, "category": "C", "status": "pending", "total": 7, "customer_id": "c3", "created_at": "2024-03-02"}),
    ]
    .into_iter()
    .filter_map(|v| v.as_object().cloned())
    .collect()
}

fn engine() -> ReportEngine {
    let source = MemorySource::new().with_table(Table::Orders, orders());
    ReportEngine::new(Arc::new(source))
}

fn delivered_by_category() -> ReportSpec {
    ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("revenue", Aggregation::Sum))
        .filter(Filter::new("status", FilterOperator::Equals, "delivered"))
        .sort(Sort::asc("category"))
}

fn as_values(rows: &[Row]) -> Vec<Value> {
    rows.iter().cloned().map(Value::Object).collect()
}

#[tokio::test]
async fn test_delivered_revenue_by_category() {
    let result = engine()
        .execute(&delivered_by_category(), "t1", true)
        .await
        .unwrap();

    assert_eq!(
        as_values(&result.rows),
        vec![
            json!({"category": "A", "revenue": 10.0}),
            json!({"category": "B", "revenue": 20.0}),
        ]
    );
    assert_eq!(result.metadata.row_count, 2);
    assert_eq!(result.metadata.total_rows, 2);
    assert_eq!(result.metadata.table, "orders");
    assert_eq!(result.metadata.strategy, ExecutionStrategy::PullAndAggregate);
    assert!(!result.metadata.cached);
}

#[tokio::test]
async fn test_cancelled_row_is_filtered_before_grouping() {
    let source = MemorySource::from_json(&json!({
        "orders": [
            {"category": "A", "total": 10, "status": "delivered"},
            {"category": "A", "total": 5, "status": "cancelled"},
            {"category": "B", "total": 20, "status": "delivered"}
        ]
    }))
    .unwrap();
    let spec = ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("revenue", Aggregation::Sum))
        .filter(Filter::new("status", FilterOperator::Equals, "delivered"));

    let result = ReportEngine::new(Arc::new(source))
        .execute(&spec, "t1", true)
        .await
        .unwrap();
    assert_eq!(
        as_values(&result.rows),
        vec![
            json!({"category": "A", "revenue": 10.0}),
            json!({"category": "B", "revenue": 20.0}),
        ]
    );
}

#[tokio::test]
async fn test_second_call_is_served_from_cache() {
    let engine = engine();
    let spec = delivered_by_category();

    let first = engine.execute(&spec, "t1", true).await.unwrap();
    let second = engine.execute(&spec, "t1", true).await.unwrap();

    assert!(!first.metadata.cached);
    assert!(second.metadata.cached);
    assert_eq!(first.rows, second.rows);

    let stats = engine.cache_stats().unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn test_cache_is_per_tenant_and_optional() {
    let engine = engine();
    let spec = delivered_by_category();

    engine.execute(&spec, "t1", true).await.unwrap();
    let other_tenant = engine.execute(&spec, "t2", true).await.unwrap();
    assert!(!other_tenant.metadata.cached);

    let bypass = engine.execute(&spec, "t1", false).await.unwrap();
    assert!(!bypass.metadata.cached);
}

#[tokio::test]
async fn test_clear_cache_for_one_tenant() {
    let engine = engine();
    let spec = delivered_by_category();
    engine.execute(&spec, "t1", true).await.unwrap();
    engine.execute(&spec, "t2", true).await.unwrap();

    assert_eq!(engine.clear_cache(Some("t1")), 1);
    assert!(!engine.execute(&spec, "t1", true).await.unwrap().metadata.cached);
    assert!(engine.execute(&spec, "t2", true).await.unwrap().metadata.cached);
}

#[tokio::test]
async fn test_between_without_value2_is_rejected() {
    let spec = ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("revenue", Aggregation::Sum))
        .filter(Filter::new("quantity", FilterOperator::Between, 1));

    let err = engine().execute(&spec, "t1", true).await.unwrap_err();
    match err {
        ReportError::InvalidSpec { field, .. } => assert_eq!(field, "filters[0].value2"),
        other => panic!("expected InvalidSpec, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_field_is_rejected() {
    let spec = ReportSpec::new()
        .dimension(Dimension::new("warehouse"))
        .metric(Metric::new("revenue", Aggregation::Sum));

    let err = engine().execute(&spec, "t1", true).await.unwrap_err();
    assert!(matches!(err, ReportError::InvalidSpec { .. }));
    assert!(err.to_string().contains("warehouse"));
}

#[tokio::test]
async fn test_sort_then_paginate_reports_total_rows() {
    let spec = ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("revenue", Aggregation::Sum))
        .sort(Sort::desc("revenue"))
        .limit(1)
        .offset(1);

    let result = engine().execute(&spec, "t1", true).await.unwrap();
    assert_eq!(
        as_values(&result.rows),
        vec![json!({"category": "B", "revenue": 20.0})]
    );
    assert_eq!(result.metadata.row_count, 1);
    assert_eq!(result.metadata.total_rows, 3);
}

#[tokio::test]
async fn test_formatted_companion_column() {
    let spec = ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("revenue", Aggregation::Sum).with_format(MetricFormat::Currency))
        .metric(Metric::new("customer_id", Aggregation::CountDistinct))
        .sort(Sort::asc("category"));

    let result = engine().execute(&spec, "t1", true).await.unwrap();
    let a = &result.rows[0];
    assert_eq!(a["revenue"], json!(110.0));
    assert_eq!(a["revenue_formatted"], json!("$110.00"));
    assert_eq!(a["customer_id"], json!(2.0));
    assert!(a.get("customer_id_formatted").is_none());
}

#[tokio::test]
async fn test_date_range_and_month_buckets() {
    let spec = ReportSpec::new()
        .dimension(Dimension::new("created_at").with_granularity(Granularity::Month))
        .metric(Metric::new("revenue", Aggregation::Sum))
        .sort(Sort::asc("created_at"))
        .date_range(DateRange::new("2024-02-01", "2024-03-01"));

    let result = engine().execute(&spec, "t1", true).await.unwrap();
    assert_eq!(
        as_values(&result.rows),
        vec![
            json!({"created_at": "2024-02", "revenue": 106.0}),
            json!({"created_at": "2024-03", "revenue": 20.0}),
        ]
    );
}

#[tokio::test]
async fn test_execute_template() {
    let engine = engine();
    let result = engine
        .execute_template("sales-by-category", "t1", None)
        .await
        .unwrap();

    let categories: Vec<&Value> = result.rows.iter().map(|r| &r["category"]).collect();
    assert_eq!(categories, vec!["A", "B", "C"]);
    assert_eq!(result.rows[0]["revenue"], json!(110.0));
    assert_eq!(result.rows[0]["orders"], json!(3.0));
    assert_eq!(result.rows[0]["revenue_formatted"], json!("$110.00"));

    let again = engine
        .execute_template("sales-by-category", "t1", None)
        .await
        .unwrap();
    assert!(again.metadata.cached);
}

#[tokio::test]
async fn test_unknown_template() {
    let err = engine()
        .execute_template("no-such-report", "t1", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReportError::Template(TemplateError::NotFound(ref id)) if id == "no-such-report"
    ));
}

#[test]
fn test_catalog_listing() {
    let engine = engine();
    assert!(engine.list_dimensions().iter().any(|d| d.field == "category"));
    assert!(engine
        .list_metrics()
        .iter()
        .any(|m| m.field == "revenue" && m.aggregation == Aggregation::Sum));
}

#[tokio::test]
async fn test_disabled_cache_has_no_stats() {
    let mut settings = Settings::default();
    settings.cache.enabled = false;
    let source = MemorySource::new().with_table(Table::Orders, orders());
    let engine = ReportEngine::builder(Arc::new(source))
        .settings(settings)
        .build()
        .unwrap();

    let spec = delivered_by_category();
    engine.execute(&spec, "t1", true).await.unwrap();
    assert!(!engine.execute(&spec, "t1", true).await.unwrap().metadata.cached);
    assert!(engine.cache_stats().is_none());
    assert_eq!(engine.clear_cache(None), 0);
}
