use quarry::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

const SCHEMA: &str = r#"
    CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        category TEXT,
        status TEXT,
        total REAL,
        customer_id TEXT,
        created_at TEXT
    );
    INSERT INTO orders VALUES (1, 'A', 'delivered', 4, 'c1', '2024-01-05');
    INSERT INTO orders VALUES (2, 'A', 'delivered', 6, 'c2', '2024-02-10');
    INSERT INTO orders VALUES (3, 'A', 'cancelled', 100, 'c1', '2024-02-11');
    INSERT INTO orders VALUES (4, 'B', 'delivered', 20, 'c3', '2024-03-01');
    INSERT INTO orders VALUES (5, 'C', 'pending', 7, 'c3', '2024-03-02');
"#;

fn engine() -> ReportEngine {
    let source = SqliteSource::open_in_memory().unwrap();
    source.execute_batch(SCHEMA).unwrap();
    ReportEngine::new(Arc::new(source))
}

fn values(result: &ReportResult) -> Vec<Value> {
    result.rows.iter().cloned().map(Value::Object).collect()
}

#[tokio::test]
async fn test_push_down_delivered_revenue_by_category() {
    let spec = ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("revenue", Aggregation::Sum))
        .filter(Filter::new("status", FilterOperator::Equals, "delivered"))
        .sort(Sort::asc("category"));

    let result = engine().execute(&spec, "t1", true).await.unwrap();

    assert_eq!(result.metadata.strategy, ExecutionStrategy::PushDown);
    assert_eq!(
        values(&result),
        vec![
            json!({"category": "A", "revenue": 10.0}),
            json!({"category": "B", "revenue": 20.0}),
        ]
    );
}

#[tokio::test]
async fn test_push_down_matches_pull_for_month_buckets() {
    let spec = ReportSpec::new()
        .dimension(Dimension::new("created_at").with_granularity(Granularity::Month))
        .metric(Metric::new("revenue", Aggregation::Sum))
        .metric(Metric::new("customer_id", Aggregation::CountDistinct))
        .sort(Sort::asc("created_at"))
        .date_range(DateRange::new("2024-02-01", "2024-03-01"));

    let pushed = engine().execute(&spec, "t1", true).await.unwrap();
    assert_eq!(pushed.metadata.strategy, ExecutionStrategy::PushDown);

    let memory = MemorySource::from_json(&json!({
        "orders": [
            {"category": "A", "status": "delivered", "total": 4, "customer_id": "c1", "created_at": "2024-01-05"},
            {"category": "A", "status": "delivered", "total": 6, "customer_id": "c2", "created_at": "2024-02-10"},
            {"category": "A", "status": "cancelled", "total": 100, "customer_id": "c1", "created_at": "2024-02-11"},
            {"category": "B", "status": "delivered", "total": 20, "customer_id": "c3", "created_at": "2024-03-01"},
            {"category": "C", "status": "pending", "total": 7, "customer_id": "c3", "created_at": "2024-03-02"}
        ]
    }))
    .unwrap();
    let pulled = ReportEngine::new(Arc::new(memory))
        .execute(&spec, "t1", true)
        .await
        .unwrap();
    assert_eq!(pulled.metadata.strategy, ExecutionStrategy::PullAndAggregate);

    assert_eq!(values(&pushed), values(&pulled));
    assert_eq!(
        values(&pushed),
        vec![
            json!({"created_at": "2024-02", "revenue": 106.0, "customer_id": 2.0}),
            json!({"created_at": "2024-03", "revenue": 20.0, "customer_id": 1.0}),
        ]
    );
}

#[tokio::test]
async fn test_week_buckets_fall_back_to_pull() {
    let spec = ReportSpec::new()
        .dimension(Dimension::new("created_at").with_granularity(Granularity::Week))
        .metric(Metric::new("orders", Aggregation::Sum))
        .sort(Sort::asc("created_at"));

    let result = engine().execute(&spec, "t1", true).await.unwrap();

    assert_eq!(result.metadata.strategy, ExecutionStrategy::PullAndAggregate);
    assert_eq!(
        values(&result),
        vec![
            json!({"created_at": "2024-W01", "orders": 1.0}),
            json!({"created_at": "2024-W06", "orders": 2.0}),
            json!({"created_at": "2024-W09", "orders": 2.0}),
        ]
    );
}

#[tokio::test]
async fn test_unknown_column_falls_back_and_yields_nulls() {
    // Orders carry no payment method column here.
    let spec = ReportSpec::new()
        .dimension(Dimension::new("payment_method"))
        .metric(Metric::new("revenue", Aggregation::Sum));

    let result = engine().execute(&spec, "t1", true).await.unwrap();

    assert_eq!(result.metadata.strategy, ExecutionStrategy::PullAndAggregate);
    assert_eq!(
        values(&result),
        vec![json!({"payment_method": null, "revenue": 137.0})]
    );
}

#[tokio::test]
async fn test_missing_table_is_a_source_error() {
    let spec = ReportSpec::new()
        .dimension(Dimension::new("brand"))
        .metric(Metric::new("stock", Aggregation::Sum));

    let err = engine().execute(&spec, "t1", true).await.unwrap_err();
    assert!(matches!(err, ReportError::SourceQuery(_)));
}

/// Run `spec` by push-down on SQLite seeded with `schema`, and by pull on a
/// memory source holding the same `rows`.
async fn both_paths(schema: &str, rows: Value, spec: &ReportSpec) -> (Vec<Value>, Vec<Value>) {
    let sqlite = SqliteSource::open_in_memory().unwrap();
    sqlite.execute_batch(schema).unwrap();
    let pushed = ReportEngine::new(Arc::new(sqlite))
        .execute(spec, "t1", true)
        .await
        .unwrap();
    assert_eq!(pushed.metadata.strategy, ExecutionStrategy::PushDown);

    let memory = MemorySource::from_json(&rows).unwrap();
    let pulled = ReportEngine::new(Arc::new(memory))
        .execute(spec, "t1", true)
        .await
        .unwrap();
    assert_eq!(pulled.metadata.strategy, ExecutionStrategy::PullAndAggregate);

    (values(&pushed), values(&pulled))
}

#[tokio::test]
async fn test_orders_counts_rows_even_with_an_orders_column() {
    let schema = r#"
        CREATE TABLE orders (id INTEGER PRIMARY KEY, category TEXT, orders INTEGER);
        INSERT INTO orders VALUES (1, 'A', NULL);
        INSERT INTO orders VALUES (2, 'A', 7);
    "#;
    let rows = json!({"orders": [
        {"id": 1, "category": "A", "orders": null},
        {"id": 2, "category": "A", "orders": 7}
    ]});
    let spec = ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("orders", Aggregation::Sum));

    let (pushed, pulled) = both_paths(schema, rows, &spec).await;
    assert_eq!(pushed, pulled);
    assert_eq!(pushed, vec![json!({"category": "A", "orders": 2.0})]);
}

const MIXED_SCHEMA: &str = r#"
    CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        category TEXT,
        quantity TEXT,
        total TEXT,
        amount REAL,
        customer_id TEXT
    );
    INSERT INTO orders VALUES (1, 'A', '4', 'n/a', 5, 'c1');
    INSERT INTO orders VALUES (2, 'A', 'n/a', '3', NULL, 'c1');
    INSERT INTO orders VALUES (3, 'A', NULL, NULL, NULL, NULL);
    INSERT INTO orders VALUES (4, 'B', '2.5', '10', 1, 'c2');
    INSERT INTO orders VALUES (5, 'B', '10', NULL, 2.5, 'c3');
    INSERT INTO orders VALUES (6, 'B', ' 7 ', '', NULL, 'c3');
"#;

fn mixed_rows() -> Value {
    json!({"orders": [
        {"id": 1, "category": "A", "quantity": "4", "total": "n/a", "amount": 5.0, "customer_id": "c1"},
        {"id": 2, "category": "A", "quantity": "n/a", "total": "3", "amount": null, "customer_id": "c1"},
        {"id": 3, "category": "A", "quantity": null, "total": null, "amount": null, "customer_id": null},
        {"id": 4, "category": "B", "quantity": "2.5", "total": "10", "amount": 1.0, "customer_id": "c2"},
        {"id": 5, "category": "B", "quantity": "10", "total": null, "amount": 2.5, "customer_id": "c3"},
        {"id": 6, "category": "B", "quantity": " 7 ", "total": "", "amount": null, "customer_id": "c3"}
    ]})
}

#[tokio::test]
async fn test_every_aggregation_agrees_over_nulls_and_text() {
    // Per category: A holds 4, 'n/a', NULL; B holds 2.5, 10, ' 7 '.
    let cases = [
        (Aggregation::Sum, 4.0, 19.5),
        (Aggregation::Avg, 4.0, 6.5),
        (Aggregation::Min, 4.0, 2.5),
        (Aggregation::Max, 4.0, 10.0),
        (Aggregation::Count, 3.0, 3.0),
        (Aggregation::CountDistinct, 2.0, 3.0),
    ];
    for (aggregation, a, b) in cases {
        let spec = ReportSpec::new()
            .dimension(Dimension::new("category"))
            .metric(Metric::new("quantity", aggregation))
            .sort(Sort::asc("category"));

        let (pushed, pulled) = both_paths(MIXED_SCHEMA, mixed_rows(), &spec).await;
        assert_eq!(pushed, pulled, "{:?}", aggregation);
        assert_eq!(
            pushed,
            vec![
                json!({"category": "A", "quantity": a}),
                json!({"category": "B", "quantity": b}),
            ],
            "{:?}",
            aggregation
        );
    }
}

#[tokio::test]
async fn test_count_distinct_customers_skips_nulls_on_both_paths() {
    let spec = ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("customer_id", Aggregation::CountDistinct))
        .sort(Sort::asc("category"));

    let (pushed, pulled) = both_paths(MIXED_SCHEMA, mixed_rows(), &spec).await;
    assert_eq!(pushed, pulled);
    assert_eq!(
        pushed,
        vec![
            json!({"category": "A", "customer_id": 1.0}),
            json!({"category": "B", "customer_id": 2.0}),
        ]
    );
}

#[tokio::test]
async fn test_revenue_skips_text_totals_on_both_paths() {
    // A: 'n/a' falls through to amount 5, '3' counts, the empty row is 0.
    // B: 10, then amount 2.5, then '' falls through to 0.
    let spec = ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("revenue", Aggregation::Sum))
        .metric(Metric::new("avg_order_value", Aggregation::Avg))
        .sort(Sort::asc("category"));

    let (pushed, pulled) = both_paths(MIXED_SCHEMA, mixed_rows(), &spec).await;
    assert_eq!(pushed, pulled);
    assert_eq!(
        pushed,
        vec![
            json!({"category": "A", "revenue": 8.0, "avg_order_value": 8.0 / 3.0}),
            json!({"category": "B", "revenue": 12.5, "avg_order_value": 12.5 / 3.0}),
        ]
    );
}

#[tokio::test]
async fn test_numeric_range_filter_ignores_text_cells() {
    let spec = ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("orders", Aggregation::Sum))
        .filter(Filter::new("quantity", FilterOperator::Gt, 3))
        .sort(Sort::asc("category"));

    let (pushed, pulled) = both_paths(MIXED_SCHEMA, mixed_rows(), &spec).await;
    assert_eq!(pushed, pulled);
    assert_eq!(
        pushed,
        vec![
            json!({"category": "A", "orders": 1.0}),
            json!({"category": "B", "orders": 2.0}),
        ]
    );
}

#[tokio::test]
async fn test_bare_end_date_keeps_fractional_last_second() {
    let schema = r#"
        CREATE TABLE orders (id INTEGER PRIMARY KEY, category TEXT, total REAL, created_at TEXT);
        INSERT INTO orders VALUES (1, 'A', 1, '2024-01-15');
        INSERT INTO orders VALUES (2, 'A', 10, '2024-01-31 23:59:59.5');
        INSERT INTO orders VALUES (3, 'A', 100, '2024-02-01 00:00:00');
        INSERT INTO orders VALUES (4, 'A', 1000, '2023-12-31 23:59:59.9');
    "#;
    let rows = json!({"orders": [
        {"id": 1, "category": "A", "total": 1.0, "created_at": "2024-01-15"},
        {"id": 2, "category": "A", "total": 10.0, "created_at": "2024-01-31 23:59:59.5"},
        {"id": 3, "category": "A", "total": 100.0, "created_at": "2024-02-01 00:00:00"},
        {"id": 4, "category": "A", "total": 1000.0, "created_at": "2023-12-31 23:59:59.9"}
    ]});
    let spec = ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("revenue", Aggregation::Sum))
        .date_range(DateRange::new("2024-01-01", "2024-01-31"));

    let (pushed, pulled) = both_paths(schema, rows, &spec).await;
    assert_eq!(pushed, pulled);
    assert_eq!(pushed, vec![json!({"category": "A", "revenue": 11.0})]);
}
