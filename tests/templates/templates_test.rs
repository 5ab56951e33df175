use quarry::prelude::*;
use quarry::templates::{ChartType, TemplateError};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;

fn engine() -> ReportEngine {
    let orders = [
        json!({"category": "Books", "status": "delivered", "total": 30, "cost": 10}),
        json!({"category": "Books", "status": "delivered", "total": 20}),
        json!({"category": "Games", "status": "delivered", "total": 50, "cost": 45}),
        json!({"category": "Games", "status": "returned", "total": 500}),
    ]
    .into_iter()
    .filter_map(|v| v.as_object().cloned())
    .collect();
    ReportEngine::new(Arc::new(
        MemorySource::new().with_table(Table::Orders, orders),
    ))
}

#[test]
fn test_builtin_catalog_is_valid() {
    let catalog = TemplateCatalog::builtin();
    assert!(catalog.all().len() >= 10);
    for template in catalog.all() {
        assert!(
            quarry::spec::validate(&template.to_spec()).is_ok(),
            "template {} does not validate",
            template.id
        );
    }
}

#[test]
fn test_lookup_by_category_search_and_featured() {
    let engine = engine();

    let sales = engine.get_template("sales-by-category").unwrap();
    assert_eq!(sales.chart_type, ChartType::Bar);
    assert!(sales.featured);

    let finance: Vec<&str> = engine
        .list_templates_by_category("FINANCE")
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(finance, vec!["profit-by-category", "quarterly-profit"]);

    let hits: Vec<&str> = engine
        .search_templates("Trend")
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert!(hits.contains(&"revenue-trend"));

    assert!(engine.featured_templates().iter().all(|t| t.featured));
    assert!(engine
        .featured_templates()
        .iter()
        .any(|t| t.id == "sales-by-category"));

    assert!(engine.get_template("missing").is_none());
    assert!(engine.search_templates("zzz-no-match").is_empty());
}

#[tokio::test]
async fn test_profit_template_filters_delivered_orders() {
    let result = engine()
        .execute_template("profit-by-category", "t1", None)
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 2);
    let books = &result.rows[0];
    assert_eq!(books["category"], json!("Books"));
    assert_eq!(books["revenue"], json!(50.0));
    // 10 explicit + 20 * 0.6 assumed
    assert_eq!(books["cost"], json!(22.0));
    assert_eq!(books["profit"], json!(28.0));
    assert_eq!(books["profit_formatted"], json!("$28.00"));

    let games = &result.rows[1];
    assert_eq!(games["profit"], json!(5.0));
}

#[tokio::test]
async fn test_template_file_overrides_builtin() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[templates]]
id = "sales-by-category"
name = "Category Units"
category = "sales"
dimensions = [{{ field = "category" }}]
metrics = [{{ field = "orders", aggregation = "count" }}]

[[templates]]
id = "returns"
name = "Returns"
category = "operations"
dimensions = [{{ field = "category" }}]
metrics = [{{ field = "revenue", aggregation = "sum" }}]
filters = [{{ field = "status", operator = "equals", value = "returned" }}]
"#
    )
    .unwrap();

    let mut settings = Settings::default();
    settings.templates.path = Some(file.path().to_string_lossy().into_owned());
    let engine = ReportEngine::builder(Arc::new(MemorySource::new()))
        .settings(settings)
        .build()
        .unwrap();

    assert_eq!(
        engine.get_template("sales-by-category").unwrap().name,
        "Category Units"
    );
    assert!(engine.get_template("returns").is_some());
    assert!(engine.get_template("revenue-trend").is_some());
    assert_eq!(
        engine.templates().all().len(),
        TemplateCatalog::builtin().all().len() + 1
    );
}

#[test]
fn test_invalid_template_is_rejected() {
    let err = TemplateCatalog::from_toml_str(
        r#"
[[templates]]
id = "broken"
name = "Broken"
category = "sales"
dimensions = [{ field = "nonexistent" }]
metrics = [{ field = "revenue", aggregation = "sum" }]
"#,
    )
    .unwrap_err();
    assert!(matches!(err, TemplateError::Invalid { ref id, .. } if id == "broken"));
}
