use async_trait::async_trait;
use quarry::config::Settings;
use quarry::prelude::*;
use quarry::source::{SourceError, SourceResult};
use quarry::spec::{DateBounds, Predicate};
use quarry::sql::{Dialect, PreparedQuery};
use quarry::value::Record;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Claims SQL support but fails every push-down query.
#[derive(Default)]
struct FlakySource {
    fail_fetch: bool,
    fetch_delay: Option<Duration>,
    fetches: AtomicUsize,
    executes: AtomicUsize,
}

#[async_trait]
impl RecordSource for FlakySource {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn fetch(
        &self,
        table: Table,
        filters: &[Predicate],
        _date_range: Option<&DateBounds>,
    ) -> SourceResult<Vec<Record>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch {
            return Err(SourceError::Unavailable("replica offline".into()));
        }
        assert_eq!(table, Table::Orders);
        Ok([
            json!({"category": "A", "status": "delivered", "total": 4}),
            json!({"category": "A", "status": "delivered", "total": 6}),
            json!({"category": "B", "status": "delivered", "total": 20}),
            json!({"category": "B", "status": "pending", "total": 99}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .filter(|r| filters.iter().all(|f| f.matches(r)))
        .collect())
    }

    fn push_down_dialect(&self) -> Option<Dialect> {
        Some(Dialect::Postgres)
    }

    async fn columns(&self, _table: Table) -> SourceResult<HashSet<String>> {
        Ok(["category", "status", "total", "created_at"]
            .into_iter()
            .map(String::from)
            .collect())
    }

    async fn execute(&self, _query: &PreparedQuery) -> SourceResult<Vec<Record>> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        Err(SourceError::Query("connection reset by peer".into()))
    }
}

fn spec() -> ReportSpec {
    ReportSpec::new()
        .dimension(Dimension::new("category"))
        .metric(Metric::new("revenue", Aggregation::Sum))
        .filter(Filter::new("status", FilterOperator::Equals, "delivered"))
        .sort(Sort::asc("category"))
}

fn engine_with(source: Arc<FlakySource>, settings: Settings) -> ReportEngine {
    ReportEngine::builder(source)
        .settings(settings)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_push_down_failure_falls_back_to_pull() {
    let source = Arc::new(FlakySource::default());
    let engine = engine_with(source.clone(), Settings::default());

    let result = engine.execute(&spec(), "t1", true).await.unwrap();

    assert_eq!(result.metadata.strategy, ExecutionStrategy::PullAndAggregate);
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0]["category"], json!("A"));
    assert_eq!(result.rows[0]["revenue"], json!(10.0));
    assert_eq!(result.rows[1]["revenue"], json!(20.0));
    assert_eq!(source.executes.load(Ordering::SeqCst), 1);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_hit_skips_the_source() {
    let source = Arc::new(FlakySource::default());
    let engine = engine_with(source.clone(), Settings::default());

    engine.execute(&spec(), "t1", true).await.unwrap();
    engine.execute(&spec(), "t1", true).await.unwrap();

    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_last_strategy_error_propagates() {
    let source = Arc::new(FlakySource {
        fail_fetch: true,
        ..Default::default()
    });
    let engine = engine_with(source, Settings::default());

    let err = engine.execute(&spec(), "t1", true).await.unwrap_err();
    assert!(matches!(
        err,
        ReportError::SourceQuery(SourceError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_no_fallback_when_disabled() {
    let mut settings = Settings::default();
    settings.engine.fallback = false;
    let source = Arc::new(FlakySource::default());
    let engine = engine_with(source.clone(), settings);

    let err = engine.execute(&spec(), "t1", true).await.unwrap_err();
    assert!(matches!(err, ReportError::SourceQuery(SourceError::Query(_))));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pull_only_configuration_never_pushes_down() {
    let mut settings = Settings::default();
    settings.engine.strategies = vec![ExecutionStrategy::PullAndAggregate];
    let source = Arc::new(FlakySource::default());
    let engine = engine_with(source.clone(), settings);

    let result = engine.execute(&spec(), "t1", true).await.unwrap();
    assert_eq!(result.metadata.strategy, ExecutionStrategy::PullAndAggregate);
    assert_eq!(source.executes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_slow_source_exceeds_deadline() {
    let mut settings = Settings::default();
    settings.engine.query_timeout_ms = 20;
    let source = Arc::new(FlakySource {
        fetch_delay: Some(Duration::from_millis(500)),
        ..Default::default()
    });
    let engine = engine_with(source, settings);

    let err = engine.execute(&spec(), "t1", true).await.unwrap_err();
    assert!(matches!(err, ReportError::DeadlineExceeded { timeout_ms: 20 }));
    assert!(engine.cache_stats().unwrap().entries == 0);
}
