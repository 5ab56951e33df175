//! SQLite-backed record source.
//!
//! Each logical [`Table`] maps to a physical table of the same name. Blocking
//! `rusqlite` calls run on the blocking thread pool with the connection behind
//! a mutex.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::Connection;
use serde_json::Value;
use tracing::debug;

use super::{RecordSource, SourceError, SourceResult, Table};
use crate::spec::{DateBounds, Predicate};
use crate::sql::predicate::{date_range_expr, filter_expr};
use crate::sql::{Dialect, PreparedQuery, Query, SqlDialect, SqlValue};
use crate::value::{resolve_path, Record};

/// Record source over a SQLite database.
#[derive(Clone)]
pub struct SqliteSource {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSource").finish_non_exhaustive()
    }
}

impl SqliteSource {
    /// Open a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> SourceResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| SourceError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing and seeding).
    pub fn open_in_memory() -> SourceResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| SourceError::Unavailable(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a batch of statements, e.g. schema and seed data.
    pub fn execute_batch(&self, sql: &str) -> SourceResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| SourceError::Unavailable("connection lock poisoned".into()))?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_connection<F, T>(&self, f: F) -> SourceResult<T>
    where
        F: FnOnce(&Connection) -> SourceResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| SourceError::Unavailable("connection lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| SourceError::Unavailable(format!("blocking task failed: {}", e)))?
    }
}

#[async_trait]
impl RecordSource for SqliteSource {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn fetch(
        &self,
        table: Table,
        filters: &[Predicate],
        date_range: Option<&DateBounds>,
    ) -> SourceResult<Vec<Record>> {
        let columns = self.columns(table).await?;

        // Predicates that cannot be expressed against this table's columns
        // are evaluated after the fetch.
        let mut query = Query::from(table.name());
        let mut residual: Vec<Predicate> = Vec::new();
        for predicate in filters {
            let expr = predicate
                .field
                .sql_expr(&columns)
                .and_then(|field| filter_expr(predicate, field));
            match expr {
                Ok(expr) => query = query.filter(expr),
                Err(e) => {
                    debug!(field = %predicate.field, error = %e, "filter evaluated in-process");
                    residual.push(predicate.clone());
                }
            }
        }

        let ts_column = table.timestamp_column();
        let mut residual_range = None;
        if let Some(bounds) = date_range {
            if columns.contains(ts_column) {
                query = query.filter(date_range_expr(bounds, ts_column));
            } else {
                residual_range = Some(*bounds);
            }
        }

        let prepared = query
            .to_prepared(Dialect::Sqlite)
            .map_err(|e| SourceError::Unsupported(e.to_string()))?;
        debug!(sql = %prepared.sql, params = prepared.params.len(), "fetching records");

        let records = self
            .with_connection(move |conn| query_records(conn, &prepared))
            .await?;

        if residual.is_empty() && residual_range.is_none() {
            return Ok(records);
        }
        Ok(records
            .into_iter()
            .filter(|r| {
                residual_range.map_or(true, |bounds| {
                    resolve_path(r, ts_column).is_some_and(|v| bounds.contains(v))
                })
            })
            .filter(|r| residual.iter().all(|p| p.matches(r)))
            .collect())
    }

    fn push_down_dialect(&self) -> Option<Dialect> {
        Some(Dialect::Sqlite)
    }

    async fn columns(&self, table: Table) -> SourceResult<HashSet<String>> {
        self.with_connection(move |conn| {
            let sql = format!(
                "PRAGMA table_info({})",
                Dialect::Sqlite.quote_identifier(table.name())
            );
            let mut stmt = conn.prepare(&sql)?;
            let columns = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<Result<HashSet<_>, _>>()?;
            if columns.is_empty() {
                return Err(SourceError::UnknownTable(table.name().to_string()));
            }
            Ok(columns)
        })
        .await
    }

    async fn execute(&self, query: &PreparedQuery) -> SourceResult<Vec<Record>> {
        let query = query.clone();
        self.with_connection(move |conn| query_records(conn, &query))
            .await
    }
}

fn query_records(conn: &Connection, query: &PreparedQuery) -> SourceResult<Vec<Record>> {
    let mut stmt = conn.prepare(&query.sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let params = query.params.iter().map(to_sqlite);

    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Record::new();
        for (i, name) in names.iter().enumerate() {
            record.insert(name.clone(), to_json(row.get_ref(i)?));
        }
        records.push(record);
    }
    Ok(records)
}

fn to_sqlite(value: &SqlValue) -> SqliteValue {
    match value {
        SqlValue::Null => SqliteValue::Null,
        SqlValue::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        SqlValue::Int(i) => SqliteValue::Integer(*i),
        SqlValue::Float(f) => SqliteValue::Real(*f),
        SqlValue::Text(s) => SqliteValue::Text(s.clone()),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
