//! In-memory record source.
//!
//! Holds records per table and answers `fetch` by scanning. It has no SQL
//! dialect, so reports against it always run pull-and-aggregate.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use super::{RecordSource, SourceError, SourceResult, Table};
use crate::spec::{DateBounds, Predicate};
use crate::value::{resolve_path, Record};

/// Record source backed by in-memory vectors.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<Table, Vec<Record>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the records of a table.
    pub fn with_table(mut self, table: Table, records: Vec<Record>) -> Self {
        self.tables.insert(table, records);
        self
    }

    /// Build from a JSON document of the form `{"orders": [{...}, ...], ...}`.
    ///
    /// Non-object array elements are skipped.
    pub fn from_json(doc: &Value) -> SourceResult<Self> {
        let object = doc
            .as_object()
            .ok_or_else(|| SourceError::Query("expected a JSON object of tables".into()))?;

        let mut source = Self::new();
        for (name, rows) in object {
            let table =
                Table::from_name(name).ok_or_else(|| SourceError::UnknownTable(name.clone()))?;
            let records = rows
                .as_array()
                .ok_or_else(|| SourceError::Query(format!("table '{}' is not an array", name)))?
                .iter()
                .filter_map(|r| r.as_object().cloned())
                .collect();
            source.tables.insert(table, records);
        }
        Ok(source)
    }

    /// Load a JSON document from disk; see [`MemorySource::from_json`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> SourceResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let doc: Value = serde_json::from_str(&content)
            .map_err(|e| SourceError::Query(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&doc)
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(
        &self,
        table: Table,
        filters: &[Predicate],
        date_range: Option<&DateBounds>,
    ) -> SourceResult<Vec<Record>> {
        let records = self
            .tables
            .get(&table)
            .ok_or_else(|| SourceError::UnknownTable(table.name().to_string()))?;

        let ts_column = table.timestamp_column();
        Ok(records
            .iter()
            .filter(|r| {
                date_range.map_or(true, |bounds| {
                    resolve_path(r, ts_column).is_some_and(|v| bounds.contains(v))
                })
            })
            .filter(|r| filters.iter().all(|f| f.matches(r)))
            .cloned()
            .collect())
    }
}
