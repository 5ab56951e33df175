//! Result export.
//!
//! CSV and JSON are rendered in-crate. PDF and Excel are delegated to
//! [`ExportEncoder`] implementations registered by the embedding
//! application; each receives a [`TabularHandoff`], a flat table with
//! display labels.

mod csv;

pub use csv::to_csv;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use inflector::Inflector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::spec::ReportResult;

/// Errors from exporting a result.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot export an empty result as {0}")]
    EmptyDataset(ExportFormat),

    #[error("no encoder registered for {0}")]
    MissingEncoder(ExportFormat),

    #[error("{format} encoder failed: {message}")]
    Encoder {
        format: ExportFormat,
        message: String,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Pdf,
    Excel,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "excel",
        }
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "xlsx",
            other => other.as_str(),
        }
    }

    /// Whether the format needs at least one row.
    fn requires_rows(&self) -> bool {
        !matches!(self, ExportFormat::Json)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "pdf" => Ok(ExportFormat::Pdf),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Page orientation for paged formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Options passed through to encoders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub include_charts: bool,
    #[serde(default)]
    pub title: Option<String>,
}

/// Flat tabular form of a result handed to external encoders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularHandoff {
    /// Column keys, from the first row.
    pub headers: Vec<String>,
    /// Display labels, title-cased from the keys.
    pub labels: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub row_count: usize,
}

/// Renders a [`TabularHandoff`] into a binary document.
pub trait ExportEncoder: Send + Sync {
    fn encode(
        &self,
        data: &TabularHandoff,
        options: &ExportOptions,
    ) -> Result<Vec<u8>, ExportError>;
}

/// Encoders by format.
#[derive(Clone, Default)]
pub struct EncoderRegistry {
    encoders: HashMap<ExportFormat, Arc<dyn ExportEncoder>>,
}

impl EncoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, format: ExportFormat, encoder: Arc<dyn ExportEncoder>) {
        self.encoders.insert(format, encoder);
    }

    pub fn get(&self, format: ExportFormat) -> Option<&Arc<dyn ExportEncoder>> {
        self.encoders.get(&format)
    }
}

impl fmt::Debug for EncoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.encoders.keys()).finish()
    }
}

/// Pretty-printed JSON of the whole result, metadata included.
pub fn to_json(result: &ReportResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Flatten a result for an external encoder.
pub fn to_tabular_handoff(result: &ReportResult, title: &str) -> TabularHandoff {
    let headers: Vec<String> = result
        .rows
        .first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default();
    let labels = headers.iter().map(|h| h.to_title_case()).collect();
    let rows = result
        .rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    TabularHandoff {
        headers,
        labels,
        rows,
        title: title.to_string(),
        generated_at: result.metadata.generated_at,
        row_count: result.rows.len(),
    }
}

/// Export `result` as `format`.
pub fn export(
    result: &ReportResult,
    format: ExportFormat,
    options: &ExportOptions,
    encoders: &EncoderRegistry,
) -> Result<Vec<u8>, ExportError> {
    if format.requires_rows() && result.rows.is_empty() {
        return Err(ExportError::EmptyDataset(format));
    }
    match format {
        ExportFormat::Csv => Ok(to_csv(&result.rows).into_bytes()),
        ExportFormat::Json => Ok(to_json(result)?.into_bytes()),
        ExportFormat::Pdf | ExportFormat::Excel => {
            let encoder = encoders
                .get(format)
                .ok_or(ExportError::MissingEncoder(format))?;
            let title = options.title.as_deref().unwrap_or("Report");
            encoder.encode(&to_tabular_handoff(result, title), options)
        }
    }
}
