//! Report template catalog.
//!
//! Templates are named, ready-made report specs. The built-in set is embedded
//! TOML parsed once per process; a configured file can add templates or
//! replace built-ins by id. The catalog is read-only once built.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::spec::{validate, Dimension, Filter, Metric, ReportSpec, Sort};

const BUILTIN_TOML: &str = include_str!("builtin.toml");

static BUILTIN: Lazy<TemplateCatalog> = Lazy::new(|| {
    TemplateCatalog::from_toml_str(BUILTIN_TOML).unwrap_or_else(|e| {
        error!(error = %e, "built-in templates failed to load");
        TemplateCatalog::default()
    })
});

/// Errors from template lookup and loading.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("failed to read template file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse templates: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate template id: {0}")]
    Duplicate(String),

    #[error("template '{id}' is invalid: {reason}")]
    Invalid { id: String, reason: String },
}

/// Suggested visualization for a template's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Bar,
    Line,
    Area,
    Pie,
    #[default]
    Table,
}

/// A named, pre-built report specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default, alias = "chart_type")]
    pub chart_type: ChartType,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sorting: Vec<Sort>,
}

impl Template {
    /// The report spec this template stands for.
    pub fn to_spec(&self) -> ReportSpec {
        ReportSpec {
            dimensions: self.dimensions.clone(),
            metrics: self.metrics.clone(),
            filters: self.filters.clone(),
            sorting: self.sorting.clone(),
            ..ReportSpec::default()
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

#[derive(Deserialize)]
struct TemplateFile {
    #[serde(default)]
    templates: Vec<Template>,
}

/// An ordered, read-only set of templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    /// The embedded built-in catalog.
    pub fn builtin() -> &'static TemplateCatalog {
        &BUILTIN
    }

    /// Parse a `[[templates]]` TOML document.
    ///
    /// Ids must be unique and every template must be a valid report spec.
    pub fn from_toml_str(content: &str) -> Result<Self, TemplateError> {
        let file: TemplateFile = toml::from_str(content)?;
        let mut seen = BTreeSet::new();
        for template in &file.templates {
            if !seen.insert(template.id.as_str()) {
                return Err(TemplateError::Duplicate(template.id.clone()));
            }
            validate(&template.to_spec()).map_err(|e| TemplateError::Invalid {
                id: template.id.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(Self {
            templates: file.templates,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Overlay `other`: same ids replace in place, new ids are appended.
    pub fn merge(mut self, other: TemplateCatalog) -> Self {
        let positions: HashMap<String, usize> = self
            .templates
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        for template in other.templates {
            match positions.get(&template.id) {
                Some(&i) => self.templates[i] = template,
                None => self.templates.push(template),
            }
        }
        self
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Templates of a category (case-insensitive).
    pub fn get_by_category(&self, category: &str) -> Vec<&Template> {
        self.templates
            .iter()
            .filter(|t| t.category.eq_ignore_ascii_case(category))
            .collect()
    }

    pub fn get_featured(&self) -> Vec<&Template> {
        self.templates.iter().filter(|t| t.featured).collect()
    }

    /// Case-insensitive substring search over name, description and tags.
    pub fn search(&self, query: &str) -> Vec<&Template> {
        let needle = query.trim().to_lowercase();
        self.templates.iter().filter(|t| t.matches(&needle)).collect()
    }

    pub fn all(&self) -> &[Template] {
        &self.templates
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Vec<&str> {
        self.templates
            .iter()
            .map(|t| t.category.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
