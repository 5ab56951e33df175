//! The report engine: the public entry point.
//!
//! A [`ReportEngine`] owns a record source, an optional shared result cache,
//! the template catalog and the registered export encoders. Executing a spec
//! runs:
//!
//! ```text
//! validate -> cache lookup -> resolve table -> strategy chain (under deadline)
//!          -> format -> sort -> paginate -> cache store
//! ```

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::apply_formats;
use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::config::Settings;
use crate::error::{EngineResult, ReportError};
use crate::execution::{applicable, run_chain};
use crate::export::{export, EncoderRegistry, ExportEncoder, ExportFormat, ExportOptions};
use crate::sort::{paginate, sort_rows};
use crate::source::{resolve, RecordSource};
use crate::spec::{
    list_dimensions, list_metrics, validate, DateRange, Dimension, Metric, ReportResult,
    ReportSpec, ResultMetadata,
};
use crate::templates::{Template, TemplateCatalog, TemplateError};

/// Builder for [`ReportEngine`].
#[must_use = "builders have no effect until build() is called"]
pub struct ReportEngineBuilder {
    source: Arc<dyn RecordSource>,
    settings: Settings,
    cache: Option<Arc<ResultCache>>,
    templates: Option<TemplateCatalog>,
    encoders: EncoderRegistry,
}

impl ReportEngineBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Share an existing cache instead of creating one from settings.
    pub fn cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use this catalog instead of the built-in one plus the configured file.
    pub fn templates(mut self, templates: TemplateCatalog) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn encoder(mut self, format: ExportFormat, encoder: Arc<dyn ExportEncoder>) -> Self {
        self.encoders.register(format, encoder);
        self
    }

    pub fn build(self) -> EngineResult<ReportEngine> {
        let templates = match self.templates {
            Some(templates) => templates,
            None => {
                let builtin = TemplateCatalog::builtin().clone();
                match self.settings.templates.resolved_path()? {
                    Some(path) => {
                        debug!(path = %path.display(), "loading templates");
                        builtin.merge(TemplateCatalog::from_file(&path)?)
                    }
                    None => builtin,
                }
            }
        };

        let cache = match self.cache {
            Some(cache) => Some(cache),
            None if self.settings.cache.enabled => {
                Some(Arc::new(ResultCache::from_settings(&self.settings.cache)))
            }
            None => None,
        };

        Ok(ReportEngine {
            source: self.source,
            settings: self.settings,
            cache,
            templates,
            encoders: self.encoders,
        })
    }
}

/// Executes report specs against a record source.
pub struct ReportEngine {
    source: Arc<dyn RecordSource>,
    settings: Settings,
    cache: Option<Arc<ResultCache>>,
    templates: TemplateCatalog,
    encoders: EncoderRegistry,
}

impl ReportEngine {
    pub fn builder(source: Arc<dyn RecordSource>) -> ReportEngineBuilder {
        ReportEngineBuilder {
            source,
            settings: Settings::default(),
            cache: None,
            templates: None,
            encoders: EncoderRegistry::new(),
        }
    }

    /// Engine with default settings and the built-in templates.
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            settings: Settings::default(),
            cache: Some(Arc::new(ResultCache::default())),
            templates: TemplateCatalog::builtin().clone(),
            encoders: EncoderRegistry::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Execute a report for `tenant_id`.
    ///
    /// With `use_cache`, a live cached result for the same tenant and spec is
    /// returned with `cached = true`, and fresh results are stored.
    pub async fn execute(
        &self,
        spec: &ReportSpec,
        tenant_id: &str,
        use_cache: bool,
    ) -> EngineResult<ReportResult> {
        let execution_id = Uuid::new_v4();
        let started = Instant::now();

        let resolved = validate(spec)?;

        let cache_entry = match (&self.cache, use_cache) {
            (Some(cache), true) => match CacheKey::new(tenant_id, spec) {
                Ok(key) => Some((cache, key)),
                Err(e) => {
                    warn!(%execution_id, error = %e, "cache key failed, bypassing cache");
                    None
                }
            },
            _ => None,
        };

        if let Some((cache, key)) = &cache_entry {
            if let Some(mut hit) = cache.get(key) {
                hit.metadata.cached = true;
                info!(%execution_id, tenant = tenant_id, rows = hit.rows.len(), "cache hit");
                return Ok(hit);
            }
        }

        let resolution = resolve(&resolved.touched_fields());
        let table = resolution.table;
        if !resolution.unresolved.is_empty() {
            let fields: Vec<&str> = resolution.unresolved.iter().map(|f| f.as_str()).collect();
            warn!(%execution_id, %table, ?fields, "fields not carried by table will be null");
        }

        let chain = applicable(&self.settings.engine.chain(), self.source.as_ref());
        debug!(%execution_id, %table, ?chain, "execution plan");

        let timeout = self.settings.engine.query_timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        let (mut rows, strategy) = tokio::time::timeout_at(
            deadline,
            run_chain(&chain, self.source.as_ref(), &resolved, table),
        )
        .await
        .map_err(|_| ReportError::DeadlineExceeded {
            timeout_ms: self.settings.engine.query_timeout_ms,
        })??;

        apply_formats(
            &mut rows,
            &resolved.metrics,
            &self.settings.format.currency_symbol,
        );
        sort_rows(&mut rows, &resolved.sorting);
        let total_rows = rows.len();
        let rows = paginate(rows, resolved.limit, resolved.offset);

        let result = ReportResult {
            metadata: ResultMetadata {
                row_count: rows.len(),
                total_rows,
                execution_time_ms: started.elapsed().as_millis() as u64,
                cached: false,
                generated_at: Utc::now(),
                table: table.name().to_string(),
                strategy,
            },
            rows,
        };

        if let Some((cache, key)) = cache_entry {
            cache.put(key, result.clone());
        }

        info!(
            %execution_id,
            tenant = tenant_id,
            %table,
            ?strategy,
            rows = result.metadata.row_count,
            elapsed_ms = result.metadata.execution_time_ms,
            "report executed"
        );
        Ok(result)
    }

    /// Execute a catalog template, optionally restricted to a date range.
    pub async fn execute_template(
        &self,
        template_id: &str,
        tenant_id: &str,
        date_range: Option<DateRange>,
    ) -> EngineResult<ReportResult> {
        let template = self
            .templates
            .get_by_id(template_id)
            .ok_or_else(|| TemplateError::NotFound(template_id.to_string()))?;
        let mut spec = template.to_spec();
        spec.date_range = date_range;
        self.execute(&spec, tenant_id, true).await
    }

    pub fn export_result(
        &self,
        result: &ReportResult,
        format: ExportFormat,
        options: &ExportOptions,
    ) -> EngineResult<Vec<u8>> {
        Ok(export(result, format, options, &self.encoders)?)
    }

    pub fn list_dimensions(&self) -> &'static [Dimension] {
        list_dimensions()
    }

    pub fn list_metrics(&self) -> &'static [Metric] {
        list_metrics()
    }

    pub fn get_template(&self, id: &str) -> Option<&Template> {
        self.templates.get_by_id(id)
    }

    pub fn search_templates(&self, query: &str) -> Vec<&Template> {
        self.templates.search(query)
    }

    pub fn list_templates_by_category(&self, category: &str) -> Vec<&Template> {
        self.templates.get_by_category(category)
    }

    pub fn featured_templates(&self) -> Vec<&Template> {
        self.templates.get_featured()
    }

    pub fn templates(&self) -> &TemplateCatalog {
        &self.templates
    }

    /// Drop cached results, for one tenant or all. Returns the number removed.
    pub fn clear_cache(&self, tenant_id: Option<&str>) -> usize {
        match &self.cache {
            Some(cache) => {
                let removed = cache.clear(tenant_id);
                info!(tenant = ?tenant_id, removed, "cache cleared");
                removed
            }
            None => 0,
        }
    }

    /// Cache counters, or `None` when caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }
}
