//! Quarry CLI - Run declarative reports against a data file
//!
//! Usage:
//!   quarry run --spec <spec.json> --data <orders.json>
//!   quarry run --template <id> --data <shop.db> --driver sqlite
//!   quarry dimensions | metrics
//!   quarry templates [--category <c>] [--search <q>] [--featured]
//!   quarry template <id>
//!
//! Examples:
//!   quarry run --template sales-by-category --data ./shop.json --format csv
//!   quarry run --spec monthly.json --data ./shop.db --driver sqlite -vv

use clap::{Parser, Subcommand, ValueEnum};
use quarry::config::{Settings, SourceDriver};
use quarry::export::{ExportFormat, ExportOptions};
use quarry::source::{MemorySource, RecordSource, SqliteSource};
use quarry::spec::{DataType, DateRange, Dimension, ReportSpec};
use quarry::templates::Template;
use quarry::ReportEngine;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Quarry - Declarative report aggregation with caching and export")]
#[command(version)]
struct Cli {
    /// Path to a config file (overrides QUARRY_CONFIG and default locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all logging
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a report spec or template
    Run {
        /// Path to a JSON report spec
        #[arg(long, conflicts_with = "template", required_unless_present = "template")]
        spec: Option<PathBuf>,

        /// Template id to execute
        #[arg(long)]
        template: Option<String>,

        /// Data file (JSON for memory, database for sqlite)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Record source driver
        #[arg(long)]
        driver: Option<DriverArg>,

        /// Tenant the result is cached under
        #[arg(long, default_value = "default")]
        tenant: String,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,

        /// Date range start (templates only)
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// Date range end (templates only)
        #[arg(long, requires = "start")]
        end: Option<String>,

        /// Bypass the result cache
        #[arg(long)]
        no_cache: bool,

        /// Write output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List selectable dimensions
    Dimensions,

    /// List selectable metrics
    Metrics,

    /// List report templates
    Templates {
        /// Only templates of this category
        #[arg(long)]
        category: Option<String>,

        /// Case-insensitive search over name, description and tags
        #[arg(long)]
        search: Option<String>,

        /// Only featured templates
        #[arg(long)]
        featured: bool,
    },

    /// Show one template as JSON
    Template {
        /// Template id
        id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DriverArg {
    Memory,
    Sqlite,
}

impl From<DriverArg> for SourceDriver {
    fn from(arg: DriverArg) -> Self {
        match arg {
            DriverArg::Memory => SourceDriver::Memory,
            DriverArg::Sqlite => SourceDriver::Sqlite,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

impl From<OutputFormat> for ExportFormat {
    fn from(arg: OutputFormat) -> Self {
        match arg {
            OutputFormat::Json => ExportFormat::Json,
            OutputFormat::Csv => ExportFormat::Csv,
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings, String> {
    match path {
        Some(path) => Settings::from_file(&path),
        None => Settings::load(),
    }
    .map_err(|e| format!("Error loading config: {}", e))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let settings = match load_settings(cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run {
            spec,
            template,
            data,
            driver,
            tenant,
            format,
            start,
            end,
            no_cache,
            output,
        } => {
            let date_range = start.zip(end).map(|(s, e)| DateRange::new(&s, &e));
            let request = RunRequest {
                spec,
                template,
                data,
                driver,
                tenant,
                format,
                date_range,
                use_cache: !no_cache,
                output,
            };
            cmd_run(settings, request).await
        }
        Commands::Dimensions => cmd_dimensions(),
        Commands::Metrics => cmd_metrics(),
        Commands::Templates {
            category,
            search,
            featured,
        } => cmd_templates(settings, category, search, featured),
        Commands::Template { id } => cmd_template(settings, &id),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

struct RunRequest {
    spec: Option<PathBuf>,
    template: Option<String>,
    data: Option<PathBuf>,
    driver: Option<DriverArg>,
    tenant: String,
    format: OutputFormat,
    date_range: Option<DateRange>,
    use_cache: bool,
    output: Option<PathBuf>,
}

fn open_source(
    settings: &Settings,
    data: Option<PathBuf>,
    driver: Option<DriverArg>,
) -> Result<Arc<dyn RecordSource>, String> {
    let driver = driver.map(SourceDriver::from).unwrap_or(settings.source.driver);
    let path = match data {
        Some(path) => path,
        None => settings
            .source
            .resolved_path()
            .map_err(|e| format!("Error in source path: {}", e))?
            .ok_or("No data file given (use --data or [source].path)")?,
    };

    let source: Arc<dyn RecordSource> = match driver {
        SourceDriver::Memory => Arc::new(
            MemorySource::from_file(&path)
                .map_err(|e| format!("Error loading '{}': {}", path.display(), e))?,
        ),
        SourceDriver::Sqlite => Arc::new(
            SqliteSource::open(&path)
                .map_err(|e| format!("Error opening '{}': {}", path.display(), e))?,
        ),
    };
    Ok(source)
}

async fn cmd_run(settings: Settings, request: RunRequest) -> Result<(), String> {
    let source = open_source(&settings, request.data, request.driver)?;
    let engine = ReportEngine::builder(source)
        .settings(settings)
        .build()
        .map_err(|e| format!("Error: {}", e))?;

    let result = match (request.spec, request.template) {
        (Some(path), _) => {
            let content = fs::read_to_string(&path)
                .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?;
            let mut spec: ReportSpec = serde_json::from_str(&content)
                .map_err(|e| format!("Error parsing spec '{}': {}", path.display(), e))?;
            if request.date_range.is_some() {
                spec.date_range = request.date_range;
            }
            engine
                .execute(&spec, &request.tenant, request.use_cache)
                .await
        }
        (None, Some(id)) => {
            engine
                .execute_template(&id, &request.tenant, request.date_range)
                .await
        }
        (None, None) => return Err("Either --spec or --template is required".into()),
    }
    .map_err(|e| format!("Report error: {}", e))?;

    let bytes = engine
        .export_result(&result, request.format.into(), &ExportOptions::default())
        .map_err(|e| format!("Export error: {}", e))?;

    match request.output {
        Some(path) => fs::write(&path, &bytes)
            .map_err(|e| format!("Error writing '{}': {}", path.display(), e))?,
        None => println!("{}", String::from_utf8_lossy(&bytes)),
    }
    Ok(())
}

/// One listing line; date dimensions accept a bucketing granularity.
fn dimension_line(d: &Dimension) -> String {
    let bucketed = if d.data_type == DataType::Date {
        " (day|week|month|quarter|year)"
    } else {
        ""
    };
    format!("  - {:<18} {}{}", d.field, d.label, bucketed)
}

fn cmd_dimensions() -> Result<(), String> {
    println!("Dimensions:");
    for d in quarry::spec::list_dimensions() {
        println!("{}", dimension_line(d));
    }
    Ok(())
}

fn cmd_metrics() -> Result<(), String> {
    println!("Metrics:");
    for m in quarry::spec::list_metrics() {
        println!("  - {:<18} {} [{}]", m.field, m.label, m.aggregation.as_str());
    }
    Ok(())
}

fn template_catalog(settings: Settings) -> Result<ReportEngine, String> {
    // Listing templates needs no data; an empty source is enough.
    ReportEngine::builder(Arc::new(MemorySource::new()))
        .settings(settings)
        .build()
        .map_err(|e| format!("Error: {}", e))
}

fn cmd_templates(
    settings: Settings,
    category: Option<String>,
    search: Option<String>,
    featured: bool,
) -> Result<(), String> {
    let engine = template_catalog(settings)?;
    let mut templates: Vec<&Template> = match (&category, &search) {
        (Some(category), _) => engine.list_templates_by_category(category),
        (None, Some(query)) => engine.search_templates(query),
        (None, None) => engine.templates().all().iter().collect(),
    };
    if let (Some(_), Some(query)) = (&category, &search) {
        let hits = engine.search_templates(query);
        templates.retain(|t| hits.iter().any(|h| h.id == t.id));
    }
    if featured {
        templates.retain(|t| t.featured);
    }

    if templates.is_empty() {
        println!("No templates found.");
        return Ok(());
    }
    for t in templates {
        let star = if t.featured { "*" } else { " " };
        println!("{} {:<22} [{}] {}", star, t.id, t.category, t.name);
    }
    Ok(())
}

fn cmd_template(settings: Settings, id: &str) -> Result<(), String> {
    let engine = template_catalog(settings)?;
    let template = engine
        .get_template(id)
        .ok_or_else(|| format!("Template not found: {}", id))?;
    let json = serde_json::to_string_pretty(template).map_err(|e| format!("Error: {}", e))?;
    println!("{}", json);
    Ok(())
}
