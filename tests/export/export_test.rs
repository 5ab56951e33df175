use quarry::export::{ExportError, Orientation};
use quarry::prelude::*;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Records the handoff it receives and renders it as pipe-separated text.
#[derive(Default)]
struct RecordingEncoder {
    seen: Mutex<Option<(TabularHandoff, ExportOptions)>>,
}

impl ExportEncoder for RecordingEncoder {
    fn encode(
        &self,
        data: &TabularHandoff,
        options: &ExportOptions,
    ) -> Result<Vec<u8>, ExportError> {
        if let Ok(mut seen) = self.seen.lock() {
            *seen = Some((data.clone(), options.clone()));
        }
        let mut out = data.labels.join("|");
        for row in &data.rows {
            out.push('\n');
            let cells: Vec<String> = row.iter().map(Value::to_string).collect();
            out.push_str(&cells.join("|"));
        }
        Ok(out.into_bytes())
    }
}

fn customers() -> Vec<quarry::value::Record> {
    [
        json!({"country": "US", "name": "Acme, Inc.", "lifetime_value": 1200.5}),
        json!({"country": "US", "name": "Globex", "lifetime_value": 300}),
        json!({"country": "DE", "name": "Initech \"EU\"", "lifetime_value": 50}),
    ]
    .into_iter()
    .filter_map(|v| v.as_object().cloned())
    .collect()
}

fn by_country() -> ReportSpec {
    ReportSpec::new()
        .dimension(Dimension::new("country"))
        .metric(Metric::new("lifetime_value", Aggregation::Sum).with_format(MetricFormat::Currency))
        .sort(Sort::desc("lifetime_value"))
}

#[tokio::test]
async fn test_csv_export_quotes_and_formats() {
    let source = MemorySource::new().with_table(Table::Customers, customers());
    let engine = ReportEngine::new(Arc::new(source));
    let result = engine.execute(&by_country(), "t1", true).await.unwrap();

    let bytes = engine
        .export_result(&result, ExportFormat::Csv, &ExportOptions::default())
        .unwrap();
    let csv = String::from_utf8(bytes).unwrap();
    assert_eq!(
        csv,
        "country,lifetime_value,lifetime_value_formatted\n\
         US,1500.5,\"$1,500.50\"\n\
         DE,50.0,$50.00"
    );
}

#[test]
fn test_csv_escapes_cells_with_delimiters() {
    let rows: Vec<_> = customers()
        .into_iter()
        .map(|mut r| {
            r.remove("lifetime_value");
            r
        })
        .collect();
    let csv = quarry::export::to_csv(&rows);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "country,name");
    assert_eq!(lines[1], "US,\"Acme, Inc.\"");
    assert_eq!(lines[3], "DE,\"Initech \"\"EU\"\"\"");
}

/// Split one CSV record, undoing quoting.
fn parse_record(line: &str) -> Vec<String> {
    let mut cells = vec![String::new()];
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                cells.last_mut().unwrap().push('"');
            }
            ('"', _) => quoted = !quoted,
            (',', false) => cells.push(String::new()),
            (c, _) => cells.last_mut().unwrap().push(c),
        }
    }
    cells
}

#[test]
fn test_csv_cells_round_trip() {
    let csv = quarry::export::to_csv(&customers());
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(parse_record(lines[1])[1], "Acme, Inc.");
    assert_eq!(parse_record(lines[3])[1], "Initech \"EU\"");
}

#[tokio::test]
async fn test_pdf_goes_through_registered_encoder() {
    let encoder = Arc::new(RecordingEncoder::default());
    let source = MemorySource::new().with_table(Table::Customers, customers());
    let engine = ReportEngine::builder(Arc::new(source))
        .encoder(ExportFormat::Pdf, encoder.clone())
        .build()
        .unwrap();
    let result = engine.execute(&by_country(), "t1", true).await.unwrap();

    let options = ExportOptions {
        orientation: Orientation::Landscape,
        include_charts: true,
        title: Some("Customer Value".into()),
    };
    let bytes = engine
        .export_result(&result, ExportFormat::Pdf, &options)
        .unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.starts_with("Country|Lifetime Value|Lifetime Value Formatted\n"));

    let seen = encoder.seen.lock().unwrap();
    let (handoff, seen_options) = seen.as_ref().unwrap();
    assert_eq!(handoff.title, "Customer Value");
    assert_eq!(handoff.row_count, 2);
    assert_eq!(handoff.headers[0], "country");
    assert_eq!(handoff.rows[1][0], json!("DE"));
    assert_eq!(seen_options.orientation, Orientation::Landscape);
}

#[tokio::test]
async fn test_excel_without_encoder_fails() {
    let source = MemorySource::new().with_table(Table::Customers, customers());
    let engine = ReportEngine::new(Arc::new(source));
    let result = engine.execute(&by_country(), "t1", true).await.unwrap();

    let err = engine
        .export_result(&result, ExportFormat::Excel, &ExportOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ReportError::Export(ExportError::MissingEncoder(ExportFormat::Excel))
    ));
}

#[tokio::test]
async fn test_empty_dataset() {
    let engine = ReportEngine::new(Arc::new(
        MemorySource::new().with_table(Table::Customers, vec![]),
    ));
    let result = engine.execute(&by_country(), "t1", true).await.unwrap();
    assert!(result.rows.is_empty());

    let err = engine
        .export_result(&result, ExportFormat::Csv, &ExportOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ReportError::Export(ExportError::EmptyDataset(ExportFormat::Csv))
    ));

    let json = engine
        .export_result(&result, ExportFormat::Json, &ExportOptions::default())
        .unwrap();
    let parsed: Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(parsed["rows"], json!([]));
    assert_eq!(parsed["metadata"]["totalRows"], json!(0));
}
