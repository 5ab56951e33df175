//! Display formatting for metric values.
//!
//! Formatting only adds `{field}_formatted` columns; the numeric values are
//! left untouched so sorting and export see the raw numbers.

use serde_json::Value;

use crate::spec::{MetricFormat, ResolvedMetric, Row};
use crate::value::as_number;

/// Format a number for display.
///
/// - currency: `$1,234.50`, `-$3.00`
/// - percentage: `12.35%`
/// - number: `1,234.5` (up to three fraction digits)
pub fn format_metric(format: MetricFormat, value: f64, currency_symbol: &str) -> String {
    match format {
        MetricFormat::Currency => {
            let digits = format!("{:.2}", value.abs());
            let sign = if value < 0.0 && digits != "0.00" { "-" } else { "" };
            format!("{}{}{}", sign, currency_symbol, group_digits(&digits))
        }
        MetricFormat::Percentage => format!("{:.2}%", value),
        MetricFormat::Number => {
            let digits = format!("{:.3}", value.abs());
            let digits = digits.trim_end_matches('0').trim_end_matches('.');
            let sign = if value < 0.0 && digits != "0" { "-" } else { "" };
            format!("{}{}", sign, group_digits(digits))
        }
    }
}

/// Insert thousands separators into the integer part of `digits`.
fn group_digits(digits: &str) -> String {
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(int.len() + int.len() / 3 + 4);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if let Some(frac) = frac {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

/// Add a `_formatted` column for every metric that requests a format.
pub fn apply_formats(rows: &mut [Row], metrics: &[ResolvedMetric], currency_symbol: &str) {
    for metric in metrics {
        let Some(format) = metric.format else {
            continue;
        };
        let key = metric.formatted_key();
        for row in rows.iter_mut() {
            let Some(value) = row.get(metric.key()).and_then(as_number) else {
                continue;
            };
            row.insert(
                key.clone(),
                Value::String(format_metric(format, value, currency_symbol)),
            );
        }
    }
}
