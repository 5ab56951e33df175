//! CSV rendering.

use crate::spec::Row;
use crate::value::display_text;

/// Quote a cell when it contains a delimiter, quote or line break.
fn escape_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Render rows as CSV.
///
/// The header comes from the first row's keys; later rows are read in that
/// column order with missing cells left empty. Nulls render empty. No rows
/// render an empty string.
pub fn to_csv(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let headers: Vec<&String> = first.keys().collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        headers
            .iter()
            .map(|h| escape_cell(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(display_text).unwrap_or_default())
            .map(|c| escape_cell(&c))
            .collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}
