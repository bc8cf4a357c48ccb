//! # CSV Export
//!
//! RFC-4180 export of conferencing report rows.
//!
//! ## Quoting Rules
//! A field is wrapped in double quotes when it contains a comma, a double
//! quote, or a line break; embedded quotes are doubled. Without quoting, a
//! customer named `Silva, João` would shift every column after it, and
//! money values use a decimal comma (`R$ 150,00`) that breaks the same way.
//!
//! Exporting zero rows yields no document at all: callers get `None` and no
//! file is written.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::FlowResult;
use crate::report::ReportRow;

/// Column header, matching [`ReportRow`] field order.
const HEADER: &str = "sale_number,customer,store,status,total,profit,margin,locked";

/// Quotes one field per RFC 4180. Fields without special characters pass
/// through unchanged.
fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
    {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Renders one report row as a CSV record (no trailing line break).
fn render_row(row: &ReportRow) -> String {
    let fields = [
        row.sale_number.to_string(),
        row.customer_name.clone(),
        row.store_id.clone(),
        row.status_label.to_string(),
        row.total.clone(),
        row.profit.clone(),
        row.margin.clone(),
        if row.locked { "yes" } else { "no" }.to_string(),
    ];

    fields
        .iter()
        .map(|f| quote_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Builds a CSV document from report rows.
///
/// Returns `None` for an empty row set; an export with nothing in it is
/// not a document.
pub fn export_report(rows: &[ReportRow]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }

    let mut doc = String::from(HEADER);
    for row in rows {
        doc.push_str("\r\n");
        doc.push_str(&render_row(row));
    }
    doc.push_str("\r\n");

    Some(doc)
}

/// Writes the report to `path`. Returns `false` (and writes nothing) when
/// the row set is empty.
pub fn write_report(path: impl AsRef<Path>, rows: &[ReportRow]) -> FlowResult<bool> {
    let Some(doc) = export_report(rows) else {
        return Ok(false);
    };

    fs::write(path.as_ref(), doc)?;

    info!(
        path = %path.as_ref().display(),
        rows = rows.len(),
        "Conferencing report exported"
    );

    Ok(true)
}

// =============================================================================
// Unit Tests
// =============================================================================
