//! # Reporting Projections
//!
//! Read-only presentation helpers over the sale + overlay join. The queries
//! themselves live in the flow repository; this module maps the rows into
//! display-ready values for back-office tables.

use balcao_core::{FlowStatus, Money};
use balcao_db::SaleFlowSummary;

/// Badge color for a flow status, as used by back-office status tables.
///
/// The mapping is fixed; callers translate the token to their own palette.
pub const fn status_badge(status: FlowStatus) -> &'static str {
    match status {
        FlowStatus::AwaitingReview => "neutral",
        FlowStatus::ManagerReview => "info",
        FlowStatus::ManagerRejected => "danger",
        FlowStatus::FinanceReview => "info",
        FlowStatus::FinanceReturned => "warning",
        FlowStatus::Finalized => "success",
        FlowStatus::Cancelled => "danger",
    }
}

/// Formats basis points as a percentage with two decimals: 3333 → "33.33%".
///
/// Negative margins keep their sign for the whole value, including the
/// `-99..=-1` range where the integer part alone would truncate to 0.
pub fn format_margin(margin_bps: i64) -> String {
    let sign = if margin_bps < 0 { "-" } else { "" };
    let abs = margin_bps.abs();
    format!("{sign}{}.{:02}%", abs / 100, abs % 100)
}

/// One row of a conferencing report, ready for display or CSV export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub sale_number: i64,
    pub customer_name: String,
    pub store_id: String,
    pub status_label: &'static str,
    pub badge: &'static str,
    pub total: String,
    pub profit: String,
    pub margin: String,
    pub locked: bool,
}

impl ReportRow {
    /// Projects a summary row into display values.
    pub fn from_summary(summary: &SaleFlowSummary) -> Self {
        ReportRow {
            sale_number: summary.sale_number,
            customer_name: summary.customer_name.clone(),
            store_id: summary.store_id.clone(),
            status_label: summary.flow_status.label(),
            badge: status_badge(summary.flow_status),
            total: Money::from_centavos(summary.total_centavos).to_string(),
            profit: Money::from_centavos(summary.profit_centavos).to_string(),
            margin: format_margin(summary.margin_bps),
            locked: summary.locked,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
