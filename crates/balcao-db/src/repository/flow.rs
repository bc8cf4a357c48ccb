//! # Flow Overlay Repository
//!
//! Database operations for the conferencing overlay and its timeline.
//!
//! ## Overlay vs. Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Two Tables, One Workflow                               │
//! │                                                                         │
//! │  sales                         sale_flow (THIS REPOSITORY)              │
//! │  ┌──────────────────┐          ┌──────────────────────────┐            │
//! │  │ items, payments, │ 1 ──── 1 │ status                   │            │
//! │  │ totals, customer │          │ approval / rejection     │            │
//! │  │                  │          │ locked                   │            │
//! │  └──────────────────┘          └────────────┬─────────────┘            │
//! │                                             │ 1                         │
//! │                                             │ n                         │
//! │                                ┌────────────▼─────────────┐            │
//! │                                │ flow_timeline            │            │
//! │                                │ (append-only event log)  │            │
//! │                                └──────────────────────────┘            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transition Legality Lives Elsewhere
//! This repository records decisions; it never makes them. The pre-state
//! check happens in balcao-core's transition table, driven by the service
//! in balcao-flow. What IS enforced here is atomicity: a status change and
//! its timeline entry commit in the same transaction, so recorded history
//! can never drift from recorded state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use balcao_core::{
    EventKind, FieldChange, FlowOverlay, FlowStatus, Receipt, SaleStatus, TimelineEntry,
};

/// Sale fields that a registered edit may touch.
///
/// Everything else on a sale is financial and immutable after creation;
/// corrections go through cancel-and-recreate.
pub const EDITABLE_SALE_FIELDS: &[&str] = &["notes", "customer_name", "customer_phone"];

// =============================================================================
// Row Types
// =============================================================================

/// Raw `sale_flow` row with receipts flattened into columns.
#[derive(Debug, sqlx::FromRow)]
struct OverlayRow {
    sale_id: String,
    status: FlowStatus,
    approval_actor_id: Option<String>,
    approval_actor_name: Option<String>,
    approval_at: Option<DateTime<Utc>>,
    approval_reason: Option<String>,
    rejection_actor_id: Option<String>,
    rejection_actor_name: Option<String>,
    rejection_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    locked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OverlayRow {
    fn into_overlay(self) -> FlowOverlay {
        let approval = match (
            self.approval_actor_id,
            self.approval_actor_name,
            self.approval_at,
        ) {
            (Some(actor_id), Some(actor_name), Some(at)) => Some(Receipt {
                actor_id,
                actor_name,
                at,
                reason: self.approval_reason,
            }),
            _ => None,
        };
        let rejection = match (
            self.rejection_actor_id,
            self.rejection_actor_name,
            self.rejection_at,
        ) {
            (Some(actor_id), Some(actor_name), Some(at)) => Some(Receipt {
                actor_id,
                actor_name,
                at,
                reason: self.rejection_reason,
            }),
            _ => None,
        };

        FlowOverlay {
            sale_id: self.sale_id,
            status: self.status,
            approval,
            rejection,
            locked: self.locked,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Raw `flow_timeline` row; `changes_json` holds the field-diff list.
#[derive(Debug, sqlx::FromRow)]
struct TimelineRow {
    at: DateTime<Utc>,
    kind: EventKind,
    actor_id: String,
    actor_name: String,
    description: String,
    changes_json: String,
}

impl TimelineRow {
    fn into_entry(self) -> DbResult<TimelineEntry> {
        let changes: Vec<FieldChange> = serde_json::from_str(&self.changes_json)
            .map_err(|e| DbError::Internal(format!("corrupt timeline changes: {e}")))?;
        Ok(TimelineEntry {
            at: self.at,
            kind: self.kind,
            actor_id: self.actor_id,
            actor_name: self.actor_name,
            description: self.description,
            changes,
        })
    }
}

/// Joined sale + overlay projection for status listings and CSV export.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SaleFlowSummary {
    pub sale_id: String,
    pub sale_number: i64,
    pub store_id: String,
    pub salesperson_id: String,
    pub customer_name: String,
    pub total_centavos: i64,
    pub profit_centavos: i64,
    pub margin_bps: i64,
    pub sale_status: SaleStatus,
    pub flow_status: FlowStatus,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the flow overlay and timeline.
#[derive(Debug, Clone)]
pub struct FlowRepository {
    pool: SqlitePool,
}

impl FlowRepository {
    /// Creates a new FlowRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FlowRepository { pool }
    }

    /// Creates the overlay for a newly stored sale, in `awaiting_review`,
    /// together with its `Created` timeline entry.
    pub async fn create_overlay(
        &self,
        sale_id: &str,
        entry: &TimelineEntry,
    ) -> DbResult<FlowOverlay> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        debug!(sale_id = %sale_id, "Creating flow overlay");

        sqlx::query(
            r#"
            INSERT INTO sale_flow (sale_id, status, locked, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, ?3)
            "#,
        )
        .bind(sale_id)
        .bind(FlowStatus::AwaitingReview)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        insert_timeline_entry(&mut tx, sale_id, entry).await?;

        tx.commit().await?;

        self.get_overlay(sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("FlowOverlay", sale_id))
    }

    /// Gets the overlay for a sale.
    pub async fn get_overlay(&self, sale_id: &str) -> DbResult<Option<FlowOverlay>> {
        let row = sqlx::query_as::<_, OverlayRow>("SELECT * FROM sale_flow WHERE sale_id = ?1")
            .bind(sale_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(OverlayRow::into_overlay))
    }

    /// Records a transition decided by the service layer.
    ///
    /// ## Atomicity
    /// Status change, receipt, optional lock, and the timeline entry commit
    /// in ONE transaction.
    ///
    /// ## Arguments
    /// * `next` - the status computed by the core transition table
    /// * `receipt` - who acted, when, and (for rejections/returns) why
    /// * `is_rejection` - stores the receipt on the rejection side when true
    /// * `lock` - set the edit lock (used by finalize)
    pub async fn record_transition(
        &self,
        sale_id: &str,
        next: FlowStatus,
        receipt: &Receipt,
        is_rejection: bool,
        lock: bool,
        entry: &TimelineEntry,
    ) -> DbResult<FlowOverlay> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let sql = if is_rejection {
            r#"
            UPDATE sale_flow SET
                status = ?2,
                rejection_actor_id = ?3,
                rejection_actor_name = ?4,
                rejection_at = ?5,
                rejection_reason = ?6,
                locked = CASE WHEN ?7 THEN 1 ELSE locked END,
                updated_at = ?8
            WHERE sale_id = ?1
            "#
        } else {
            r#"
            UPDATE sale_flow SET
                status = ?2,
                approval_actor_id = ?3,
                approval_actor_name = ?4,
                approval_at = ?5,
                approval_reason = ?6,
                locked = CASE WHEN ?7 THEN 1 ELSE locked END,
                updated_at = ?8
            WHERE sale_id = ?1
            "#
        };

        let result = sqlx::query(sql)
            .bind(sale_id)
            .bind(next)
            .bind(&receipt.actor_id)
            .bind(&receipt.actor_name)
            .bind(receipt.at)
            .bind(&receipt.reason)
            .bind(lock)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("FlowOverlay", sale_id));
        }

        insert_timeline_entry(&mut tx, sale_id, entry).await?;

        tx.commit().await?;

        debug!(sale_id = %sale_id, status = ?next, "Transition recorded");

        self.get_overlay(sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("FlowOverlay", sale_id))
    }

    /// Registers a content edit: appends the diff-formatted timeline entry
    /// AND applies the field changes to the sale row, in one transaction,
    /// so recorded history and recorded data cannot drift apart.
    ///
    /// The service layer checks the edit lock and the field whitelist
    /// before calling; an unlisted field still fails hard here.
    pub async fn register_edit(&self, sale_id: &str, entry: &TimelineEntry) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for change in &entry.changes {
            let sql = match change.field.as_str() {
                "notes" => "UPDATE sales SET notes = ?2, updated_at = ?3 WHERE id = ?1",
                "customer_name" => {
                    "UPDATE sales SET customer_name = ?2, updated_at = ?3 WHERE id = ?1"
                }
                "customer_phone" => {
                    "UPDATE sales SET customer_phone = ?2, updated_at = ?3 WHERE id = ?1"
                }
                other => {
                    return Err(DbError::QueryFailed(format!(
                        "field '{other}' is not editable"
                    )))
                }
            };

            let result = sqlx::query(sql)
                .bind(sale_id)
                .bind(&change.after)
                .bind(now)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Sale", sale_id));
            }
        }

        insert_timeline_entry(&mut tx, sale_id, entry).await?;

        tx.commit().await?;

        debug!(sale_id = %sale_id, changes = entry.changes.len(), "Edit registered");

        Ok(())
    }

    /// Gets the full timeline for a sale, oldest first.
    pub async fn get_timeline(&self, sale_id: &str) -> DbResult<Vec<TimelineEntry>> {
        let rows = sqlx::query_as::<_, TimelineRow>(
            "SELECT at, kind, actor_id, actor_name, description, changes_json \
             FROM flow_timeline WHERE sale_id = ?1 ORDER BY at, id",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TimelineRow::into_entry).collect()
    }

    /// Lists sale + overlay summaries whose flow status is in `statuses`,
    /// ordered by sale number.
    pub async fn list_by_status(
        &self,
        statuses: &[FlowStatus],
    ) -> DbResult<Vec<SaleFlowSummary>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                s.id AS sale_id,
                s.sale_number,
                s.store_id,
                s.salesperson_id,
                s.customer_name,
                s.total_centavos,
                s.profit_centavos,
                s.margin_bps,
                s.status AS sale_status,
                f.status AS flow_status,
                f.locked,
                s.created_at
            FROM sales s
            JOIN sale_flow f ON f.sale_id = s.id
            WHERE f.status IN (
            "#,
        );

        {
            let mut separated = qb.separated(", ");
            for status in statuses {
                separated.push_bind(*status);
            }
        }
        qb.push(") ORDER BY s.sale_number");

        let rows = qb
            .build_query_as::<SaleFlowSummary>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}

/// Appends one timeline entry inside an open transaction.
async fn insert_timeline_entry(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    sale_id: &str,
    entry: &TimelineEntry,
) -> DbResult<()> {
    let changes_json = serde_json::to_string(&entry.changes)
        .map_err(|e| DbError::Internal(format!("serialize timeline changes: {e}")))?;

    let conn: &mut SqliteConnection = &mut *tx;

    sqlx::query(
        r#"
        INSERT INTO flow_timeline (id, sale_id, at, kind, actor_id, actor_name, description, changes_json)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(sale_id)
    .bind(entry.at)
    .bind(entry.kind)
    .bind(&entry.actor_id)
    .bind(&entry.actor_name)
    .bind(&entry.description)
    .bind(changes_json)
    .execute(conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
