//! # Flow Service
//!
//! The conferencing workflow, one method per transition.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      FlowService Request Flow                           │
//! │                                                                         │
//! │  caller (back-office screen / import job)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  FlowService::approve_by_manager(sale_id, actor…)                       │
//! │       │                                                                 │
//! │       ├── 1. load overlay          (missing → SaleNotFound)            │
//! │       ├── 2. transition table      (wrong status → InvalidTransition)  │
//! │       ├── 3. record transactionally (status + receipt + timeline)      │
//! │       └── 4. publish notification  (fire-and-forget, after commit)     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Step 2 is the ONLY legality check in the system; the repositories
//! persist whatever the table allowed. A failed check changes nothing.

use tracing::info;

use balcao_core::{
    transition_description, validation::validate_sale_draft, CoreError, EventKind, FieldChange,
    FlowOverlay, FlowStatus, FlowTransition, Receipt, Sale, SaleDraft, TimelineEntry,
    ValidationError,
};
use balcao_db::{Database, SaleFlowSummary, EDITABLE_SALE_FIELDS};

use crate::error::{FlowError, FlowResult};
use crate::notify::{FlowNotification, NotificationHub};

/// The sales conferencing service.
///
/// Composes the pure transition table (balcao-core) with the repositories
/// (balcao-db) and the notification hub. Cloning shares the pool and hub.
#[derive(Debug, Clone)]
pub struct FlowService {
    db: Database,
    hub: NotificationHub,
}

impl FlowService {
    /// Creates a service with its own notification hub.
    pub fn new(db: Database) -> Self {
        FlowService {
            db,
            hub: NotificationHub::new(),
        }
    }

    /// Creates a service publishing into an existing hub.
    pub fn with_hub(db: Database, hub: NotificationHub) -> Self {
        FlowService { db, hub }
    }

    /// The notification hub, for subscribing.
    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Sale Entry
    // =========================================================================

    /// Validates and persists a sale, creating its flow overlay in
    /// `AwaitingReview`.
    ///
    /// ## Errors
    /// * `FlowError::Core(Validation(..))` when the draft's arithmetic or
    ///   payment coverage is off
    /// * `FlowError::Db(NotFound)` when a line references an unknown product
    pub async fn create_sale(
        &self,
        draft: &SaleDraft,
        actor_id: &str,
        actor_name: &str,
    ) -> FlowResult<Sale> {
        validate_sale_draft(draft).map_err(CoreError::from)?;

        let sale = self.db.sales().create(draft).await?;

        let entry = TimelineEntry {
            at: sale.created_at,
            kind: EventKind::Created,
            actor_id: actor_id.to_string(),
            actor_name: actor_name.to_string(),
            description: format!("Sale #{} entered by {}", sale.sale_number, actor_name),
            changes: vec![],
        };
        self.db.flow().create_overlay(&sale.id, &entry).await?;

        info!(
            sale_id = %sale.id,
            sale_number = sale.sale_number,
            "Sale entered, awaiting review"
        );

        Ok(sale)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Vendor submits (or resubmits) the entry for manager review.
    pub async fn submit_entry(
        &self,
        sale_id: &str,
        actor_id: &str,
        actor_name: &str,
    ) -> FlowResult<FlowOverlay> {
        self.transition(
            sale_id,
            FlowTransition::SubmitEntry,
            Receipt::now(actor_id, actor_name),
        )
        .await
    }

    /// Manager rejects the entry back to the vendor. The reason is required
    /// and stored on the rejection receipt.
    pub async fn reject_by_manager(
        &self,
        sale_id: &str,
        actor_id: &str,
        actor_name: &str,
        reason: &str,
    ) -> FlowResult<FlowOverlay> {
        let reason = required_reason(reason)?;
        self.transition(
            sale_id,
            FlowTransition::RejectByManager,
            Receipt::now(actor_id, actor_name).with_reason(reason),
        )
        .await
    }

    /// Manager approves; the sale moves to finance review.
    pub async fn approve_by_manager(
        &self,
        sale_id: &str,
        actor_id: &str,
        actor_name: &str,
    ) -> FlowResult<FlowOverlay> {
        self.transition(
            sale_id,
            FlowTransition::ApproveByManager,
            Receipt::now(actor_id, actor_name),
        )
        .await
    }

    /// Finance returns the sale for another manager pass. Reason required.
    pub async fn return_by_finance(
        &self,
        sale_id: &str,
        actor_id: &str,
        actor_name: &str,
        reason: &str,
    ) -> FlowResult<FlowOverlay> {
        let reason = required_reason(reason)?;
        self.transition(
            sale_id,
            FlowTransition::ReturnByFinance,
            Receipt::now(actor_id, actor_name).with_reason(reason),
        )
        .await
    }

    /// Finance finalizes the sale. Terminal; locks the overlay against
    /// content edits in the same write as the status change.
    pub async fn finalize(
        &self,
        sale_id: &str,
        actor_id: &str,
        actor_name: &str,
    ) -> FlowResult<FlowOverlay> {
        self.transition(
            sale_id,
            FlowTransition::Finalize,
            Receipt::now(actor_id, actor_name),
        )
        .await
    }

    /// Cancels the sale from any non-terminal state. Reason required.
    ///
    /// Restores inventory through the sale repository (exactly once, see
    /// [`balcao_db::SaleRepository::cancel`]), then records the flow
    /// transition. The legality check runs FIRST, so a finalized sale
    /// cannot be cancelled and its stock stays untouched.
    ///
    /// ## Two commits, not one
    /// The stock restore and the flow transition are separate transactions.
    /// Conferencing writes go through a single back-office process, so no
    /// concurrent writer can slip between them; if the process dies after
    /// the first commit, retrying the cancel converges (the repository
    /// cancel is a no-op on an already-cancelled sale, and the transition
    /// then completes the overlay).
    pub async fn cancel(
        &self,
        sale_id: &str,
        actor_id: &str,
        actor_name: &str,
        reason: &str,
    ) -> FlowResult<FlowOverlay> {
        let reason = required_reason(reason)?;

        let overlay = self.overlay(sale_id).await?;
        FlowTransition::Cancel.apply(overlay.status)?;

        self.db.sales().cancel(sale_id, reason).await?;

        self.transition(
            sale_id,
            FlowTransition::Cancel,
            Receipt::now(actor_id, actor_name).with_reason(reason),
        )
        .await
    }

    /// Shared transition body: load, check the table, record, notify.
    async fn transition(
        &self,
        sale_id: &str,
        transition: FlowTransition,
        receipt: Receipt,
    ) -> FlowResult<FlowOverlay> {
        let overlay = self.overlay(sale_id).await?;
        let next = transition.apply(overlay.status).map_err(FlowError::from)?;

        // Rejections, returns, and cancels carry a reason and land on the
        // rejection receipt; approvals and finalize on the approval side.
        let is_rejection = matches!(
            transition,
            FlowTransition::RejectByManager | FlowTransition::ReturnByFinance | FlowTransition::Cancel
        );
        let lock = matches!(transition, FlowTransition::Finalize);

        let entry = TimelineEntry {
            at: receipt.at,
            kind: transition.event_kind(),
            actor_id: receipt.actor_id.clone(),
            actor_name: receipt.actor_name.clone(),
            description: transition_description(transition, &receipt),
            changes: vec![],
        };

        let updated = self
            .db
            .flow()
            .record_transition(sale_id, next, &receipt, is_rejection, lock, &entry)
            .await?;

        info!(
            sale_id = %sale_id,
            from = ?overlay.status,
            to = ?next,
            actor = %receipt.actor_name,
            "Flow transition applied"
        );

        // Published only after the commit; a missed notification loses
        // nothing, the timeline is the durable record.
        if let Some(sale) = self.db.sales().get_by_id(sale_id).await? {
            self.hub.publish(FlowNotification {
                sale_id: sale_id.to_string(),
                sale_number: sale.sale_number,
                from: overlay.status,
                to: next,
                actor_name: receipt.actor_name,
                at: receipt.at,
            });
        }

        Ok(updated)
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Registers a content edit: applies the field changes to the sale and
    /// appends a diff-formatted timeline entry, atomically.
    ///
    /// ## Errors
    /// * `CoreError::Locked` once the overlay is finalized; nothing is
    ///   written, not even the timeline entry
    /// * `FlowError::UneditableField` for fields outside the whitelist
    ///   (financial fields are immutable after creation)
    pub async fn register_edit(
        &self,
        sale_id: &str,
        actor_id: &str,
        actor_name: &str,
        changes: Vec<FieldChange>,
    ) -> FlowResult<()> {
        let overlay = self.overlay(sale_id).await?;

        if overlay.locked {
            return Err(CoreError::Locked {
                sale_id: sale_id.to_string(),
            }
            .into());
        }

        if changes.is_empty() {
            return Err(CoreError::Validation(ValidationError::Required {
                field: "changes".to_string(),
            })
            .into());
        }

        for change in &changes {
            if !EDITABLE_SALE_FIELDS.contains(&change.field.as_str()) {
                return Err(FlowError::UneditableField {
                    field: change.field.clone(),
                });
            }
        }

        let described: Vec<String> = changes.iter().map(FieldChange::describe).collect();
        let entry = TimelineEntry {
            at: chrono::Utc::now(),
            kind: EventKind::Edited,
            actor_id: actor_id.to_string(),
            actor_name: actor_name.to_string(),
            description: format!("Edited by {}: {}", actor_name, described.join("; ")),
            changes,
        };

        self.db.flow().register_edit(sale_id, &entry).await?;

        info!(sale_id = %sale_id, actor = %actor_name, "Edit registered");

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The flow overlay for a sale.
    ///
    /// ## Errors
    /// `CoreError::SaleNotFound` when no overlay exists for the id.
    pub async fn overlay(&self, sale_id: &str) -> FlowResult<FlowOverlay> {
        self.db
            .flow()
            .get_overlay(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
    }

    /// The full timeline for a sale, oldest first.
    pub async fn timeline(&self, sale_id: &str) -> FlowResult<Vec<TimelineEntry>> {
        Ok(self.db.flow().get_timeline(sale_id).await?)
    }

    /// Sale + overlay summaries filtered by flow status.
    pub async fn list_by_status(
        &self,
        statuses: &[FlowStatus],
    ) -> FlowResult<Vec<SaleFlowSummary>> {
        Ok(self.db.flow().list_by_status(statuses).await?)
    }
}

/// Rejections, returns, and cancels must say why.
fn required_reason(reason: &str) -> Result<&str, FlowError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(ValidationError::Required {
            field: "reason".to_string(),
        })
        .into());
    }
    Ok(trimmed)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use balcao_core::{DraftItem, DraftPayment, PaymentMethod, SaleStatus};
    use balcao_db::{DbConfig, NewProduct};

    async fn test_service() -> FlowService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        FlowService::new(db)
    }

    /// One phone, cost R$ 100,00, sold for R$ 150,00, paid via Pix.
    async fn entered_sale(service: &FlowService) -> Sale {
        let product = service
            .database()
            .products()
            .insert(NewProduct {
                sku: "IPH13-128".to_string(),
                name: "iPhone 13 128GB".to_string(),
                price_centavos: 15000,
                cost_centavos: 10000,
                stock_quantity: 5,
            })
            .await
            .unwrap();

        let draft = SaleDraft {
            store_id: "matriz".to_string(),
            salesperson_id: "v1".to_string(),
            customer_id: None,
            customer_name: "João Silva".to_string(),
            customer_phone: Some("11 98888-1111".to_string()),
            items: vec![DraftItem {
                product_id: product.id,
                description: "iPhone 13 128GB".to_string(),
                serial_imei: Some("355608081234567".to_string()),
                list_price_centavos: 15000,
                sale_price_centavos: 15000,
                cost_centavos: 10000,
                quantity: 1,
                is_accessory: false,
            }],
            trade_ins: vec![],
            payments: vec![DraftPayment {
                method: PaymentMethod::Pix,
                amount_centavos: 15000,
                account_id: "acc-pix".to_string(),
                installments: None,
            }],
            delivery_fee_centavos: 0,
            extended_warranty_fee_centavos: 0,
            subtotal_centavos: 15000,
            accessory_total_centavos: 0,
            trade_in_total_centavos: 0,
            total_centavos: 15000,
            total_cost_centavos: 10000,
            profit_centavos: 5000,
            notes: None,
        };

        service.create_sale(&draft, "v1", "Pedro").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_sale_totals_and_overlay() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;

        assert_eq!(sale.subtotal_centavos, 15000);
        assert_eq!(sale.total_centavos, 15000);
        assert_eq!(sale.profit_centavos, 5000);
        assert_eq!(sale.margin_bps, 3333);
        assert!(sale.totals_consistent());

        let overlay = service.overlay(&sale.id).await.unwrap();
        assert_eq!(overlay.status, FlowStatus::AwaitingReview);
        assert!(!overlay.locked);
    }

    #[tokio::test]
    async fn test_create_sale_rejects_bad_arithmetic() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;

        // Reuse a valid draft shape but break the profit figure
        let mut draft = SaleDraft {
            store_id: "matriz".to_string(),
            salesperson_id: "v1".to_string(),
            customer_id: None,
            customer_name: "Maria".to_string(),
            customer_phone: None,
            items: vec![DraftItem {
                product_id: "irrelevant".to_string(),
                description: "Phone".to_string(),
                serial_imei: None,
                list_price_centavos: 15000,
                sale_price_centavos: 15000,
                cost_centavos: 10000,
                quantity: 1,
                is_accessory: false,
            }],
            trade_ins: vec![],
            payments: vec![DraftPayment {
                method: PaymentMethod::Cash,
                amount_centavos: 15000,
                account_id: "acc-cash".to_string(),
                installments: None,
            }],
            delivery_fee_centavos: 0,
            extended_warranty_fee_centavos: 0,
            subtotal_centavos: 15000,
            accessory_total_centavos: 0,
            trade_in_total_centavos: 0,
            total_centavos: 15000,
            total_cost_centavos: 10000,
            profit_centavos: 5000,
            notes: None,
        };
        draft.profit_centavos = 9999;

        let err = service.create_sale(&draft, "v1", "Pedro").await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Core(CoreError::Validation(
                ValidationError::InconsistentTotals { .. }
            ))
        ));

        // Nothing new was persisted
        assert_eq!(
            service.database().sales().list().await.unwrap().len(),
            1,
            "only the seeded sale exists"
        );
        let _ = sale;
    }

    #[tokio::test]
    async fn test_submit_then_resubmit_is_invalid() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;

        let overlay = service.submit_entry(&sale.id, "v1", "Pedro").await.unwrap();
        assert_eq!(overlay.status, FlowStatus::ManagerReview);

        let timeline = service.timeline(&sale.id).await.unwrap();
        assert_eq!(timeline.len(), 2); // Created + Submitted
        assert_eq!(timeline[1].kind, EventKind::Submitted);

        // Second submit fails the pre-state check and changes nothing
        let err = service.submit_entry(&sale.id, "v1", "Pedro").await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Core(CoreError::InvalidTransition {
                current: FlowStatus::ManagerReview,
                attempted: FlowTransition::SubmitEntry,
            })
        ));
        assert_eq!(service.timeline(&sale.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejection_loop_stores_reason_and_allows_resubmission() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;

        service.submit_entry(&sale.id, "v1", "Pedro").await.unwrap();
        let overlay = service
            .reject_by_manager(&sale.id, "g1", "Marina", "missing receipt")
            .await
            .unwrap();

        assert_eq!(overlay.status, FlowStatus::ManagerRejected);
        let rejection = overlay.rejection.unwrap();
        assert_eq!(rejection.actor_name, "Marina");
        assert_eq!(rejection.reason.as_deref(), Some("missing receipt"));

        // Vendor fixes and resubmits
        let overlay = service.submit_entry(&sale.id, "v1", "Pedro").await.unwrap();
        assert_eq!(overlay.status, FlowStatus::ManagerReview);
    }

    #[tokio::test]
    async fn test_rejection_without_reason_is_rejected() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;
        service.submit_entry(&sale.id, "v1", "Pedro").await.unwrap();

        let err = service
            .reject_by_manager(&sale.id, "g1", "Marina", "   ")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Core(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[tokio::test]
    async fn test_finance_bounce_back() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;

        service.submit_entry(&sale.id, "v1", "Pedro").await.unwrap();
        service.approve_by_manager(&sale.id, "g1", "Marina").await.unwrap();
        let overlay = service
            .return_by_finance(&sale.id, "f1", "Carlos", "account mismatch")
            .await
            .unwrap();
        assert_eq!(overlay.status, FlowStatus::FinanceReturned);

        // Bounce-back re-enters MANAGER review, not finance
        let overlay = service.submit_entry(&sale.id, "v1", "Pedro").await.unwrap();
        assert_eq!(overlay.status, FlowStatus::ManagerReview);
    }

    #[tokio::test]
    async fn test_finalize_locks_edits() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;

        service.submit_entry(&sale.id, "v1", "Pedro").await.unwrap();
        service.approve_by_manager(&sale.id, "g1", "Marina").await.unwrap();
        let overlay = service.finalize(&sale.id, "f1", "Carlos").await.unwrap();
        assert_eq!(overlay.status, FlowStatus::Finalized);
        assert!(overlay.locked);

        let entries_before = service.timeline(&sale.id).await.unwrap().len();

        let err = service
            .register_edit(
                &sale.id,
                "v1",
                "Pedro",
                vec![FieldChange {
                    field: "notes".to_string(),
                    before: String::new(),
                    after: "too late".to_string(),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Core(CoreError::Locked { .. })));

        // No timeline entry was appended for the refused edit
        assert_eq!(
            service.timeline(&sale.id).await.unwrap().len(),
            entries_before
        );
    }

    #[tokio::test]
    async fn test_register_edit_applies_changes_and_records_diff() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;

        service
            .register_edit(
                &sale.id,
                "v1",
                "Pedro",
                vec![FieldChange {
                    field: "customer_phone".to_string(),
                    before: "11 98888-1111".to_string(),
                    after: "11 97777-2222".to_string(),
                }],
            )
            .await
            .unwrap();

        let updated = service
            .database()
            .sales()
            .get_by_id(&sale.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.customer_phone.as_deref(), Some("11 97777-2222"));

        let timeline = service.timeline(&sale.id).await.unwrap();
        let edit = timeline.last().unwrap();
        assert_eq!(edit.kind, EventKind::Edited);
        assert_eq!(edit.changes[0].field, "customer_phone");
    }

    #[tokio::test]
    async fn test_register_edit_refuses_financial_fields() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;

        let err = service
            .register_edit(
                &sale.id,
                "v1",
                "Pedro",
                vec![FieldChange {
                    field: "profit_centavos".to_string(),
                    before: "5000".to_string(),
                    after: "50000".to_string(),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UneditableField { .. }));
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_and_terminates_flow() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;

        let overlay = service
            .cancel(&sale.id, "g1", "Marina", "customer gave up")
            .await
            .unwrap();
        assert_eq!(overlay.status, FlowStatus::Cancelled);

        let cancelled = service
            .database()
            .sales()
            .get_by_id(&sale.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);

        let product = service
            .database()
            .products()
            .get_by_sku("IPH13-128")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock_quantity, 5, "stock restored");

        // Terminal: nothing else applies
        let err = service.submit_entry(&sale.id, "v1", "Pedro").await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Core(CoreError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_retry_converges_after_partial_failure() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;

        // Simulate a crash between the two commits: the sale is already
        // cancelled at the repository level, but the overlay never moved.
        service
            .database()
            .sales()
            .cancel(&sale.id, "customer gave up")
            .await
            .unwrap();
        let overlay = service.overlay(&sale.id).await.unwrap();
        assert_eq!(overlay.status, FlowStatus::AwaitingReview);

        // Retrying completes the overlay without double-restoring stock
        let overlay = service
            .cancel(&sale.id, "g1", "Marina", "customer gave up")
            .await
            .unwrap();
        assert_eq!(overlay.status, FlowStatus::Cancelled);

        let product = service
            .database()
            .products()
            .get_by_sku("IPH13-128")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock_quantity, 5);
    }

    #[tokio::test]
    async fn test_cancel_after_finalize_is_refused() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;

        service.submit_entry(&sale.id, "v1", "Pedro").await.unwrap();
        service.approve_by_manager(&sale.id, "g1", "Marina").await.unwrap();
        service.finalize(&sale.id, "f1", "Carlos").await.unwrap();

        let err = service
            .cancel(&sale.id, "g1", "Marina", "too late")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Core(CoreError::InvalidTransition {
                current: FlowStatus::Finalized,
                ..
            })
        ));

        // Stock untouched by the refused cancel
        let product = service
            .database()
            .products()
            .get_by_sku("IPH13-128")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock_quantity, 4);
    }

    #[tokio::test]
    async fn test_transition_publishes_notification() {
        let service = test_service().await;
        let sale = entered_sale(&service).await;
        let mut rx = service.hub().subscribe();

        service.submit_entry(&sale.id, "v1", "Pedro").await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.sale_id, sale.id);
        assert_eq!(event.sale_number, sale.sale_number);
        assert_eq!(event.from, FlowStatus::AwaitingReview);
        assert_eq!(event.to, FlowStatus::ManagerReview);
    }

    #[tokio::test]
    async fn test_unknown_sale_is_not_found() {
        let service = test_service().await;

        let err = service
            .submit_entry("no-such-sale", "v1", "Pedro")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Core(CoreError::SaleNotFound(_))
        ));
    }
}
