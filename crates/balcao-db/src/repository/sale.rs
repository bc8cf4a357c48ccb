//! # Sale Repository
//!
//! Database operations for sales, line items, trade-ins, and payments.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (single transaction)                                        │
//! │     └── create() → Sale { status: Active }                             │
//! │         ├── assigns UUID + next sale_number                            │
//! │         ├── inserts items / trade-ins / payments                       │
//! │         ├── decrements product stock + outbound movements              │
//! │         └── appends one ledger entry per payment line                  │
//! │                                                                         │
//! │  2. CONFERENCING (overlay, see FlowRepository)                         │
//! │     └── content edits land here via the flow's register_edit           │
//! │                                                                         │
//! │  3. (OPTIONAL) CANCEL                                                  │
//! │     └── cancel() → Sale { status: Cancelled }                          │
//! │         ├── restores stock exactly once + return movements             │
//! │         └── second call warns and returns the record unchanged         │
//! │                                                                         │
//! │  Sales are NEVER hard-deleted.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The create is one SQLite transaction: either the sale, its stock
//! decrements, and its ledger entries all commit, or none do.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use balcao_core::{
    Money, MovementKind, Payment, Sale, SaleDraft, SaleItem, SaleStatus, TradeIn,
};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Lists all sales, newest first.
    pub async fn list(&self) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>("SELECT * FROM sales ORDER BY sale_number DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Creates a sale from a validated draft.
    ///
    /// ## Single Transaction
    /// All of the following commit atomically:
    /// 1. Sale row (UUID + next sequential sale_number)
    /// 2. Line items, trade-ins, payments (snapshot pattern)
    /// 3. Stock decrement + outbound movement per line item
    /// 4. One ledger entry per payment line
    ///
    /// ## Errors
    /// * `DbError::NotFound` when a line item references an unknown product.
    pub async fn create(&self, draft: &SaleDraft) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        // Sequential business number, derived inside the transaction so two
        // concurrent creates cannot both observe the same maximum.
        let sale_number: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(sale_number), 0) + 1 FROM sales")
                .fetch_one(&mut *tx)
                .await?;

        let margin_bps = Money::from_centavos(draft.profit_centavos)
            .ratio_bps(Money::from_centavos(draft.total_centavos));

        debug!(id = %id, sale_number, "Creating sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, sale_number, store_id, salesperson_id,
                customer_id, customer_name, customer_phone,
                status, cancel_reason,
                subtotal_centavos, accessory_total_centavos, trade_in_total_centavos,
                delivery_fee_centavos, extended_warranty_fee_centavos,
                total_centavos, total_cost_centavos, profit_centavos, margin_bps,
                notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, NULL,
                ?9, ?10, ?11,
                ?12, ?13,
                ?14, ?15, ?16, ?17,
                ?18, ?19, ?19
            )
            "#,
        )
        .bind(&id)
        .bind(sale_number)
        .bind(&draft.store_id)
        .bind(&draft.salesperson_id)
        .bind(&draft.customer_id)
        .bind(&draft.customer_name)
        .bind(&draft.customer_phone)
        .bind(SaleStatus::Active)
        .bind(draft.subtotal_centavos)
        .bind(draft.accessory_total_centavos)
        .bind(draft.trade_in_total_centavos)
        .bind(draft.delivery_fee_centavos)
        .bind(draft.extended_warranty_fee_centavos)
        .bind(draft.total_centavos)
        .bind(draft.total_cost_centavos)
        .bind(draft.profit_centavos)
        .bind(margin_bps)
        .bind(&draft.notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &draft.items {
            // Unknown product is an error, not a placeholder
            let exists: Option<String> =
                sqlx::query_scalar("SELECT id FROM products WHERE id = ?1")
                    .bind(&item.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if exists.is_none() {
                return Err(DbError::not_found("Product", &item.product_id));
            }

            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, description, serial_imei,
                    list_price_centavos, sale_price_centavos, cost_centavos,
                    quantity, is_accessory, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(&item.product_id)
            .bind(&item.description)
            .bind(&item.serial_imei)
            .bind(item.list_price_centavos)
            .bind(item.sale_price_centavos)
            .bind(item.cost_centavos)
            .bind(item.quantity)
            .bind(item.is_accessory)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            // Stock leaves with the sale; negative stock is tolerated and
            // surfaced by inventory reports, matching store practice for
            // units sold before the import paperwork lands.
            sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity - ?2, updated_at = ?3 \
                 WHERE id = ?1",
            )
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO stock_movements (id, product_id, sale_id, kind, quantity, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&item.product_id)
            .bind(&id)
            .bind(MovementKind::Outbound)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for trade_in in &draft.trade_ins {
            sqlx::query(
                r#"
                INSERT INTO trade_ins (
                    id, sale_id, description, serial_imei,
                    declared_value_centavos, validated, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(&trade_in.description)
            .bind(&trade_in.serial_imei)
            .bind(trade_in.declared_value_centavos)
            .bind(trade_in.validated)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for payment in &draft.payments {
            let payment_id = Uuid::new_v4().to_string();

            sqlx::query(
                r#"
                INSERT INTO payments (
                    id, sale_id, method, amount_centavos,
                    account_id, installments, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&payment_id)
            .bind(&id)
            .bind(payment.method)
            .bind(payment.amount_centavos)
            .bind(&payment.account_id)
            .bind(payment.installments)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            // Forward the payment line to the finance ledger
            sqlx::query(
                r#"
                INSERT INTO ledger_entries (
                    id, sale_id, account_id, method, amount_centavos, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(&payment.account_id)
            .bind(payment.method)
            .bind(payment.amount_centavos)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %id,
            sale_number,
            total = draft.total_centavos,
            items = draft.items.len(),
            "Sale created"
        );

        let sale = self
            .get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", &id))?;

        Ok(sale)
    }

    /// Cancels a sale, restoring inventory exactly once.
    ///
    /// ## Idempotency
    /// The first call restores stock, writes return movements, and stores
    /// the reason. A second call logs a warning and returns the
    /// already-cancelled record unchanged.
    pub async fn cancel(&self, id: &str, reason: &str) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;

        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;

        if sale.status == SaleStatus::Cancelled {
            warn!(sale_id = %id, "Sale already cancelled; cancel is a no-op");
            return Ok(sale);
        }

        let now = Utc::now();

        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity + ?2, updated_at = ?3 \
                 WHERE id = ?1",
            )
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO stock_movements (id, product_id, sale_id, kind, quantity, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&item.product_id)
            .bind(id)
            .bind(MovementKind::Return)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE sales SET status = ?2, cancel_reason = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(SaleStatus::Cancelled)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(sale_id = %id, reason = %reason, "Sale cancelled, stock restored");

        let sale = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;

        Ok(sale)
    }

    /// Gets all line items for a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY created_at",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets all trade-ins for a sale.
    pub async fn get_trade_ins(&self, sale_id: &str) -> DbResult<Vec<TradeIn>> {
        let trade_ins = sqlx::query_as::<_, TradeIn>(
            "SELECT * FROM trade_ins WHERE sale_id = ?1 ORDER BY created_at",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(trade_ins)
    }

    /// Gets all payments for a sale.
    pub async fn get_payments(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE sale_id = ?1 ORDER BY created_at",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Marks a trade-in device as validated after physical/IMEI inspection.
    pub async fn validate_trade_in(&self, trade_in_id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE trade_ins SET validated = 1 WHERE id = ?1")
            .bind(trade_in_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TradeIn", trade_in_id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::NewProduct;
    use balcao_core::{DraftItem, DraftPayment, DraftTradeIn, PaymentMethod, Product};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, sku: &str, stock: i64) -> Product {
        db.products()
            .insert(NewProduct {
                sku: sku.to_string(),
                name: "iPhone 13 128GB".to_string(),
                price_centavos: 15000,
                cost_centavos: 10000,
                stock_quantity: stock,
            })
            .await
            .unwrap()
    }

    fn phone_draft(product_id: &str) -> SaleDraft {
        SaleDraft {
            store_id: "matriz".to_string(),
            salesperson_id: "v1".to_string(),
            customer_id: None,
            customer_name: "João Silva".to_string(),
            customer_phone: Some("11 98888-1111".to_string()),
            items: vec![DraftItem {
                product_id: product_id.to_string(),
                description: "iPhone 13 128GB".to_string(),
                serial_imei: Some("355000000000000".to_string()),
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
        }
    }

    #[tokio::test]
    async fn test_create_assigns_number_and_margin() {
        let db = test_db().await;
        let product = seed_product(&db, "IPH13-128", 5).await;

        let sale = db.sales().create(&phone_draft(&product.id)).await.unwrap();

        assert_eq!(sale.sale_number, 1);
        assert_eq!(sale.total_centavos, 15000);
        assert_eq!(sale.profit_centavos, 5000);
        // 5000 / 15000 = 33.33% margin
        assert_eq!(sale.margin_bps, 3333);
        assert!(sale.totals_consistent());

        let second = db.sales().create(&phone_draft(&product.id)).await.unwrap();
        assert_eq!(second.sale_number, 2);
    }

    #[tokio::test]
    async fn test_create_decrements_stock_and_writes_ledger() {
        let db = test_db().await;
        let product = seed_product(&db, "IPH13-128", 5).await;

        let sale = db.sales().create(&phone_draft(&product.id)).await.unwrap();

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 4);

        let entries = db.ledger().entries_for_sale(&sale.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount_centavos, 15000);
        assert_eq!(entries[0].account_id, "acc-pix");
    }

    #[tokio::test]
    async fn test_create_unknown_product_fails() {
        let db = test_db().await;

        let err = db
            .sales()
            .create(&phone_draft("no-such-product"))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NotFound { .. }));
        // The transaction rolled back: no orphan sale rows
        assert!(db.sales().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_exactly_once() {
        let db = test_db().await;
        let product = seed_product(&db, "IPH13-128", 5).await;
        let sale = db.sales().create(&phone_draft(&product.id)).await.unwrap();

        let cancelled = db.sales().cancel(&sale.id, "customer gave up").await.unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("customer gave up"));

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 5);

        // Second cancel is a no-op: stock must not double-restore
        let again = db.sales().cancel(&sale.id, "again").await.unwrap();
        assert_eq!(again.cancel_reason.as_deref(), Some("customer gave up"));
        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 5);
    }

    #[tokio::test]
    async fn test_validate_trade_in_after_inspection() {
        let db = test_db().await;
        let product = seed_product(&db, "IPH13-128", 5).await;

        // iPhone 13 sold against an iPhone 8 trade-in credit of R$ 30,00
        let mut draft = phone_draft(&product.id);
        draft.trade_ins = vec![DraftTradeIn {
            description: "iPhone 8 64GB".to_string(),
            serial_imei: Some("356000000000000".to_string()),
            declared_value_centavos: 3000,
            validated: false,
        }];
        draft.trade_in_total_centavos = 3000;
        draft.total_centavos = 12000;
        draft.profit_centavos = 2000;
        draft.payments[0].amount_centavos = 12000;

        let sale = db.sales().create(&draft).await.unwrap();

        let trade_ins = db.sales().get_trade_ins(&sale.id).await.unwrap();
        assert_eq!(trade_ins.len(), 1);
        assert!(!trade_ins[0].validated);

        db.sales().validate_trade_in(&trade_ins[0].id).await.unwrap();

        let trade_ins = db.sales().get_trade_ins(&sale.id).await.unwrap();
        assert!(trade_ins[0].validated);
    }

    #[tokio::test]
    async fn test_validate_trade_in_unknown_id() {
        let db = test_db().await;
        let err = db.sales().validate_trade_in("no-such").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
