//! # Finance Ledger Repository
//!
//! Read access to the ledger entries written by sale creation.
//!
//! Entries are append-only and written exclusively inside the sale
//! repository's create transaction, one per payment line. This repository
//! only reads them back for finance review and account balances.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::DbResult;
use balcao_core::{LedgerEntry, Money};

/// Balance of one ledger account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AccountBalance {
    pub account_id: String,
    pub total_centavos: i64,
    pub entry_count: i64,
}

impl AccountBalance {
    /// Returns the balance as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_centavos(self.total_centavos)
    }
}

/// Repository for finance ledger reads.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Gets all ledger entries for a sale, in insertion order.
    pub async fn entries_for_sale(&self, sale_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM ledger_entries WHERE sale_id = ?1 ORDER BY created_at",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Gets the running balance of one account.
    pub async fn account_balance(&self, account_id: &str) -> DbResult<AccountBalance> {
        let balance = sqlx::query_as::<_, AccountBalance>(
            r#"
            SELECT
                ?1 AS account_id,
                COALESCE(SUM(amount_centavos), 0) AS total_centavos,
                COUNT(*) AS entry_count
            FROM ledger_entries
            WHERE account_id = ?1
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(balance)
    }

    /// Gets balances for every account with at least one entry.
    pub async fn balances(&self) -> DbResult<Vec<AccountBalance>> {
        let balances = sqlx::query_as::<_, AccountBalance>(
            r#"
            SELECT
                account_id,
                SUM(amount_centavos) AS total_centavos,
                COUNT(*) AS entry_count
            FROM ledger_entries
            GROUP BY account_id
            ORDER BY account_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(balances)
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
    use balcao_core::{DraftItem, DraftPayment, PaymentMethod, SaleDraft};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// Creates a sale paid partly via Pix, partly in cash, so the ledger
    /// receives entries on two different accounts.
    async fn split_payment_sale(db: &Database, sku: &str) -> String {
        let product = db
            .products()
            .insert(NewProduct {
                sku: sku.to_string(),
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
            customer_phone: None,
            items: vec![DraftItem {
                product_id: product.id.clone(),
                description: "iPhone 13 128GB".to_string(),
                serial_imei: None,
                list_price_centavos: 15000,
                sale_price_centavos: 15000,
                cost_centavos: 10000,
                quantity: 1,
                is_accessory: false,
            }],
            trade_ins: vec![],
            payments: vec![
                DraftPayment {
                    method: PaymentMethod::Pix,
                    amount_centavos: 10000,
                    account_id: "acc-pix".to_string(),
                    installments: None,
                },
                DraftPayment {
                    method: PaymentMethod::Cash,
                    amount_centavos: 5000,
                    account_id: "acc-caixa".to_string(),
                    installments: None,
                },
            ],
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

        db.sales().create(&draft).await.unwrap().id
    }

    #[tokio::test]
    async fn test_entries_mirror_payment_lines() {
        let db = test_db().await;
        let sale_id = split_payment_sale(&db, "IPH13-128").await;

        let entries = db.ledger().entries_for_sale(&sale_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        let total: i64 = entries.iter().map(|e| e.amount_centavos).sum();
        assert_eq!(total, 15000);
    }

    #[tokio::test]
    async fn test_account_balance_sums_one_account() {
        let db = test_db().await;
        split_payment_sale(&db, "IPH13-128").await;
        split_payment_sale(&db, "IPH13-256").await;

        let pix = db.ledger().account_balance("acc-pix").await.unwrap();
        assert_eq!(pix.account_id, "acc-pix");
        assert_eq!(pix.total_centavos, 20000);
        assert_eq!(pix.entry_count, 2);
        assert_eq!(pix.total(), Money::from_centavos(20000));
    }

    #[tokio::test]
    async fn test_account_balance_unknown_account_is_zero() {
        let db = test_db().await;
        split_payment_sale(&db, "IPH13-128").await;

        let ghost = db.ledger().account_balance("acc-ghost").await.unwrap();
        assert_eq!(ghost.total_centavos, 0);
        assert_eq!(ghost.entry_count, 0);
    }

    #[tokio::test]
    async fn test_balances_grouped_per_account() {
        let db = test_db().await;
        split_payment_sale(&db, "IPH13-128").await;

        let balances = db.ledger().balances().await.unwrap();
        assert_eq!(balances.len(), 2);
        // Ordered by account_id
        assert_eq!(balances[0].account_id, "acc-caixa");
        assert_eq!(balances[0].total_centavos, 5000);
        assert_eq!(balances[1].account_id, "acc-pix");
        assert_eq!(balances[1].total_centavos, 10000);
    }
}
