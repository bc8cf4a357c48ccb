//! # Product Repository
//!
//! Database operations for inventory products.
//!
//! ## Stock Discipline
//! Stock mutations triggered by sales (decrement on create, restore on
//! cancel) happen inside the sale repository's transactions, never here.
//! This repository covers catalog maintenance and manual adjustments,
//! each adjustment leaving a stock movement behind.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use balcao_core::{MovementKind, Product, StockMovement};

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price_centavos: i64,
    pub cost_centavos: i64,
    pub stock_quantity: i64,
}

/// Repository for product operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// Returns [`DbError::UniqueViolation`] when the SKU already exists.
    pub async fn insert(&self, input: NewProduct) -> DbResult<Product> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, price_centavos, cost_centavos,
                                  stock_quantity, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(&input.sku)
        .bind(&input.name)
        .bind(input.price_centavos)
        .bind(input.cost_centavos)
        .bind(input.stock_quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(product_id = %id, sku = %input.sku, "Product created");

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &id))
    }

    /// Gets a product by its UUID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists active products ordered by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Manually adjusts stock by a signed delta, recording the movement.
    ///
    /// Used for recounts and receiving shipments. Negative stock is
    /// tolerated: the physical counter keeps selling even when the
    /// numbers lag behind, and a recount fixes them later.
    pub async fn adjust_stock(&self, product_id: &str, delta: i64) -> DbResult<Product> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity + ?2, updated_at = ?3 \
             WHERE id = ?1",
        )
        .bind(product_id)
        .bind(delta)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        let kind = if delta < 0 {
            MovementKind::Outbound
        } else {
            MovementKind::Return
        };

        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, product_id, sale_id, kind, quantity, created_at)
            VALUES (?1, ?2, NULL, ?3, ?4, ?5)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(product_id)
        .bind(kind)
        .bind(delta.abs())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(product_id = %product_id, delta, "Stock adjusted");

        self.get_by_id(product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))
    }

    /// Deactivates a product (soft delete). Historical sale items keep
    /// their frozen snapshot of it.
    pub async fn deactivate(&self, product_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(product_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        info!(product_id = %product_id, "Product deactivated");
        Ok(())
    }

    /// Lists stock movements for a product, newest first.
    pub async fn movements(&self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements WHERE product_id = ?1 ORDER BY created_at DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn charger(stock: i64) -> NewProduct {
        NewProduct {
            sku: "CHG-20W".to_string(),
            name: "Carregador 20W USB-C".to_string(),
            price_centavos: 1500,
            cost_centavos: 600,
            stock_quantity: stock,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup_by_sku() {
        let db = test_db().await;
        let created = db.products().insert(charger(10)).await.unwrap();

        let by_sku = db
            .products()
            .get_by_sku("CHG-20W")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_sku.id, created.id);
        assert_eq!(by_sku.stock_quantity, 10);
        assert!(by_sku.is_active);

        assert!(db.products().get_by_sku("NO-SUCH").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_unique_violation() {
        let db = test_db().await;
        db.products().insert(charger(10)).await.unwrap();

        let err = db.products().insert(charger(3)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_adjust_stock_records_movement_and_tolerates_negative() {
        let db = test_db().await;
        let product = db.products().insert(charger(2)).await.unwrap();

        // Recount below zero: units sold before the paperwork landed
        let adjusted = db.products().adjust_stock(&product.id, -5).await.unwrap();
        assert_eq!(adjusted.stock_quantity, -3);

        // Receiving a shipment brings it back up
        let adjusted = db.products().adjust_stock(&product.id, 10).await.unwrap();
        assert_eq!(adjusted.stock_quantity, 7);

        let movements = db.products().movements(&product.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        for movement in &movements {
            // Manual adjustments reference no sale
            assert!(movement.sale_id.is_none());
            assert!(movement.quantity > 0);
        }
        assert!(movements
            .iter()
            .any(|m| m.kind == MovementKind::Outbound && m.quantity == 5));
        assert!(movements
            .iter()
            .any(|m| m.kind == MovementKind::Return && m.quantity == 10));
    }

    #[tokio::test]
    async fn test_adjust_stock_unknown_product() {
        let db = test_db().await;
        let err = db.products().adjust_stock("no-such", 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_deactivate_removes_from_active_listing() {
        let db = test_db().await;
        let product = db.products().insert(charger(10)).await.unwrap();
        assert_eq!(db.products().list_active().await.unwrap().len(), 1);

        db.products().deactivate(&product.id).await.unwrap();

        assert!(db.products().list_active().await.unwrap().is_empty());
        // Soft delete: the row itself survives for historical snapshots
        let kept = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert!(!kept.is_active);
    }
}
