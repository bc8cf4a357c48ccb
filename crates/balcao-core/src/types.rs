//! # Domain Types
//!
//! Core domain types used throughout Balcão POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Sale       │   │    SaleItem     │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  serial_imei    │   │  method         │       │
//! │  │  sale_number    │   │  sale_price     │   │  amount         │       │
//! │  │  status         │   │  cost           │   │  account_id     │       │
//! │  │  totals         │   │  quantity       │   │  installments   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TradeIn      │   │    Product      │   │  LedgerEntry    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  declared_value │   │  stock_quantity │   │  account_id     │       │
//! │  │  validated      │   │  sku            │   │  amount         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sale_number, sku, etc.) - human-readable, assigned in sequence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Sale Status
// =============================================================================

/// The lifecycle status of a sale record.
///
/// This is the *record* status, separate from the conferencing flow status
/// tracked by the overlay (see [`crate::flow::FlowStatus`]). A sale is never
/// hard-deleted: cancellation soft-deletes it with a stored reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale is live and flows through conferencing.
    Active,
    /// Sale was cancelled; inventory has been restored.
    Cancelled,
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Active
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Instant bank transfer (the dominant method in Brazilian retail).
    Pix,
    /// Physical cash payment.
    Cash,
    /// Card payment, optionally in installments.
    Card,
    /// Traditional bank transfer (TED/DOC).
    Transfer,
}

// =============================================================================
// Sale
// =============================================================================

/// A completed transaction record, created once at checkout.
///
/// Financial and status fields are mutated by subsequent workflow steps
/// (conferencing edits, cancellation); the record itself is never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// Sequential business number, assigned from the database.
    pub sale_number: i64,
    pub store_id: String,
    pub salesperson_id: String,
    pub customer_id: Option<String>,
    /// Denormalized contact fields, frozen at checkout.
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub status: SaleStatus,
    pub cancel_reason: Option<String>,
    /// Sum of line items (sale price × quantity), phones and devices.
    pub subtotal_centavos: i64,
    /// Sum of accessory line items.
    pub accessory_total_centavos: i64,
    /// Credit from trade-in devices, subtracted from the total.
    pub trade_in_total_centavos: i64,
    pub delivery_fee_centavos: i64,
    pub extended_warranty_fee_centavos: i64,
    pub total_centavos: i64,
    /// Aggregate cost of everything sold.
    pub total_cost_centavos: i64,
    pub profit_centavos: i64,
    /// Profit as a fraction of total, in basis points (3333 ≈ 33.33%).
    pub margin_bps: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_centavos(self.total_centavos)
    }

    /// Returns the profit as Money.
    #[inline]
    pub fn profit(&self) -> Money {
        Money::from_centavos(self.profit_centavos)
    }

    /// Checks whether the stored totals satisfy the sale arithmetic:
    ///
    /// ```text
    /// total  = subtotal + accessories - trade-ins + delivery + warranty
    /// profit = total - total_cost
    /// ```
    pub fn totals_consistent(&self) -> bool {
        let expected_total = self.subtotal_centavos + self.accessory_total_centavos
            - self.trade_in_total_centavos
            + self.delivery_fee_centavos
            + self.extended_warranty_fee_centavos;
        let expected_profit = self.total_centavos - self.total_cost_centavos;
        self.total_centavos == expected_total && self.profit_centavos == expected_profit
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Product description at time of sale (frozen).
    pub description: String,
    /// Serial number or IMEI of the specific unit sold.
    pub serial_imei: Option<String>,
    /// Recommended price at time of sale (frozen).
    pub list_price_centavos: i64,
    /// Price actually charged.
    pub sale_price_centavos: i64,
    /// Unit cost at time of sale (for profit calculation).
    pub cost_centavos: i64,
    pub quantity: i64,
    /// Accessory lines count towards the accessory total, not the subtotal.
    pub is_accessory: bool,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Line total actually charged (sale price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_centavos(self.sale_price_centavos).multiply_quantity(self.quantity)
    }

    /// Line cost (unit cost × quantity).
    #[inline]
    pub fn line_cost(&self) -> Money {
        Money::from_centavos(self.cost_centavos).multiply_quantity(self.quantity)
    }

    /// Discount granted against the recommended price, if any.
    pub fn discount(&self) -> Money {
        let list = Money::from_centavos(self.list_price_centavos);
        let sale = Money::from_centavos(self.sale_price_centavos);
        (list - sale).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Trade-In
// =============================================================================

/// A used device accepted as partial payment.
///
/// The declared value credits the sale total immediately; `validated` flips
/// to true once the device passes physical/IMEI inspection at the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TradeIn {
    pub id: String,
    pub sale_id: String,
    pub description: String,
    pub serial_imei: Option<String>,
    pub declared_value_centavos: i64,
    pub validated: bool,
    pub created_at: DateTime<Utc>,
}

impl TradeIn {
    /// Returns the declared value as Money.
    #[inline]
    pub fn declared_value(&self) -> Money {
        Money::from_centavos(self.declared_value_centavos)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards a sale.
/// A sale can have multiple payments for split tender scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    pub amount_centavos: i64,
    /// Destination account in the finance ledger.
    pub account_id: String,
    /// Installment count for card payments (1 = upfront).
    pub installments: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_centavos(self.amount_centavos)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in inventory, consumed by the sale store.
///
/// Creating a sale decrements `stock_quantity`; cancelling restores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    /// Stock Keeping Unit - business identifier.
    pub sku: String,
    pub name: String,
    pub price_centavos: i64,
    pub cost_centavos: i64,
    pub stock_quantity: i64,
    /// Whether product is active (soft delete).
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Direction of a stock movement.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Stock left the store with a sale.
    Outbound,
    /// Stock came back from a cancelled sale.
    Return,
}

/// An append-only record of inventory changing hands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    /// Sale that moved the stock; `None` for manual adjustments.
    pub sale_id: Option<String>,
    pub kind: MovementKind,
    /// Quantity moved; always positive, direction comes from `kind`.
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// A finance ledger entry, one per payment line of a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LedgerEntry {
    pub id: String,
    pub sale_id: String,
    pub account_id: String,
    pub method: PaymentMethod,
    pub amount_centavos: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Draft (input to the sale store)
// =============================================================================

/// A fully-formed sale draft handed to the sale store at checkout.
///
/// Totals arrive pre-computed by the caller; the store re-validates the
/// arithmetic before persisting (see [`crate::validation::validate_sale_draft`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleDraft {
    pub store_id: String,
    pub salesperson_id: String,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub items: Vec<DraftItem>,
    pub trade_ins: Vec<DraftTradeIn>,
    pub payments: Vec<DraftPayment>,
    pub delivery_fee_centavos: i64,
    pub extended_warranty_fee_centavos: i64,
    pub subtotal_centavos: i64,
    pub accessory_total_centavos: i64,
    pub trade_in_total_centavos: i64,
    pub total_centavos: i64,
    pub total_cost_centavos: i64,
    pub profit_centavos: i64,
    pub notes: Option<String>,
}

/// A line item inside a [`SaleDraft`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftItem {
    pub product_id: String,
    pub description: String,
    pub serial_imei: Option<String>,
    pub list_price_centavos: i64,
    pub sale_price_centavos: i64,
    pub cost_centavos: i64,
    pub quantity: i64,
    pub is_accessory: bool,
}

/// A trade-in device inside a [`SaleDraft`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftTradeIn {
    pub description: String,
    pub serial_imei: Option<String>,
    pub declared_value_centavos: i64,
    pub validated: bool,
}

/// A payment line inside a [`SaleDraft`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPayment {
    pub method: PaymentMethod,
    pub amount_centavos: i64,
    pub account_id: String,
    pub installments: Option<i64>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sale_with_totals(
        subtotal: i64,
        accessories: i64,
        trade_ins: i64,
        delivery: i64,
        warranty: i64,
        total: i64,
        cost: i64,
        profit: i64,
    ) -> Sale {
        Sale {
            id: "s1".to_string(),
            sale_number: 1,
            store_id: "matriz".to_string(),
            salesperson_id: "v1".to_string(),
            customer_id: None,
            customer_name: "Cliente".to_string(),
            customer_phone: None,
            status: SaleStatus::Active,
            cancel_reason: None,
            subtotal_centavos: subtotal,
            accessory_total_centavos: accessories,
            trade_in_total_centavos: trade_ins,
            delivery_fee_centavos: delivery,
            extended_warranty_fee_centavos: warranty,
            total_centavos: total,
            total_cost_centavos: cost,
            profit_centavos: profit,
            margin_bps: 0,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_sale_status_default() {
        assert_eq!(SaleStatus::default(), SaleStatus::Active);
    }

    #[test]
    fn test_totals_consistent() {
        // 15000 + 2000 - 3000 + 500 + 1000 = 15500; profit = 15500 - 10000
        let sale = sale_with_totals(15000, 2000, 3000, 500, 1000, 15500, 10000, 5500);
        assert!(sale.totals_consistent());
    }

    #[test]
    fn test_totals_inconsistent() {
        let sale = sale_with_totals(15000, 0, 0, 0, 0, 14000, 10000, 4000);
        assert!(!sale.totals_consistent());
    }

    #[test]
    fn test_sale_item_math() {
        let item = SaleItem {
            id: "i1".to_string(),
            sale_id: "s1".to_string(),
            product_id: "p1".to_string(),
            description: "iPhone 13 128GB".to_string(),
            serial_imei: Some("355000000000000".to_string()),
            list_price_centavos: 16000,
            sale_price_centavos: 15000,
            cost_centavos: 10000,
            quantity: 2,
            is_accessory: false,
            created_at: Utc::now(),
        };

        assert_eq!(item.line_total().centavos(), 30000);
        assert_eq!(item.line_cost().centavos(), 20000);
        assert_eq!(item.discount().centavos(), 2000);
    }
}
