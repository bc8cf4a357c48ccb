//! # Validation Module
//!
//! Sale draft validation for Balcão POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (checkout screen / import job)                        │
//! │  ├── Computes totals, assembles the draft                              │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before anything is persisted)                   │
//! │  ├── Required fields                                                   │
//! │  ├── Totals arithmetic re-checked                                      │
//! │  └── Payments must cover the total                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE constraints                                     │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: Multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals arrive pre-computed by the caller and are re-derived here: a draft
//! whose stored totals disagree with its declared components is rejected
//! before anything reaches the store.

use crate::error::ValidationError;
use crate::types::SaleDraft;
use crate::MAX_SALE_ITEMS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a customer name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 200 characters
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "customer_name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "customer_name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a serial/IMEI string.
///
/// ## Rules
/// - IMEI is 15 digits; plain serials are free-form up to 50 characters
/// - All-digit values of the wrong length are treated as malformed IMEIs
///
/// ## Example
/// ```rust
/// use balcao_core::validation::validate_serial_imei;
///
/// assert!(validate_serial_imei("355608081234567").is_ok());
/// assert!(validate_serial_imei("SN-ABC-001").is_ok());
/// assert!(validate_serial_imei("12345").is_err()); // digit-only, wrong length
/// ```
pub fn validate_serial_imei(serial: &str) -> ValidationResult<()> {
    let serial = serial.trim();

    if serial.is_empty() {
        return Err(ValidationError::Required {
            field: "serial_imei".to_string(),
        });
    }

    if serial.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "serial_imei".to_string(),
            max: 50,
        });
    }

    if serial.chars().all(|c| c.is_ascii_digit()) && serial.len() != 15 {
        return Err(ValidationError::InvalidFormat {
            field: "serial_imei".to_string(),
            reason: "numeric IMEI must be exactly 15 digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a monetary amount that must not be negative.
///
/// Zero is allowed (free accessories, waived fees).
pub fn validate_non_negative(field: &str, centavos: i64) -> ValidationResult<()> {
    if centavos < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a payment amount in centavos.
///
/// ## Rules
/// - Must be positive (> 0); zero or negative payment lines are rejected
pub fn validate_payment_amount(centavos: i64) -> ValidationResult<()> {
    if centavos <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Draft Validator
// =============================================================================

/// Validates a full sale draft before it reaches the store.
///
/// ## What Is Checked
/// 1. Required fields (store, salesperson, customer name)
/// 2. At least one line item, at most [`MAX_SALE_ITEMS`]
/// 3. Per-line quantities and non-negative prices/costs
/// 4. The totals invariant:
///    `total = subtotal + accessories - trade-ins + delivery + warranty`
///    and `profit = total - total_cost`
/// 5. Payment lines sum exactly to the total
///
/// ## User Workflow
/// ```text
/// Checkout completes ──► SaleDraft assembled by caller
///      │
///      ▼
/// validate_sale_draft(&draft) ← THIS FUNCTION
///      │
///      ├── inconsistent totals? → ValidationError::InconsistentTotals
///      ├── payments short/over? → ValidationError::PaymentMismatch
///      │
///      └── OK → SaleRepository::create persists everything
/// ```
pub fn validate_sale_draft(draft: &SaleDraft) -> ValidationResult<()> {
    if draft.store_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "store_id".to_string(),
        });
    }
    if draft.salesperson_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "salesperson_id".to_string(),
        });
    }
    validate_customer_name(&draft.customer_name)?;

    if draft.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if draft.items.len() > MAX_SALE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_SALE_ITEMS as i64,
        });
    }

    for item in &draft.items {
        validate_quantity(item.quantity)?;
        validate_non_negative("sale_price", item.sale_price_centavos)?;
        validate_non_negative("cost", item.cost_centavos)?;
        if let Some(serial) = &item.serial_imei {
            validate_serial_imei(serial)?;
        }
    }

    for trade_in in &draft.trade_ins {
        validate_non_negative("declared_value", trade_in.declared_value_centavos)?;
        if let Some(serial) = &trade_in.serial_imei {
            validate_serial_imei(serial)?;
        }
    }

    validate_non_negative("delivery_fee", draft.delivery_fee_centavos)?;
    validate_non_negative(
        "extended_warranty_fee",
        draft.extended_warranty_fee_centavos,
    )?;

    // Totals invariant: re-derive from the declared components
    let expected_total = draft.subtotal_centavos + draft.accessory_total_centavos
        - draft.trade_in_total_centavos
        + draft.delivery_fee_centavos
        + draft.extended_warranty_fee_centavos;
    if draft.total_centavos != expected_total {
        return Err(ValidationError::InconsistentTotals {
            field: "total".to_string(),
            expected: expected_total,
            actual: draft.total_centavos,
        });
    }

    let expected_profit = draft.total_centavos - draft.total_cost_centavos;
    if draft.profit_centavos != expected_profit {
        return Err(ValidationError::InconsistentTotals {
            field: "profit".to_string(),
            expected: expected_profit,
            actual: draft.profit_centavos,
        });
    }

    // Payments must cover the total exactly (trade-in credit already
    // reduced it; split tender is allowed)
    let mut paid = 0i64;
    for payment in &draft.payments {
        validate_payment_amount(payment.amount_centavos)?;
        if payment.account_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "payment account_id".to_string(),
            });
        }
        paid += payment.amount_centavos;
    }
    if paid != draft.total_centavos {
        return Err(ValidationError::PaymentMismatch {
            paid,
            total: draft.total_centavos,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DraftItem, DraftPayment, PaymentMethod};

    fn simple_draft() -> SaleDraft {
        // One phone: cost R$ 100,00, sold for R$ 150,00, paid via Pix
        SaleDraft {
            store_id: "matriz".to_string(),
            salesperson_id: "v1".to_string(),
            customer_id: None,
            customer_name: "João Silva".to_string(),
            customer_phone: None,
            items: vec![DraftItem {
                product_id: "p1".to_string(),
                description: "Smartphone".to_string(),
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
        }
    }

    #[test]
    fn test_valid_draft() {
        assert!(validate_sale_draft(&simple_draft()).is_ok());
    }

    #[test]
    fn test_inconsistent_total_rejected() {
        let mut draft = simple_draft();
        draft.total_centavos = 14000;
        draft.profit_centavos = 4000;
        draft.payments[0].amount_centavos = 14000;

        let err = validate_sale_draft(&draft).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InconsistentTotals { ref field, .. } if field == "total"
        ));
    }

    #[test]
    fn test_inconsistent_profit_rejected() {
        let mut draft = simple_draft();
        draft.profit_centavos = 9999;

        let err = validate_sale_draft(&draft).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InconsistentTotals { ref field, .. } if field == "profit"
        ));
    }

    #[test]
    fn test_payment_shortfall_rejected() {
        let mut draft = simple_draft();
        draft.payments[0].amount_centavos = 10000;

        let err = validate_sale_draft(&draft).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::PaymentMismatch {
                paid: 10000,
                total: 15000
            }
        ));
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut draft = simple_draft();
        draft.items.clear();
        assert!(validate_sale_draft(&draft).is_err());
    }

    #[test]
    fn test_validate_serial_imei() {
        assert!(validate_serial_imei("355608081234567").is_ok());
        assert!(validate_serial_imei("SN-ABC-001").is_ok());
        assert!(validate_serial_imei("").is_err());
        assert!(validate_serial_imei("12345").is_err());
        assert!(validate_serial_imei(&"9".repeat(60)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
    }

    #[test]
    fn test_validate_customer_name() {
        assert!(validate_customer_name("Maria").is_ok());
        assert!(validate_customer_name("").is_err());
        assert!(validate_customer_name(&"A".repeat(300)).is_err());
    }
}
