//! # Error Types
//!
//! Domain-specific error types for balcao-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  balcao-core errors (this file)                                        │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  balcao-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  balcao-flow errors (separate crate)                                   │
//! │  └── FlowError        - Workflow failures (wraps the two above)        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → FlowError → Caller      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (sale ID, status, etc.)
//! 3. Errors are enum variants, never String
//! 4. A failed precondition is distinguishable from a missing entity

use thiserror::Error;

use crate::flow::{FlowStatus, FlowTransition};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A workflow transition was attempted from a status outside its
    /// accepted pre-state set.
    ///
    /// ## When This Occurs
    /// - Calling `approve_by_manager` on a sale still awaiting review
    /// - Calling `submit_entry` twice in a row
    /// - Any transition against a terminal status
    ///
    /// The transition leaves the overlay untouched; the caller gets the
    /// current status and the attempted transition for display.
    #[error("Cannot apply {attempted:?}: sale is {current:?}")]
    InvalidTransition {
        current: FlowStatus,
        attempted: FlowTransition,
    },

    /// The overlay is locked against content edits (set at finalize).
    #[error("Sale {sale_id} is locked for editing")]
    Locked { sale_id: String },

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when a sale draft or edit request doesn't meet
/// requirements. Used for early validation before anything is persisted.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID, invalid IMEI).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The draft's stored totals disagree with the sale arithmetic.
    ///
    /// ## Invariant
    /// ```text
    /// total  = subtotal + accessories - trade-ins + delivery + warranty
    /// profit = total - total_cost
    /// ```
    #[error("{field} is inconsistent: expected {expected} centavos, got {actual}")]
    InconsistentTotals {
        field: String,
        expected: i64,
        actual: i64,
    },

    /// Payments don't cover the sale total.
    #[error("Payments sum to {paid} centavos but the total is {total}")]
    PaymentMismatch { paid: i64, total: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = CoreError::InvalidTransition {
            current: FlowStatus::AwaitingReview,
            attempted: FlowTransition::ApproveByManager,
        };
        assert_eq!(
            err.to_string(),
            "Cannot apply ApproveByManager: sale is AwaitingReview"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "customer_name".to_string(),
        };
        assert_eq!(err.to_string(), "customer_name is required");

        let err = ValidationError::PaymentMismatch {
            paid: 10000,
            total: 15000,
        };
        assert_eq!(
            err.to_string(),
            "Payments sum to 10000 centavos but the total is 15000"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "store_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
