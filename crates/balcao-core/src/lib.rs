//! # balcao-core: Pure Business Logic for Balcão POS
//!
//! This crate is the **heart** of Balcão POS. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Balcão POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    balcao-flow (Service Layer)                  │   │
//! │  │    submit_entry, approve_by_manager, finalize, CSV export      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ balcao-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   flow    │  │ validation│  │   │
//! │  │   │   Sale    │  │   Money   │  │ FlowStatus│  │   rules   │  │   │
//! │  │   │  Payment  │  │  margin   │  │ Transition│  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    balcao-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Sale, SaleItem, TradeIn, Payment, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`flow`] - The conferencing state machine and timeline types
//! - [`error`] - Domain error types
//! - [`validation`] - Sale draft validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in centavos (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings, nulls, or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use balcao_core::flow::{FlowStatus, FlowTransition};
//!
//! // Legality lives in one transition table
//! let next = FlowTransition::SubmitEntry
//!     .apply(FlowStatus::AwaitingReview)
//!     .unwrap();
//! assert_eq!(next, FlowStatus::ManagerReview);
//!
//! // Wrong pre-state is a typed error, not a silent null
//! assert!(FlowTransition::Finalize.apply(next).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod flow;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use balcao_core::Money` instead of
// `use balcao_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use flow::{
    transition_description, EventKind, FieldChange, FlowOverlay, FlowStatus, FlowTransition,
    Receipt, TimelineEntry,
};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single sale
///
/// ## Business Reason
/// Prevents runaway drafts and ensures reasonable transaction sizes.
/// Can be made configurable per-store in future versions.
pub const MAX_SALE_ITEMS: usize = 100;
