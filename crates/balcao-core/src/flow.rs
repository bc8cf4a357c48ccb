//! # Conferencing Flow State Machine
//!
//! The sales approval workflow, expressed as a finite state machine with a
//! single transition table. Every legality check in the system goes through
//! [`FlowTransition::apply`]; there are no ad hoc status guards anywhere else.
//!
//! ## State Diagram
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Sales Conferencing Flow                             │
//! │                                                                         │
//! │   AwaitingReview                                                        │
//! │        │ SubmitEntry                                                    │
//! │        ▼                                                                │
//! │   ManagerReview ──RejectByManager──► ManagerRejected                   │
//! │        │                                  │                             │
//! │        │ ApproveByManager                 │ SubmitEntry (fix-up loop)   │
//! │        ▼                                  ▼                             │
//! │   FinanceReview ──ReturnByFinance──► FinanceReturned                   │
//! │        │                                  │                             │
//! │        │ Finalize                         │ SubmitEntry (bounce-back)   │
//! │        ▼                                  ▼                             │
//! │   Finalized (terminal, locks edits)  ManagerReview                     │
//! │                                                                         │
//! │   Cancel: any non-terminal state ──► Cancelled (terminal)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why a Table Instead of Per-Function Guards
//! The pre-state sets and targets are one exhaustive `match`, so adding a
//! status without updating the table is a compile error, and legality never
//! lives in more than one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Flow Status
// =============================================================================

/// The conferencing stage of a sale as it passes through vendor, manager,
/// and finance review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    /// Sale entered by the vendor, waiting for submission into review.
    AwaitingReview,
    /// Under manager conferencing.
    ManagerReview,
    /// Manager rejected the entry; vendor must fix and resubmit.
    ManagerRejected,
    /// Under finance conferencing.
    FinanceReview,
    /// Finance bounced the sale back for another manager pass.
    FinanceReturned,
    /// Fully conferred; the overlay is locked against edits.
    Finalized,
    /// Sale was cancelled.
    Cancelled,
}

impl FlowStatus {
    /// Terminal states accept no further transitions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, FlowStatus::Finalized | FlowStatus::Cancelled)
    }

    /// Human-readable label used in timeline descriptions and CSV export.
    pub const fn label(&self) -> &'static str {
        match self {
            FlowStatus::AwaitingReview => "Awaiting review",
            FlowStatus::ManagerReview => "Manager review",
            FlowStatus::ManagerRejected => "Rejected by manager",
            FlowStatus::FinanceReview => "Finance review",
            FlowStatus::FinanceReturned => "Returned by finance",
            FlowStatus::Finalized => "Finalized",
            FlowStatus::Cancelled => "Cancelled",
        }
    }
}

impl Default for FlowStatus {
    fn default() -> Self {
        FlowStatus::AwaitingReview
    }
}

// =============================================================================
// Flow Transition
// =============================================================================

/// The transitions of the conferencing workflow, one per reviewer action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowTransition {
    /// Vendor submits (or resubmits) the entry for manager review.
    SubmitEntry,
    /// Manager rejects the entry back to the vendor.
    RejectByManager,
    /// Manager approves; the sale moves to finance.
    ApproveByManager,
    /// Finance returns the sale for another manager pass.
    ReturnByFinance,
    /// Finance finalizes the sale and locks the overlay.
    Finalize,
    /// Sale is cancelled from any non-terminal state.
    Cancel,
}

impl FlowTransition {
    /// The status this transition lands on.
    pub const fn target(&self) -> FlowStatus {
        match self {
            FlowTransition::SubmitEntry => FlowStatus::ManagerReview,
            FlowTransition::RejectByManager => FlowStatus::ManagerRejected,
            FlowTransition::ApproveByManager => FlowStatus::FinanceReview,
            FlowTransition::ReturnByFinance => FlowStatus::FinanceReturned,
            FlowTransition::Finalize => FlowStatus::Finalized,
            FlowTransition::Cancel => FlowStatus::Cancelled,
        }
    }

    /// Whether this transition may be applied from `current`.
    ///
    /// This is THE transition table. Every status must be handled; the
    /// compiler rejects a new status that isn't accounted for here.
    pub const fn accepts(&self, current: FlowStatus) -> bool {
        match self {
            FlowTransition::SubmitEntry => matches!(
                current,
                FlowStatus::AwaitingReview
                    | FlowStatus::ManagerRejected
                    | FlowStatus::FinanceReturned
            ),
            FlowTransition::RejectByManager => matches!(current, FlowStatus::ManagerReview),
            FlowTransition::ApproveByManager => matches!(current, FlowStatus::ManagerReview),
            FlowTransition::ReturnByFinance => matches!(current, FlowStatus::FinanceReview),
            FlowTransition::Finalize => matches!(current, FlowStatus::FinanceReview),
            FlowTransition::Cancel => !current.is_terminal(),
        }
    }

    /// Applies the transition to `current`, returning the next status.
    ///
    /// ## Errors
    /// [`CoreError::InvalidTransition`] when `current` is outside the
    /// accepted pre-state set. Nothing else can fail.
    pub fn apply(&self, current: FlowStatus) -> CoreResult<FlowStatus> {
        if !self.accepts(current) {
            return Err(CoreError::InvalidTransition {
                current,
                attempted: *self,
            });
        }
        Ok(self.target())
    }

    /// The timeline event kind recorded when this transition runs.
    pub const fn event_kind(&self) -> EventKind {
        match self {
            FlowTransition::SubmitEntry => EventKind::Submitted,
            FlowTransition::RejectByManager => EventKind::ManagerRejected,
            FlowTransition::ApproveByManager => EventKind::ManagerApproved,
            FlowTransition::ReturnByFinance => EventKind::FinanceReturned,
            FlowTransition::Finalize => EventKind::Finalized,
            FlowTransition::Cancel => EventKind::Cancelled,
        }
    }
}

// =============================================================================
// Receipts
// =============================================================================

/// A record of who performed a workflow action, when, and why.
///
/// Attached to the overlay for the most recent approval and rejection,
/// and embedded into every timeline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub actor_id: String,
    pub actor_name: String,
    pub at: DateTime<Utc>,
    /// Required for rejections/returns, absent for approvals.
    pub reason: Option<String>,
}

impl Receipt {
    /// Creates a receipt stamped with the current time.
    pub fn now(actor_id: impl Into<String>, actor_name: impl Into<String>) -> Self {
        Receipt {
            actor_id: actor_id.into(),
            actor_name: actor_name.into(),
            at: Utc::now(),
            reason: None,
        }
    }

    /// Attaches a reason (for rejections and returns).
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

// =============================================================================
// Timeline
// =============================================================================

/// Kind of event recorded in a sale's timeline.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Overlay created alongside the sale.
    Created,
    /// Entry submitted (or resubmitted) for manager review.
    Submitted,
    ManagerApproved,
    ManagerRejected,
    FinanceReturned,
    Finalized,
    Cancelled,
    /// A content edit was registered against the sale.
    Edited,
}

/// One field of a registered edit: what changed, from what, to what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: String,
    pub after: String,
}

impl FieldChange {
    /// Renders the change as `field: "before" → "after"` for descriptions.
    pub fn describe(&self) -> String {
        format!("{}: \"{}\" → \"{}\"", self.field, self.before, self.after)
    }
}

/// An entry in a sale's append-only timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    pub actor_id: String,
    pub actor_name: String,
    pub description: String,
    /// Present only for [`EventKind::Edited`] entries.
    pub changes: Vec<FieldChange>,
}

/// Builds the human-readable description recorded for a transition.
pub fn transition_description(transition: FlowTransition, receipt: &Receipt) -> String {
    let base = match transition {
        FlowTransition::SubmitEntry => {
            format!("Entry submitted for manager review by {}", receipt.actor_name)
        }
        FlowTransition::RejectByManager => {
            format!("Entry rejected by manager {}", receipt.actor_name)
        }
        FlowTransition::ApproveByManager => {
            format!("Approved by manager {}, sent to finance", receipt.actor_name)
        }
        FlowTransition::ReturnByFinance => {
            format!("Returned by finance reviewer {}", receipt.actor_name)
        }
        FlowTransition::Finalize => format!("Finalized by {}", receipt.actor_name),
        FlowTransition::Cancel => format!("Cancelled by {}", receipt.actor_name),
    };
    match &receipt.reason {
        Some(reason) => format!("{base}: {reason}"),
        None => base,
    }
}

// =============================================================================
// Flow Overlay
// =============================================================================

/// Per-sale workflow record, held separately from the sale itself so that
/// sale data and process metadata can evolve independently.
///
/// ## Invariant
/// Once `locked` is true (set at finalize), no further content edits are
/// accepted. The state is terminal, so further transitions are rejected by
/// the table as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowOverlay {
    pub sale_id: String,
    pub status: FlowStatus,
    /// Most recent approval (manager or finance).
    pub approval: Option<Receipt>,
    /// Most recent rejection or return.
    pub rejection: Option<Receipt>,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowOverlay {
    /// Creates a fresh overlay for a newly submitted sale.
    pub fn new(sale_id: impl Into<String>) -> Self {
        let now = Utc::now();
        FlowOverlay {
            sale_id: sale_id.into(),
            status: FlowStatus::AwaitingReview,
            approval: None,
            rejection: None,
            locked: false,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
