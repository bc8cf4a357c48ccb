//! # balcao-flow: Sales Conferencing Workflow
//!
//! The service layer of Balcão POS: sale entry, the manager/finance
//! conferencing workflow, edit registration, notifications, reporting
//! projections, and CSV export.
//!
//! ## Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Sales Conferencing Workflow                           │
//! │                                                                         │
//! │  vendor                manager                finance                   │
//! │    │                      │                      │                      │
//! │  create_sale              │                      │                      │
//! │  submit_entry ──────────▶ │                      │                      │
//! │    ▲            reject_by_manager                │                      │
//! │    └──────────────────────┤                      │                      │
//! │                 approve_by_manager ────────────▶ │                      │
//! │    ▲                      ▲            return_by_finance                │
//! │    └──(resubmit)──────────┴──────────────────────┤                      │
//! │                                               finalize  ──▶ locked      │
//! │                                                                         │
//! │  cancel: any non-terminal state, restores stock exactly once           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use balcao_db::{Database, DbConfig};
//! use balcao_flow::FlowService;
//!
//! let db = Database::new(DbConfig::new("./balcao.db")).await?;
//! let service = FlowService::new(db);
//!
//! let sale = service.create_sale(&draft, "v1", "Pedro").await?;
//! service.submit_entry(&sale.id, "v1", "Pedro").await?;
//! service.approve_by_manager(&sale.id, "g1", "Marina").await?;
//! service.finalize(&sale.id, "f1", "Carlos").await?;
//! ```

pub mod csv;
pub mod error;
pub mod notify;
pub mod report;
pub mod service;

pub use error::{FlowError, FlowResult};
pub use notify::{FlowNotification, NotificationHub};
pub use report::{format_margin, status_badge, ReportRow};
pub use service::FlowService;
