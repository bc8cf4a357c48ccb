//! # Balcão POS Database Layer
//!
//! SQLite persistence for the back-office: sales, inventory, the finance
//! ledger, and the conferencing overlay with its timeline.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        balcao-db                                        │
//! │                                                                         │
//! │  ┌──────────────┐    ┌──────────────────────────────────────┐          │
//! │  │   Database   │───▶│           Repositories                │          │
//! │  │  (pool.rs)   │    │  sales() flow() products() ledger()  │          │
//! │  └──────┬───────┘    └──────────────────────────────────────┘          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────┐    ┌──────────────┐                                  │
//! │  │  Migrations  │    │    SQLite    │  WAL mode, foreign keys on       │
//! │  │  (embedded)  │───▶│   (file or   │                                  │
//! │  └──────────────┘    │   :memory:)  │                                  │
//! │                      └──────────────┘                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use balcao_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./balcao.db")).await?;
//! let sale = db.sales().create(&draft).await?;
//! let overlay = db.flow().get_overlay(&sale.id).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{
    AccountBalance, FlowRepository, LedgerRepository, NewProduct, ProductRepository,
    SaleFlowSummary, SaleRepository, EDITABLE_SALE_FIELDS,
};
