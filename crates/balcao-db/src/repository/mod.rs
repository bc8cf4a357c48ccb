//! # Repository Layer
//!
//! One repository per aggregate, each holding a pool handle.
//!
//! Repositories are deliberately "dumb": they persist and read, enforcing
//! only storage invariants (atomicity, referential integrity, idempotent
//! cancel). Workflow legality (which transition is allowed from which
//! status, who may edit what) lives in balcao-flow on top of the core
//! transition table.

pub mod flow;
pub mod ledger;
pub mod product;
pub mod sale;

pub use flow::{FlowRepository, SaleFlowSummary, EDITABLE_SALE_FIELDS};
pub use ledger::{AccountBalance, LedgerRepository};
pub use product::{NewProduct, ProductRepository};
pub use sale::SaleRepository;
