//! # Workflow Error Types
//!
//! The error surface callers of [`crate::service::FlowService`] see.
//!
//! ## Wrapping
//! ```text
//! CoreError (transition table, validation, lock) ──┐
//!                                                  ├──▶ FlowError
//! DbError (storage, not-found, constraints) ───────┘
//! ```
//!
//! "Wrong status", "no such sale", and "write failed" are distinct
//! variants; callers never have to guess which one a failure was.

use thiserror::Error;

use balcao_core::CoreError;
use balcao_db::DbError;

/// Workflow operation errors.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Business rule failure: invalid transition, validation, edit lock.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure or missing row.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A registered edit touched a field outside the whitelist.
    ///
    /// Financial fields are immutable after creation; corrections go
    /// through cancel-and-recreate.
    #[error("Field '{field}' cannot be edited after creation")]
    UneditableField { field: String },

    /// CSV export could not be written.
    #[error("Export failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for workflow operations.
pub type FlowResult<T> = Result<T, FlowError>;
