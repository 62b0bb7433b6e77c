//! # Error Taxonomy
//!
//! pimdb reports failures through `eyre::Result`, but every failure mode a
//! caller might want to react to programmatically is a distinct `DbError`
//! variant wrapped into the report. Callers match with
//! `report.downcast_ref::<DbError>()`.
//!
//! ## Categories
//!
//! - **Schema errors**: raised synchronously by the call that violates a
//!   schema invariant; always recoverable, never corrupt state.
//! - **Structural corruption**: bad magic, truncated file, CRC mismatch,
//!   index entry pointing at a dead record. Detected by load/check paths so
//!   callers can trigger a rebuild instead of crashing.
//! - **Locking**: a second open of the same physical database fails fast
//!   rather than corrupting files.
//! - **Misuse**: operating on records or result sets after shutdown, or
//!   double-deleting a record. These fail loudly; silent success would mask
//!   data loss.
//!
//! Plain I/O errors propagate as `std::io::Error` inside eyre reports with
//! `wrap_err` context and are never retried internally.

use crate::types::ColumnType;
use std::path::PathBuf;
use thiserror::Error;

/// Typed engine error. One variant per matchable failure mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    #[error("table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("column '{column}' already exists in table '{table}'")]
    ColumnAlreadyExists { table: String, column: String },

    #[error("table '{0}' does not exist")]
    TableDoesNotExist(String),

    #[error("column '{column}' does not exist in table '{table}'")]
    ColumnDoesNotExist { table: String, column: String },

    #[error("an index over {columns:?} already exists on table '{table}'")]
    IndexAlreadyExists { table: String, columns: Vec<String> },

    #[error("no index over {columns:?} on table '{table}'")]
    IndexDoesNotExist { table: String, columns: Vec<String> },

    #[error("structural corruption: {0}")]
    Corruption(String),

    #[error("database at '{0}' is locked by another instance")]
    DatabaseLocked(PathBuf),

    #[error("database has been shut down")]
    DatabaseClosed,

    #[error("record {0} was already deleted")]
    RecordAlreadyDeleted(u64),

    #[error("record {0} has not been committed")]
    RecordNotCommitted(u64),

    #[error("column '{column}' holds {expected}, got {got}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        got: ColumnType,
    },

    #[error("result set has been disposed")]
    ResultSetDisposed,
}

impl DbError {
    /// Builds a corruption error with formatted detail.
    pub fn corruption(detail: impl Into<String>) -> Self {
        DbError::Corruption(detail.into())
    }

    /// Returns true for schema-invariant violations.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            DbError::TableAlreadyExists(_)
                | DbError::ColumnAlreadyExists { .. }
                | DbError::TableDoesNotExist(_)
                | DbError::ColumnDoesNotExist { .. }
                | DbError::IndexAlreadyExists { .. }
                | DbError::IndexDoesNotExist { .. }
        )
    }
}
