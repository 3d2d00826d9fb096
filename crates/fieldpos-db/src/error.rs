//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                       Error Propagation                              │
//! │                                                                      │
//! │  Domain check (fieldpos_core::StockError)                            │
//! │       │                              SQLite Error (sqlx::Error)      │
//! │       │                                   │                          │
//! │       ▼                                   ▼                          │
//! │  DbError::Stock ◄──────────────── DbError (infrastructure)           │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  Caller (routing layer) maps to a user-visible response;             │
//! │  infrastructure conflicts may be retried by the caller, domain       │
//! │  errors must not be.                                                 │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error is raised before the atomic unit commits: a returned
//! `DbError` always means zero side effects.

use thiserror::Error;

use fieldpos_core::StockError;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Domain precondition violation (insufficient stock, unknown entity,
    /// excessive return, ...). Not retryable.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The atomic unit was aborted by the store (conflict, timeout).
    /// Retryable by the caller; nothing was committed.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A persisted value failed to decode (malformed decimal, unit, ...).
    #[error("Corrupt {field} in {entity} {id}: {value}")]
    Corrupt {
        entity: String,
        id: String,
        field: String,
        value: String,
    },

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Shorthand for a domain NotFound.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::Stock(StockError::NotFound {
            entity: entity.into(),
            id: id.into(),
        })
    }

    /// Whether the caller may safely resubmit the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::TransactionAborted(_) | DbError::PoolExhausted
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database (busy/locked)  → DbError::TransactionAborted
/// sqlx::Error::Database (other)        → DbError::QueryFailed
/// sqlx::Error::PoolTimedOut            → DbError::PoolExhausted
/// Other                                → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                // SQLITE_BUSY / SQLITE_LOCKED surface as lock conflicts;
                // the atomic unit has been rolled back and may be retried.
                if msg.contains("database is locked") || msg.contains("database table is locked") {
                    DbError::TransactionAborted(msg)
                } else {
                    DbError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_are_not_retryable() {
        let err = DbError::not_found("Material", "m1");
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Material not found: m1");
    }

    #[test]
    fn test_aborted_transactions_are_retryable() {
        let err = DbError::TransactionAborted("database is locked".to_string());
        assert!(err.is_retryable());
    }
}
