//! # Error Types
//!
//! Domain-specific error types for fieldpos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          Error Types                                 │
//! │                                                                      │
//! │  fieldpos-core errors (this file)                                    │
//! │  ├── StockError       - Stock ledger and lifecycle violations        │
//! │  └── ValidationError  - Input validation failures                    │
//! │                                                                      │
//! │  fieldpos-db errors (separate crate)                                 │
//! │  └── DbError          - Infrastructure failures, wraps StockError    │
//! │                                                                      │
//! │  Flow: ValidationError → StockError → DbError → caller               │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (name, available, requested, ...)
//! 3. Errors are enum variants, never String
//! 4. Every domain error is detected before any mutation commits

use rust_decimal::Decimal;
use thiserror::Error;

// =============================================================================
// Stock Error
// =============================================================================

/// Stock ledger and reservation lifecycle errors.
///
/// These represent precondition violations; an operation returning one of
/// these has committed nothing.
#[derive(Debug, Error)]
pub enum StockError {
    /// Quantity is zero, negative, or otherwise malformed.
    #[error("Invalid quantity for {subject}: {quantity}")]
    InvalidQuantity { subject: String, quantity: Decimal },

    /// A debit would exceed the current balance.
    ///
    /// ## When This Occurs
    /// - Production requests more of a material than is on hand
    /// - A pickup reserves more product than is stocked
    /// - Two concurrent debits race and the loser finds the balance drained
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        name: String,
        available: Decimal,
        requested: Decimal,
    },

    /// Referenced material/product/cart/pickup/sale does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Material/product name collision on create.
    #[error("{entity} name '{name}' already exists")]
    DuplicateName { entity: String, name: String },

    /// A material's unit is not in the fixed enumeration.
    #[error("Unknown stock unit: '{unit}'")]
    UnknownUnit { unit: String },

    /// A return was attempted while the user has no active pickups.
    #[error("No active reservation for user {user_id}")]
    NoActiveReservation { user_id: String },

    /// A return line exceeds what was taken across the user's active pickups.
    #[error("Return of {requested} {name} exceeds the {max_returnable} taken")]
    ExcessiveReturn {
        name: String,
        max_returnable: Decimal,
        requested: Decimal,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when a typed request doesn't meet requirements. They are
/// raised by [`crate::validation`] before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., malformed decimal).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with StockError.
pub type StockResult<T> = Result<T, StockError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_messages() {
        let err = StockError::InsufficientStock {
            name: "Milk".to_string(),
            available: dec!(0.5),
            requested: dec!(2),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Milk: available 0.5, requested 2"
        );

        let err = StockError::ExcessiveReturn {
            name: "Iced Coffee".to_string(),
            max_returnable: dec!(10),
            requested: dec!(11),
        };
        assert_eq!(
            err.to_string(),
            "Return of 11 Iced Coffee exceeds the 10 taken"
        );
    }

    #[test]
    fn test_validation_converts_to_stock_error() {
        let validation_err = ValidationError::Required {
            field: "expense_note".to_string(),
        };
        let err: StockError = validation_err.into();
        assert!(matches!(err, StockError::Validation(_)));
    }
}
