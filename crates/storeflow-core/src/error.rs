//! Domain error types.
//!
//! Two layers: [`ValidationError`] for malformed caller input, caught before
//! any business logic runs, and [`CoreError`] for business rule violations.
//! Validation errors fold into `CoreError::Validation` via `#[from]`, and the
//! persistence crate carries `CoreError` transparently, so a caller always
//! sees one typed failure per operation. Nothing is retried or clamped
//! silently; the caller decides what a failure means.

use thiserror::Error;

/// Business rule violations. Each variant carries enough context to log or
/// surface without another lookup.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A subtraction would drive stock negative under an enforcing policy:
    /// overselling, transferring more than the source holds, or a subtract
    /// adjustment below zero.
    #[error("Insufficient stock for {sku}: {available} on hand, {requested} requested")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// The entity's current status forbids the operation, such as closing an
    /// already-closed cash session or adding a transaction to one.
    #[error("{entity} {id} is {status}, cannot {action}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        status: String,
        action: &'static str,
    },

    /// The register or the user already holds an open cash session. At most
    /// one open session per register and per user, system-wide.
    #[error("Conflicting cash session: {reason}")]
    ConflictingSession { reason: String },

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Malformed input, rejected before any state is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },

    /// Signed deltas may be negative but never zero.
    #[error("{field} must be nonzero")]
    MustBeNonZero { field: &'static str },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },

    /// Two arguments that must differ carry the same value, such as the
    /// source and destination warehouses of a transfer.
    #[error("{field_a} and {field_b} must differ")]
    MustDiffer {
        field_a: &'static str,
        field_b: &'static str,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_carries_context() {
        let err = CoreError::InsufficientStock {
            sku: "COLA-500".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for COLA-500: 3 on hand, 5 requested"
        );
    }

    #[test]
    fn invalid_transition_names_the_action() {
        let err = CoreError::InvalidTransition {
            entity: "Cash session",
            id: "abc".to_string(),
            status: "closed".to_string(),
            action: "add transaction",
        };
        assert_eq!(
            err.to_string(),
            "Cash session abc is closed, cannot add transaction"
        );
    }

    #[test]
    fn validation_folds_into_core() {
        let err: CoreError = ValidationError::MustBeNonZero { field: "quantity" }.into();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
