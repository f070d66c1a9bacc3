//! Input validation, applied before any business logic runs.
//!
//! These checks sit between type-level validation at the caller and the
//! database's own constraints (NOT NULL, UNIQUE, foreign keys). Anything
//! rejected here never opens a transaction.

use crate::error::ValidationError;
use crate::types::{Discount, DiscountType};
use crate::MAX_DOCUMENT_ITEMS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Quantity & Amount Validators
// =============================================================================

/// Validates a quantity that must be strictly positive
/// (line items, transfers, adjustments).
pub fn validate_positive_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive { field: "quantity" });
    }
    Ok(())
}

/// Validates a session opening amount (zero is a legal empty drawer).
pub fn validate_opening_amount(amount_cents: i64) -> ValidationResult<()> {
    if amount_cents < 0 {
        return Err(ValidationError::MustBePositive {
            field: "opening_amount",
        });
    }
    Ok(())
}

/// Validates the number of line items on a document.
pub fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required { field: "items" });
    }
    if count > MAX_DOCUMENT_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items",
            min: 1,
            max: MAX_DOCUMENT_ITEMS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Discount Validators
// =============================================================================

/// Validates a discount definition before persistence.
///
/// ## Rules
/// - `name` must not be empty
/// - `percentage`: value in (0, 10000] basis points
/// - `fixed`: value must be positive cents
/// - `buy_x_get_y`: both `buy_qty` and `get_qty` must be present and positive
pub fn validate_discount(discount: &Discount) -> ValidationResult<()> {
    if discount.name.trim().is_empty() {
        return Err(ValidationError::Required { field: "name" });
    }

    match discount.discount_type {
        DiscountType::Percentage => {
            if discount.value <= 0 || discount.value > 10_000 {
                return Err(ValidationError::OutOfRange {
                    field: "value",
                    min: 1,
                    max: 10_000,
                });
            }
        }
        DiscountType::Fixed => {
            if discount.value <= 0 {
                return Err(ValidationError::MustBePositive { field: "value" });
            }
        }
        DiscountType::BuyXGetY => {
            match (discount.buy_qty, discount.get_qty) {
                (Some(buy), Some(get)) if buy > 0 && get > 0 => {}
                (None, _) | (Some(_), None) => {
                    return Err(ValidationError::Required { field: "buy_qty/get_qty" });
                }
                _ => {
                    return Err(ValidationError::MustBePositive {
                        field: "buy_qty/get_qty",
                    });
                }
            }
        }
    }

    if let Some(cap) = discount.max_discount_amount_cents {
        if cap <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "max_discount_amount",
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
