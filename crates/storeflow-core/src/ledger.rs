//! # Ledger Math
//!
//! Pure stock-quantity delta math. The database layer owns the reads and
//! writes; every quantity decision is made here so the rules are testable
//! without a database.
//!
//! ## The Delta Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Four event sources, one accumulator                        │
//! │                                                                         │
//! │  purchase received    ──►  +qty per line item                           │
//! │  sale completed       ──►  −qty per line item                           │
//! │  adjustment add/sub   ──►  ±qty per line item                           │
//! │  transfer             ──►  −qty at source, +qty at destination          │
//! │                                                                         │
//! │  Reversal = the same delta with the opposite sign.                      │
//! │  The ledger only ever sees signed deltas; it never knows "why"          │
//! │  beyond the movement type it records.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::StockPolicy;

/// Applies a signed quantity delta to an on-hand quantity.
///
/// ## Rules
/// - `delta` must be nonzero (a zero delta is a caller bug, not a no-op)
/// - if the policy forbids negative stock and the result would be negative,
///   fails with `InsufficientStock` - the caller must perform no writes
///
/// ## Arguments
/// * `sku` - product SKU, carried into the error for context
/// * `on_hand` - current quantity
/// * `delta` - signed change
/// * `policy` - tenant stock policy
///
/// ## Returns
/// The new quantity to persist.
pub fn apply_delta(sku: &str, on_hand: i64, delta: i64, policy: &StockPolicy) -> CoreResult<i64> {
    if delta == 0 {
        return Err(ValidationError::MustBeNonZero { field: "quantity_delta" }.into());
    }

    let new_quantity = on_hand + delta;

    if new_quantity < 0 && policy.prevent_negative_stock {
        return Err(CoreError::InsufficientStock {
            sku: sku.to_string(),
            available: on_hand,
            requested: -delta,
        });
    }

    Ok(new_quantity)
}

/// Validates a transfer request before any delta is applied.
///
/// ## Preconditions
/// - source and destination warehouses differ
/// - quantity is positive
/// - source has at least `quantity` on hand, else `InsufficientStock`
pub fn check_transfer(
    sku: &str,
    source_warehouse_id: &str,
    dest_warehouse_id: &str,
    source_on_hand: i64,
    quantity: i64,
) -> CoreResult<()> {
    if source_warehouse_id == dest_warehouse_id {
        return Err(ValidationError::MustDiffer {
            field_a: "source_warehouse_id",
            field_b: "dest_warehouse_id",
        }
        .into());
    }

    if quantity <= 0 {
        return Err(ValidationError::MustBePositive { field: "quantity" }.into());
    }

    if source_on_hand < quantity {
        return Err(CoreError::InsufficientStock {
            sku: sku.to_string(),
            available: source_on_hand,
            requested: quantity,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
