//! # Discount Resolver
//!
//! Given a product and a set of candidate discounts, selects the single
//! best-value discount and computes its amount.
//!
//! ## Resolution Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Discount Resolution                                 │
//! │                                                                         │
//! │  candidates ──► filter ──────────► compute amount ──► pick best         │
//! │                 • active            • percentage       • largest        │
//! │                 • time window       • fixed              amount wins    │
//! │                 • min qty/amount    • buy X get Y      • strict >,      │
//! │                 • scope match                            first-seen     │
//! │                                                          wins ties      │
//! │                                                                         │
//! │  Nothing qualifies ──► zero amount, no discount reference               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{Discount, DiscountScope, DiscountType, Product};

/// The outcome of discount resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedDiscount {
    /// The winning discount, or `None` when nothing qualifies.
    pub discount: Option<Discount>,
    /// The discount amount. Zero when no discount qualifies.
    pub amount: Money,
}

impl ResolvedDiscount {
    /// The empty resolution: no discount, zero amount.
    pub fn none() -> Self {
        ResolvedDiscount {
            discount: None,
            amount: Money::zero(),
        }
    }
}

/// Whether a discount's scope covers the given product.
fn scope_matches(discount: &Discount, product: &Product) -> bool {
    match discount.applies_to {
        DiscountScope::All => true,
        DiscountScope::Products => discount.product_ids.iter().any(|id| *id == product.id),
        DiscountScope::Categories => match &product.category_id {
            Some(category_id) => discount.category_ids.iter().any(|id| id == category_id),
            None => false,
        },
    }
}

/// Whether a discount qualifies for this purchase at all.
fn qualifies(
    discount: &Discount,
    product: &Product,
    quantity: i64,
    total: Money,
    as_of: DateTime<Utc>,
) -> bool {
    if !discount.active || !discount.in_window(as_of) {
        return false;
    }

    if let Some(min_qty) = discount.min_purchase_qty {
        if quantity < min_qty {
            return false;
        }
    }

    if let Some(min_amount) = discount.min_purchase_amount_cents {
        if total.cents() < min_amount {
            return false;
        }
    }

    scope_matches(discount, product)
}

/// Computes the discount amount for one qualifying discount.
///
/// ## Per-type rules
/// - `percentage`: `total * value/10000` bps, capped at the max amount if set
/// - `fixed`: `value` cents, capped at the max amount if set
/// - `buy_x_get_y`: `sets = floor(quantity / (buy_qty + get_qty))`,
///   free units `= sets * get_qty`, amount `= free_units * unit_price`.
///   Requires `quantity >= buy_qty`; the max cap does not apply.
fn amount_for(discount: &Discount, quantity: i64, total: Money, unit_price: Money) -> Money {
    let raw = match discount.discount_type {
        DiscountType::Percentage => total.percent_bps(discount.value.max(0) as u32),
        DiscountType::Fixed => Money::from_cents(discount.value),
        DiscountType::BuyXGetY => {
            return match (discount.buy_qty, discount.get_qty) {
                (Some(buy), Some(get)) if buy > 0 && get > 0 && quantity >= buy => {
                    let sets = quantity / (buy + get);
                    unit_price.multiply_quantity(sets * get)
                }
                _ => Money::zero(),
            };
        }
    };

    match discount.max_discount_amount_cents {
        Some(cap) => raw.min(Money::from_cents(cap)),
        None => raw,
    }
}

/// Selects the best applicable discount for a product.
///
/// ## Arguments
/// * `product` - the product being purchased
/// * `quantity` - units purchased
/// * `total` - the purchase amount the discount applies against
/// * `unit_price` - per-unit price (drives buy-X-get-Y free units)
/// * `as_of` - evaluation instant for time windows
/// * `candidates` - discounts to consider (already tenant-scoped)
///
/// ## Tie-break
/// The discount yielding the largest amount wins. Comparison is strict `>`,
/// so on an exact tie the first-seen candidate wins.
pub fn resolve_best(
    product: &Product,
    quantity: i64,
    total: Money,
    unit_price: Money,
    as_of: DateTime<Utc>,
    candidates: Vec<Discount>,
) -> ResolvedDiscount {
    let mut best = ResolvedDiscount::none();

    for discount in candidates {
        if !qualifies(&discount, product, quantity, total, as_of) {
            continue;
        }

        let amount = amount_for(&discount, quantity, total, unit_price);
        if amount > best.amount {
            best = ResolvedDiscount {
                discount: Some(discount),
                amount,
            };
        }
    }

    best
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiscountScope;

    fn product() -> Product {
        Product {
            id: "p1".to_string(),
            tenant_id: "t1".to_string(),
            sku: "COLA-500".to_string(),
            name: "Coca-Cola 330ml".to_string(),
            category_id: Some("c1".to_string()),
            cost_cents: 150,
            price_cents: 299,
            track_inventory: true,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn discount(name: &str, discount_type: DiscountType, value: i64) -> Discount {
        Discount {
            id: format!("d-{name}"),
            tenant_id: "t1".to_string(),
            name: name.to_string(),
            discount_type,
            value,
            applies_to: DiscountScope::All,
            start_date: None,
            end_date: None,
            min_purchase_qty: None,
            min_purchase_amount_cents: None,
            max_discount_amount_cents: None,
            buy_qty: None,
            get_qty: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            product_ids: vec![],
            category_ids: vec![],
        }
    }

    #[test]
    fn test_largest_amount_wins() {
        // 10% of $100 = $10; fixed $15. Fixed wins.
        let candidates = vec![
            discount("ten-pct", DiscountType::Percentage, 1000),
            discount("fifteen-flat", DiscountType::Fixed, 1500),
        ];

        let result = resolve_best(
            &product(),
            1,
            Money::from_cents(10_000),
            Money::from_cents(10_000),
            Utc::now(),
            candidates,
        );

        assert_eq!(result.amount.cents(), 1500);
        assert_eq!(result.discount.unwrap().name, "fifteen-flat");
    }

    #[test]
    fn test_first_seen_wins_exact_tie() {
        // Both yield $10.00: the first candidate is kept (strict >).
        let candidates = vec![
            discount("first", DiscountType::Fixed, 1000),
            discount("second", DiscountType::Percentage, 1000),
        ];

        let result = resolve_best(
            &product(),
            1,
            Money::from_cents(10_000),
            Money::from_cents(10_000),
            Utc::now(),
            candidates,
        );

        assert_eq!(result.amount.cents(), 1000);
        assert_eq!(result.discount.unwrap().name, "first");
    }

    #[test]
    fn test_none_qualifying_returns_zero() {
        let mut gated = discount("gated", DiscountType::Fixed, 500);
        gated.min_purchase_amount_cents = Some(100_000);

        let result = resolve_best(
            &product(),
            1,
            Money::from_cents(10_000),
            Money::from_cents(10_000),
            Utc::now(),
            vec![gated],
        );

        assert!(result.discount.is_none());
        assert!(result.amount.is_zero());
    }

    #[test]
    fn test_percentage_capped() {
        let mut capped = discount("capped", DiscountType::Percentage, 5000); // 50%
        capped.max_discount_amount_cents = Some(2000);

        let result = resolve_best(
            &product(),
            1,
            Money::from_cents(10_000),
            Money::from_cents(10_000),
            Utc::now(),
            vec![capped],
        );

        assert_eq!(result.amount.cents(), 2000);
    }

    #[test]
    fn test_buy_two_get_one() {
        let mut bogo = discount("b2g1", DiscountType::BuyXGetY, 0);
        bogo.buy_qty = Some(2);
        bogo.get_qty = Some(1);

        // 7 units at $2.99: floor(7/3) = 2 sets, 2 free units
        let unit = Money::from_cents(299);
        let result = resolve_best(
            &product(),
            7,
            unit.multiply_quantity(7),
            unit,
            Utc::now(),
            vec![bogo.clone()],
        );
        assert_eq!(result.amount.cents(), 2 * 299);

        // Below buy_qty: no free units
        let result = resolve_best(&product(), 1, unit, unit, Utc::now(), vec![bogo]);
        assert!(result.amount.is_zero());
        assert!(result.discount.is_none());
    }

    #[test]
    fn test_scope_product_match() {
        let mut scoped = discount("scoped", DiscountType::Fixed, 500);
        scoped.applies_to = DiscountScope::Products;
        scoped.product_ids = vec!["p1".to_string()];

        let mut unrelated = discount("unrelated", DiscountType::Fixed, 900);
        unrelated.applies_to = DiscountScope::Products;
        unrelated.product_ids = vec!["other".to_string()];

        let result = resolve_best(
            &product(),
            1,
            Money::from_cents(10_000),
            Money::from_cents(10_000),
            Utc::now(),
            vec![scoped, unrelated],
        );

        assert_eq!(result.discount.unwrap().name, "scoped");
        assert_eq!(result.amount.cents(), 500);
    }

    #[test]
    fn test_scope_category_match() {
        let mut scoped = discount("cat", DiscountType::Fixed, 700);
        scoped.applies_to = DiscountScope::Categories;
        scoped.category_ids = vec!["c1".to_string()];

        let result = resolve_best(
            &product(),
            1,
            Money::from_cents(10_000),
            Money::from_cents(10_000),
            Utc::now(),
            vec![scoped.clone()],
        );
        assert_eq!(result.amount.cents(), 700);

        // A product without a category never matches a category scope
        let mut uncategorized = product();
        uncategorized.category_id = None;
        let result = resolve_best(
            &uncategorized,
            1,
            Money::from_cents(10_000),
            Money::from_cents(10_000),
            Utc::now(),
            vec![scoped],
        );
        assert!(result.discount.is_none());
    }

    #[test]
    fn test_inactive_and_out_of_window_skipped() {
        let mut inactive = discount("inactive", DiscountType::Fixed, 999);
        inactive.active = false;

        let mut expired = discount("expired", DiscountType::Fixed, 999);
        expired.end_date = Some(Utc::now() - chrono::Duration::days(1));

        let result = resolve_best(
            &product(),
            1,
            Money::from_cents(10_000),
            Money::from_cents(10_000),
            Utc::now(),
            vec![inactive, expired],
        );

        assert!(result.discount.is_none());
        assert!(result.amount.is_zero());
    }

    #[test]
    fn test_min_purchase_qty_gate() {
        let mut gated = discount("qty-gated", DiscountType::Fixed, 500);
        gated.min_purchase_qty = Some(3);

        let result = resolve_best(
            &product(),
            2,
            Money::from_cents(600),
            Money::from_cents(300),
            Utc::now(),
            vec![gated.clone()],
        );
        assert!(result.discount.is_none());

        let result = resolve_best(
            &product(),
            3,
            Money::from_cents(900),
            Money::from_cents(300),
            Utc::now(),
            vec![gated],
        );
        assert_eq!(result.amount.cents(), 500);
    }
}
