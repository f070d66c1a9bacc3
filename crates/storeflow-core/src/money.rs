//! Integer-cents money.
//!
//! Every amount in the system is an `i64` count of the smallest currency
//! unit. Floats are never used for money: a cash drawer reconciled with
//! `f64` drifts by fractions of a cent and reports phantom discrepancies at
//! close. Percentages are expressed in basis points (1 bps = 0.01%) with one
//! explicit rounding point, [`Money::percent_bps`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A signed amount of money in cents.
///
/// Signed so refunds, reversals, and drawer differences need no separate
/// representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// The smaller of two amounts. Used to cap discounts.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// A basis-point share of this amount, rounded half up.
    ///
    /// 1000 bps = 10%. The intermediate product is widened to `i128` so
    /// large amounts cannot overflow.
    ///
    /// ```rust
    /// use storeflow_core::money::Money;
    ///
    /// // 8.25% of $10.00 is 82.5 cents, rounded to 83
    /// assert_eq!(Money::from_cents(1000).percent_bps(825).cents(), 83);
    /// ```
    pub fn percent_bps(&self, bps: u32) -> Money {
        let amount = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money::from_cents(amount as i64)
    }

    /// Line total for `qty` units at this unit price.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// `$12.34` / `-$0.50` style rendering, for logs rather than UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_round_trip() {
        assert_eq!(Money::from_cents(1099).cents(), 1099);
    }

    #[test]
    fn display_formats_sign_and_padding() {
        assert_eq!(Money::from_cents(1099).to_string(), "$10.99");
        assert_eq!(Money::from_cents(500).to_string(), "$5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-$5.50");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }

    #[test]
    fn arithmetic_ops() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((-a).cents(), -1000);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!(a.multiply_quantity(4).cents(), 4000);
    }

    #[test]
    fn percent_bps_rounds_half_up() {
        assert_eq!(Money::from_cents(10_000).percent_bps(1000).cents(), 1000);
        assert_eq!(Money::from_cents(1000).percent_bps(825).cents(), 83);
        assert_eq!(Money::from_cents(1).percent_bps(5000).cents(), 1);
    }

    #[test]
    fn min_caps_the_larger_amount() {
        let amount = Money::from_cents(1500);
        let cap = Money::from_cents(1000);
        assert_eq!(amount.min(cap), cap);
        assert_eq!(cap.min(amount), cap);
    }

    #[test]
    fn sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_positive());
        let negative = Money::from_cents(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs().cents(), 100);
    }
}
