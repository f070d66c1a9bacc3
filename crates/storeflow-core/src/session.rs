//! # Cash Session Reconciliation Math
//!
//! Pure calculation of the expected drawer balance and close-time
//! discrepancy for a cash register session.
//!
//! ## The Reconciliation Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Expected Drawer Balance                               │
//! │                                                                         │
//! │  expected = opening                                                     │
//! │           + Σ sales                                                     │
//! │           − Σ refunds                                                   │
//! │           − Σ expenses                                                  │
//! │           + Σ deposits                                                  │
//! │           − Σ withdrawals                                               │
//! │                                                                         │
//! │  difference = counted closing − expected                                │
//! │                                                                         │
//! │  Recomputed on demand from the FULL transaction set - never             │
//! │  incrementally maintained, so it cannot drift.                          │
//! │                                                                         │
//! │  A nonzero difference is recorded data for human review,                │
//! │  never an error, never a reason to block closing.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{CashRegisterTransaction, CashTxnType};

/// Per-type cash totals plus the reconciliation results for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub opening: Money,
    pub sales: Money,
    pub refunds: Money,
    pub expenses: Money,
    pub deposits: Money,
    pub withdrawals: Money,
    pub expected_closing: Money,
    /// `Some(closing - expected)` once a counted closing amount exists.
    pub difference: Option<Money>,
}

/// Sums the transactions of one type.
fn total_of(txns: &[CashRegisterTransaction], txn_type: CashTxnType) -> Money {
    txns.iter()
        .filter(|txn| txn.txn_type == txn_type)
        .fold(Money::zero(), |acc, txn| acc + Money::from_cents(txn.amount_cents))
}

/// Computes the expected closing balance from the full transaction set.
pub fn expected_closing(opening: Money, txns: &[CashRegisterTransaction]) -> Money {
    txns.iter().fold(opening, |acc, txn| acc + txn.signed_amount())
}

/// Builds the full session summary.
///
/// `closing` is the counted amount at close; pass `None` for a still-open
/// session, in which case no difference is reported.
pub fn summarize(
    opening: Money,
    txns: &[CashRegisterTransaction],
    closing: Option<Money>,
) -> SessionSummary {
    let expected = expected_closing(opening, txns);

    SessionSummary {
        opening,
        sales: total_of(txns, CashTxnType::Sale),
        refunds: total_of(txns, CashTxnType::Refund),
        expenses: total_of(txns, CashTxnType::Expense),
        deposits: total_of(txns, CashTxnType::Deposit),
        withdrawals: total_of(txns, CashTxnType::Withdrawal),
        expected_closing: expected,
        difference: closing.map(|counted| counted - expected),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn txn(txn_type: CashTxnType, amount_cents: i64) -> CashRegisterTransaction {
        CashRegisterTransaction {
            id: "t".to_string(),
            tenant_id: "tenant".to_string(),
            session_id: "s".to_string(),
            txn_type,
            amount_cents,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_expected_formula() {
        // expected = opening + sales − refunds − expenses + deposits − withdrawals
        let txns = vec![
            txn(CashTxnType::Sale, 5000),
            txn(CashTxnType::Sale, 2500),
            txn(CashTxnType::Refund, 500),
            txn(CashTxnType::Expense, 1200),
            txn(CashTxnType::Deposit, 10_000),
            txn(CashTxnType::Withdrawal, 3000),
        ];

        let expected = expected_closing(Money::from_cents(10_000), &txns);
        assert_eq!(expected.cents(), 10_000 + 5000 + 2500 - 500 - 1200 + 10_000 - 3000);
    }

    #[test]
    fn test_interleaving_does_not_matter() {
        let mut txns = vec![
            txn(CashTxnType::Withdrawal, 700),
            txn(CashTxnType::Sale, 1000),
            txn(CashTxnType::Deposit, 250),
            txn(CashTxnType::Refund, 100),
            txn(CashTxnType::Sale, 400),
        ];
        let opening = Money::from_cents(5000);

        let forward = expected_closing(opening, &txns);
        txns.reverse();
        let backward = expected_closing(opening, &txns);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_closing_at_expected_yields_zero_difference() {
        let txns = vec![txn(CashTxnType::Sale, 1500), txn(CashTxnType::Expense, 300)];
        let opening = Money::from_cents(2000);

        let expected = expected_closing(opening, &txns);
        let summary = summarize(opening, &txns, Some(expected));
        assert_eq!(summary.difference, Some(Money::zero()));
    }

    #[test]
    fn test_shortfall_is_negative_difference() {
        let txns = vec![txn(CashTxnType::Sale, 1000)];
        let opening = Money::from_cents(1000);

        // Expected 2000, drawer counted 1900: short by $1.00
        let summary = summarize(opening, &txns, Some(Money::from_cents(1900)));
        assert_eq!(summary.difference, Some(Money::from_cents(-100)));
    }

    #[test]
    fn test_summary_totals_by_type() {
        let txns = vec![
            txn(CashTxnType::Sale, 100),
            txn(CashTxnType::Sale, 200),
            txn(CashTxnType::Refund, 50),
        ];

        let summary = summarize(Money::zero(), &txns, None);
        assert_eq!(summary.sales.cents(), 300);
        assert_eq!(summary.refunds.cents(), 50);
        assert_eq!(summary.expenses.cents(), 0);
        assert_eq!(summary.expected_closing.cents(), 250);
        assert_eq!(summary.difference, None);
    }

    #[test]
    fn test_empty_session() {
        let summary = summarize(Money::from_cents(500), &[], Some(Money::from_cents(500)));
        assert_eq!(summary.expected_closing.cents(), 500);
        assert_eq!(summary.difference, Some(Money::zero()));
    }
}
