//! # Domain Types
//!
//! Core domain types used throughout Storeflow.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockLevel    │   │  StockMovement  │   │   DocumentRef   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  product_id     │   │  quantity_delta │   │  kind (enum)    │       │
//! │  │  warehouse_id   │   │  before/after   │   │  id             │       │
//! │  │  quantity       │   │  movement_type  │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                             │
//! │                                                                         │
//! │  Purchase ──┬── PurchaseItem      Sale ──┬── SaleItem                  │
//! │             └── PurchaseStatus           └── SaleStatus                │
//! │                                                                         │
//! │  CashRegisterSession ── CashRegisterTransaction (append-only)          │
//! │  Discount ── DiscountType / DiscountScope                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: (sku, reference, sale_number, ...)
//!
//! ## Ledger Invariant
//! For any (product, warehouse) pair, the `quantity_after` of the latest
//! StockMovement equals the current StockLevel quantity, and the sum of all
//! `quantity_delta` rows equals that quantity. The movement history is the
//! source of truth; StockLevel is a materialized cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Catalog
// =============================================================================

/// A sellable product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this product belongs to.
    pub tenant_id: String,

    /// Stock Keeping Unit - business identifier, unique per tenant.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Category linkage, used by category-scoped discounts.
    pub category_id: Option<String>,

    /// Cost in cents (for stock valuation).
    pub cost_cents: i64,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Whether stock quantities are tracked for this product.
    /// When false, every ledger operation is a no-op with a neutral return.
    pub track_inventory: bool,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the cost as Money.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }
}

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
}

/// A physical stock location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Per-(product, warehouse) quantity cache.
///
/// Unique per pair. Mutated only through the ledger repository, never
/// written directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockLevel {
    pub id: String,
    pub product_id: String,
    pub warehouse_id: String,
    /// Whole-unit quantity. ≥ 0 by policy, not hard-enforced by the schema.
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The business event that caused a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Purchase,
    Sale,
    TransferIn,
    TransferOut,
    Adjustment,
    Return,
    Initial,
}

/// The kind of business document a movement or payment points at.
///
/// A closed set instead of an open-ended "any model" polymorphic relation:
/// resolving a reference is a `match`, not reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Purchase,
    Sale,
    StockAdjustment,
    Transfer,
    Manual,
}

/// A typed reference to the business document that originated a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: ReferenceKind,
    pub id: String,
}

impl DocumentRef {
    pub fn new(kind: ReferenceKind, id: impl Into<String>) -> Self {
        DocumentRef { kind, id: id.into() }
    }
}

/// An immutable audit record of a single stock quantity change.
///
/// Append-only: never updated or deleted. Captures the before/after snapshot
/// so the history is auditable without replaying.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub warehouse_id: String,
    pub user_id: String,
    /// Signed quantity change. Never zero.
    pub quantity_delta: i64,
    /// Quantity on hand before this movement.
    pub quantity_before: i64,
    /// Quantity on hand after this movement.
    pub quantity_after: i64,
    pub movement_type: MovementType,
    pub reference_kind: Option<ReferenceKind>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Returns the originating document reference, when one was recorded.
    pub fn reference(&self) -> Option<DocumentRef> {
        match (self.reference_kind, self.reference_id.as_ref()) {
            (Some(kind), Some(id)) => Some(DocumentRef::new(kind, id.clone())),
            _ => None,
        }
    }
}

// =============================================================================
// Stock Policy (typed settings)
// =============================================================================

/// Typed stock policy settings for a tenant.
///
/// Loaded through the settings repository by key; one struct per settings
/// group, each with its own validation. No dynamic rule selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPolicy {
    /// When true, any mutation that would drive a stock level below zero
    /// fails with InsufficientStock and performs no writes.
    pub prevent_negative_stock: bool,
}

impl Default for StockPolicy {
    fn default() -> Self {
        StockPolicy {
            prevent_negative_stock: true,
        }
    }
}

// =============================================================================
// Purchase Documents
// =============================================================================

/// The status of a purchase document.
///
/// Stock deltas are applied only in the `Received` (fulfilled) state;
/// `Partial` counts as not fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Received,
    Partial,
    Canceled,
}

impl PurchaseStatus {
    /// Whether this status applies stock deltas.
    #[inline]
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, PurchaseStatus::Received)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Received => "received",
            PurchaseStatus::Partial => "partial",
            PurchaseStatus::Canceled => "canceled",
        }
    }
}

/// A purchase document header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Purchase {
    pub id: String,
    pub tenant_id: String,
    pub warehouse_id: String,
    pub user_id: String,
    /// Business reference (supplier invoice number, PO number, ...).
    pub reference: String,
    pub status: PurchaseStatus,
    pub notes: Option<String>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item on a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseItem {
    pub id: String,
    pub purchase_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

// =============================================================================
// Sale Documents
// =============================================================================

/// The status of a sale document.
///
/// Stock deltas are applied only in the `Completed` (fulfilled) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Completed,
    Canceled,
}

impl SaleStatus {
    /// Whether this status applies stock deltas.
    #[inline]
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, SaleStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Canceled => "canceled",
        }
    }
}

/// A sale document header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    pub store_id: String,
    /// Warehouse stock is drawn from on completion.
    pub warehouse_id: String,
    pub user_id: String,
    /// Business identifier: INV<yyyymmdd><seq>, unique per tenant.
    pub sale_number: String,
    pub status: SaleStatus,
    pub notes: Option<String>,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item on a sale.
///
/// Uses the snapshot pattern: unit price is frozen at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

// =============================================================================
// Stock Adjustments
// =============================================================================

/// Direction of a single adjustment item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    Add,
    Subtract,
}

/// A stock adjustment document header (create-only; no edit lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockAdjustment {
    pub id: String,
    pub tenant_id: String,
    pub warehouse_id: String,
    pub user_id: String,
    pub reference: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A line item on a stock adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockAdjustmentItem {
    pub id: String,
    pub adjustment_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub direction: AdjustmentDirection,
    pub reason: Option<String>,
}

// =============================================================================
// Cash Registers
// =============================================================================

/// A physical cash register.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashRegister {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Cash session lifecycle: open → closed (terminal, never reopened).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

/// A cash register session: one cashier's drawer between open and close.
///
/// The reconciliation fields (`cash_sales_cents`, `cash_refunds_cents`,
/// `expected_closing_cents`, `difference_cents`) are persisted at close.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashRegisterSession {
    pub id: String,
    pub tenant_id: String,
    pub cash_register_id: String,
    pub user_id: String,
    pub opening_amount_cents: i64,
    pub closing_amount_cents: Option<i64>,
    pub cash_sales_cents: Option<i64>,
    pub cash_refunds_cents: Option<i64>,
    pub expected_closing_cents: Option<i64>,
    /// closing − expected. Nonzero differences are recorded, never blocking.
    pub difference_cents: Option<i64>,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// The kind of cash-affecting event within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum CashTxnType {
    Sale,
    Refund,
    Expense,
    Deposit,
    Withdrawal,
}

impl CashTxnType {
    /// The sign this transaction type contributes to the expected drawer
    /// balance: sales and deposits add cash, the rest remove it.
    #[inline]
    pub fn sign(&self) -> i64 {
        match self {
            CashTxnType::Sale | CashTxnType::Deposit => 1,
            CashTxnType::Refund | CashTxnType::Expense | CashTxnType::Withdrawal => -1,
        }
    }
}

/// An append-only cash movement within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashRegisterTransaction {
    pub id: String,
    pub tenant_id: String,
    pub session_id: String,
    pub txn_type: CashTxnType,
    pub amount_cents: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CashRegisterTransaction {
    /// The signed contribution of this transaction to the expected balance.
    #[inline]
    pub fn signed_amount(&self) -> Money {
        Money::from_cents(self.amount_cents * self.txn_type.sign())
    }
}

// =============================================================================
// Discounts
// =============================================================================

/// How a discount's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `value` is basis points of the purchase amount (1000 = 10%).
    Percentage,
    /// `value` is a flat amount in cents.
    Fixed,
    /// `buy_qty`/`get_qty` drive the amount; `value` is unused.
    BuyXGetY,
}

/// Which products a discount can apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountScope {
    All,
    Products,
    Categories,
}

/// A discount definition.
///
/// Time-windowed, optionally gated on minimum purchase quantity/amount,
/// scoped to all products, a product set, or a category set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Discount {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub discount_type: DiscountType,
    /// Basis points for percentage, cents for fixed. See [`DiscountType`].
    pub value: i64,
    pub applies_to: DiscountScope,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub min_purchase_qty: Option<i64>,
    pub min_purchase_amount_cents: Option<i64>,
    pub max_discount_amount_cents: Option<i64>,
    pub buy_qty: Option<i64>,
    pub get_qty: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Linked product ids when scoped to products. Loaded by the repository.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub product_ids: Vec<String>,

    /// Linked category ids when scoped to categories. Loaded by the repository.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub category_ids: Vec<String>,
}

impl Discount {
    /// Whether `as_of` falls inside the discount's time window.
    /// Open-ended on either side when the bound is absent.
    pub fn in_window(&self, as_of: DateTime<Utc>) -> bool {
        let started = self.start_date.map_or(true, |start| start <= as_of);
        let not_ended = self.end_date.map_or(true, |end| end >= as_of);
        started && not_ended
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cash_txn_signs() {
        assert_eq!(CashTxnType::Sale.sign(), 1);
        assert_eq!(CashTxnType::Deposit.sign(), 1);
        assert_eq!(CashTxnType::Refund.sign(), -1);
        assert_eq!(CashTxnType::Expense.sign(), -1);
        assert_eq!(CashTxnType::Withdrawal.sign(), -1);
    }

    #[test]
    fn test_fulfilled_statuses() {
        assert!(PurchaseStatus::Received.is_fulfilled());
        assert!(!PurchaseStatus::Pending.is_fulfilled());
        assert!(!PurchaseStatus::Partial.is_fulfilled());
        assert!(SaleStatus::Completed.is_fulfilled());
        assert!(!SaleStatus::Canceled.is_fulfilled());
    }

    #[test]
    fn test_discount_window() {
        let mut discount = Discount {
            id: "d1".to_string(),
            tenant_id: "t1".to_string(),
            name: "Spring".to_string(),
            discount_type: DiscountType::Percentage,
            value: 1000,
            applies_to: DiscountScope::All,
            start_date: Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()),
            end_date: Some(Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap()),
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
        };

        let inside = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2026, 2, 15, 12, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 4, 15, 12, 0, 0).unwrap();

        assert!(discount.in_window(inside));
        assert!(!discount.in_window(before));
        assert!(!discount.in_window(after));

        // Open-ended windows
        discount.start_date = None;
        assert!(discount.in_window(before));
        discount.end_date = None;
        assert!(discount.in_window(after));
    }

    #[test]
    fn test_movement_reference() {
        let movement = StockMovement {
            id: "m1".to_string(),
            tenant_id: "t1".to_string(),
            product_id: "p1".to_string(),
            warehouse_id: "w1".to_string(),
            user_id: "u1".to_string(),
            quantity_delta: 5,
            quantity_before: 0,
            quantity_after: 5,
            movement_type: MovementType::Purchase,
            reference_kind: Some(ReferenceKind::Purchase),
            reference_id: Some("po-1".to_string()),
            notes: None,
            created_at: Utc::now(),
        };

        let doc_ref = movement.reference().unwrap();
        assert_eq!(doc_ref.kind, ReferenceKind::Purchase);
        assert_eq!(doc_ref.id, "po-1");
    }
}
