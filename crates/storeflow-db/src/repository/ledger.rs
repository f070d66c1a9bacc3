//! # Stock Ledger Repository
//!
//! The single write path for stock quantities.
//!
//! ## The Ledger Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One Delta, Two Writes                               │
//! │                                                                         │
//! │  apply_delta(product, warehouse, ±qty)                                  │
//! │       │                                                                 │
//! │       ├─ 1. read stock_levels.quantity        (before)                  │
//! │       ├─ 2. policy check: before + delta ≥ 0? (unless permissive)       │
//! │       ├─ 3. UPSERT stock_levels.quantity      (after)                   │
//! │       └─ 4. INSERT stock_movements            (delta, before, after)    │
//! │                                                                         │
//! │  All four steps happen inside ONE transaction. The movement row is      │
//! │  immutable: corrections are new opposite-sign movements, never          │
//! │  updates.                                                               │
//! │                                                                         │
//! │  Invariant: Σ quantity_delta  ==  stock_levels.quantity                 │
//! │             (per product × warehouse, over all time)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reversal
//! Reversing a document means negating the NET delta its movements have
//! contributed per (product, warehouse). Reversal rows carry the same
//! document reference, so the net after a reversal is zero and a repeated
//! reversal finds nothing left to undo.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{generate_id, settings};
use storeflow_core::{
    ledger, DocumentRef, Money, MovementType, Product, ReferenceKind, StockLevel, StockMovement,
    StockPolicy, ValidationError,
};

// =============================================================================
// Request types
// =============================================================================

/// A single signed quantity change to apply through the ledger.
#[derive(Debug, Clone)]
pub struct DeltaRequest {
    pub tenant_id: String,
    pub product_id: String,
    pub warehouse_id: String,
    pub user_id: String,
    /// Signed change. Positive adds stock, negative removes it.
    pub delta: i64,
    pub movement_type: MovementType,
    pub reference: Option<DocumentRef>,
    pub notes: Option<String>,
}

/// One line of a stock adjustment document.
#[derive(Debug, Clone)]
pub struct NewAdjustmentItem {
    pub product_id: String,
    /// Positive count of units; `subtract` flips the sign.
    pub quantity: i64,
    pub subtract: bool,
    pub reason: Option<String>,
}

/// A stock adjustment document to record and apply.
#[derive(Debug, Clone)]
pub struct NewAdjustment {
    pub tenant_id: String,
    pub warehouse_id: String,
    pub user_id: String,
    pub reference: String,
    pub notes: Option<String>,
    pub items: Vec<NewAdjustmentItem>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for stock ledger operations.
///
/// Document repositories (purchases, sales) compose deltas into their own
/// transactions through the `*_in_tx` functions; standalone callers use the
/// self-transacting methods.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Applies one delta in its own transaction.
    ///
    /// ## Returns
    /// * `Ok(Some(movement))` - delta applied, audit row written
    /// * `Ok(None)` - product does not track inventory; nothing written
    /// * `Err(DbError::Core(InsufficientStock))` - blocked by policy, no writes
    pub async fn apply_delta(&self, request: DeltaRequest) -> DbResult<Option<StockMovement>> {
        let mut tx = self.pool.begin().await?;

        let policy = settings::stock_policy_in_tx(&mut tx, &request.tenant_id).await?;
        let movement = apply_delta_in_tx(&mut tx, &request, &policy).await?;

        tx.commit().await?;
        Ok(movement)
    }

    /// Moves stock between two warehouses atomically.
    ///
    /// Both legs commit or neither does. The source is debited before the
    /// destination is credited; an insufficient source fails the whole
    /// transfer with no writes.
    ///
    /// ## Returns
    /// The generated transfer ID shared by both movement rows, or `None`
    /// when the product does not track inventory.
    pub async fn transfer(
        &self,
        tenant_id: &str,
        product_id: &str,
        source_warehouse_id: &str,
        dest_warehouse_id: &str,
        quantity: i64,
        user_id: &str,
        notes: Option<String>,
    ) -> DbResult<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let product = load_product(&mut tx, product_id).await?;
        if !product.track_inventory {
            debug!(product_id = %product_id, "Transfer skipped: inventory not tracked");
            return Ok(None);
        }

        let source_on_hand = quantity_in_tx(&mut tx, product_id, source_warehouse_id).await?;
        ledger::check_transfer(
            &product.sku,
            source_warehouse_id,
            dest_warehouse_id,
            source_on_hand,
            quantity,
        )?;

        let policy = settings::stock_policy_in_tx(&mut tx, tenant_id).await?;
        let transfer_id = generate_id();
        let reference = DocumentRef::new(ReferenceKind::Transfer, transfer_id.clone());

        // Each leg's note names the counterpart warehouse so a single
        // movement row still tells where the stock went or came from
        let out = DeltaRequest {
            tenant_id: tenant_id.to_string(),
            product_id: product_id.to_string(),
            warehouse_id: source_warehouse_id.to_string(),
            user_id: user_id.to_string(),
            delta: -quantity,
            movement_type: MovementType::TransferOut,
            reference: Some(reference.clone()),
            notes: Some(leg_note(
                &format!("Transfer to warehouse {dest_warehouse_id}"),
                notes.as_deref(),
            )),
        };
        apply_delta_in_tx(&mut tx, &out, &policy).await?;

        let incoming = DeltaRequest {
            delta: quantity,
            warehouse_id: dest_warehouse_id.to_string(),
            movement_type: MovementType::TransferIn,
            notes: Some(leg_note(
                &format!("Transfer from warehouse {source_warehouse_id}"),
                notes.as_deref(),
            )),
            ..out
        };
        apply_delta_in_tx(&mut tx, &incoming, &policy).await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            source = %source_warehouse_id,
            dest = %dest_warehouse_id,
            quantity = quantity,
            "Stock transferred"
        );

        Ok(Some(transfer_id))
    }

    /// Records a stock adjustment document and applies its deltas.
    ///
    /// Adjustments are create-only: no edit or delete lifecycle, so no
    /// reversal path. A mistake is corrected by a counter-adjustment.
    pub async fn process_adjustment(
        &self,
        adjustment: NewAdjustment,
    ) -> DbResult<storeflow_core::StockAdjustment> {
        if adjustment.items.is_empty() {
            return Err(ValidationError::Required { field: "items" }.into());
        }
        for item in &adjustment.items {
            if item.quantity <= 0 {
                return Err(ValidationError::MustBePositive { field: "quantity" }.into());
            }
        }

        let mut tx = self.pool.begin().await?;

        let policy = settings::stock_policy_in_tx(&mut tx, &adjustment.tenant_id).await?;
        let now = Utc::now();
        let header = storeflow_core::StockAdjustment {
            id: generate_id(),
            tenant_id: adjustment.tenant_id.clone(),
            warehouse_id: adjustment.warehouse_id.clone(),
            user_id: adjustment.user_id.clone(),
            reference: adjustment.reference.clone(),
            notes: adjustment.notes.clone(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_adjustments (id, tenant_id, warehouse_id, user_id, reference, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&header.id)
        .bind(&header.tenant_id)
        .bind(&header.warehouse_id)
        .bind(&header.user_id)
        .bind(&header.reference)
        .bind(&header.notes)
        .bind(header.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &adjustment.items {
            let direction = if item.subtract { "subtract" } else { "add" };
            sqlx::query(
                r#"
                INSERT INTO stock_adjustment_items (id, adjustment_id, product_id, quantity, direction, reason)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(generate_id())
            .bind(&header.id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(direction)
            .bind(&item.reason)
            .execute(&mut *tx)
            .await?;

            let delta = if item.subtract {
                -item.quantity
            } else {
                item.quantity
            };
            let request = DeltaRequest {
                tenant_id: adjustment.tenant_id.clone(),
                product_id: item.product_id.clone(),
                warehouse_id: adjustment.warehouse_id.clone(),
                user_id: adjustment.user_id.clone(),
                delta,
                movement_type: MovementType::Adjustment,
                reference: Some(DocumentRef::new(
                    ReferenceKind::StockAdjustment,
                    header.id.clone(),
                )),
                notes: item.reason.clone(),
            };
            apply_delta_in_tx(&mut tx, &request, &policy).await?;
        }

        tx.commit().await?;

        info!(
            adjustment_id = %header.id,
            items = adjustment.items.len(),
            "Stock adjustment processed"
        );

        Ok(header)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns the on-hand quantity for a (product, warehouse) pair.
    ///
    /// A pair with no stock level row has quantity zero.
    pub async fn quantity(&self, product_id: &str, warehouse_id: &str) -> DbResult<i64> {
        let quantity: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM stock_levels WHERE product_id = ?1 AND warehouse_id = ?2",
        )
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    /// Returns all stock levels for a product across warehouses.
    pub async fn levels_for_product(&self, product_id: &str) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            "SELECT * FROM stock_levels WHERE product_id = ?1 ORDER BY warehouse_id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(levels)
    }

    /// Returns the total on-hand quantity for a product over all warehouses.
    pub async fn total_quantity(&self, product_id: &str) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(quantity) FROM stock_levels WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// Returns the movement history for a product, newest first.
    pub async fn movements_for_product(
        &self,
        product_id: &str,
        limit: u32,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Returns every movement recorded against a document.
    pub async fn movements_for_reference(
        &self,
        kind: ReferenceKind,
        reference_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE reference_kind = ?1 AND reference_id = ?2
            ORDER BY created_at, id
            "#,
        )
        .bind(kind)
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Computes the stock value of a warehouse at product cost.
    ///
    /// value = Σ quantity × cost_cents over tracked products.
    pub async fn stock_value(&self, warehouse_id: &str) -> DbResult<Money> {
        let cents: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(sl.quantity * p.cost_cents)
            FROM stock_levels sl
            JOIN products p ON p.id = sl.product_id
            WHERE sl.warehouse_id = ?1
            "#,
        )
        .bind(warehouse_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents.unwrap_or(0)))
    }
}

// =============================================================================
// In-transaction building blocks
// =============================================================================

/// Applies one delta inside an open transaction.
///
/// This is the ONLY code path that writes `stock_levels` or
/// `stock_movements`. Returns `None` without writing when the product does
/// not track inventory.
pub async fn apply_delta_in_tx(
    conn: &mut SqliteConnection,
    request: &DeltaRequest,
    policy: &StockPolicy,
) -> DbResult<Option<StockMovement>> {
    let product = load_product(conn, &request.product_id).await?;
    if !product.track_inventory {
        debug!(product_id = %request.product_id, "Delta skipped: inventory not tracked");
        return Ok(None);
    }

    let before = quantity_in_tx(conn, &request.product_id, &request.warehouse_id).await?;
    let after = ledger::apply_delta(&product.sku, before, request.delta, policy)?;

    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO stock_levels (id, product_id, warehouse_id, quantity, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        ON CONFLICT (product_id, warehouse_id) DO UPDATE SET
            quantity = excluded.quantity,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(generate_id())
    .bind(&request.product_id)
    .bind(&request.warehouse_id)
    .bind(after)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let movement = StockMovement {
        id: generate_id(),
        tenant_id: request.tenant_id.clone(),
        product_id: request.product_id.clone(),
        warehouse_id: request.warehouse_id.clone(),
        user_id: request.user_id.clone(),
        quantity_delta: request.delta,
        quantity_before: before,
        quantity_after: after,
        movement_type: request.movement_type,
        reference_kind: request.reference.as_ref().map(|r| r.kind),
        reference_id: request.reference.as_ref().map(|r| r.id.clone()),
        notes: request.notes.clone(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, tenant_id, product_id, warehouse_id, user_id,
            quantity_delta, quantity_before, quantity_after,
            movement_type, reference_kind, reference_id, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.tenant_id)
    .bind(&movement.product_id)
    .bind(&movement.warehouse_id)
    .bind(&movement.user_id)
    .bind(movement.quantity_delta)
    .bind(movement.quantity_before)
    .bind(movement.quantity_after)
    .bind(movement.movement_type)
    .bind(movement.reference_kind)
    .bind(&movement.reference_id)
    .bind(&movement.notes)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %request.product_id,
        warehouse_id = %request.warehouse_id,
        delta = request.delta,
        before = before,
        after = after,
        "Stock delta applied"
    );

    Ok(Some(movement))
}

/// Reverses every delta a document has contributed, per (product, warehouse).
///
/// Negates the NET contribution, so a document that was already reversed
/// contributes nothing and this is a no-op. Reversal rows carry the same
/// document reference and the given movement type.
///
/// ## Returns
/// The number of reversal movements written.
pub async fn reverse_reference_in_tx(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    kind: ReferenceKind,
    reference_id: &str,
    user_id: &str,
    movement_type: MovementType,
    policy: &StockPolicy,
) -> DbResult<u32> {
    #[derive(sqlx::FromRow)]
    struct NetRow {
        product_id: String,
        warehouse_id: String,
        net: i64,
    }

    let nets = sqlx::query_as::<_, NetRow>(
        r#"
        SELECT product_id, warehouse_id, SUM(quantity_delta) AS net
        FROM stock_movements
        WHERE reference_kind = ?1 AND reference_id = ?2
        GROUP BY product_id, warehouse_id
        HAVING net != 0
        "#,
    )
    .bind(kind)
    .bind(reference_id)
    .fetch_all(&mut *conn)
    .await?;

    if nets.is_empty() {
        debug!(reference_id = %reference_id, "Nothing to reverse");
        return Ok(0);
    }

    let mut reversed = 0;
    for row in nets {
        let request = DeltaRequest {
            tenant_id: tenant_id.to_string(),
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            user_id: user_id.to_string(),
            delta: -row.net,
            movement_type,
            reference: Some(DocumentRef::new(kind, reference_id)),
            notes: Some("reversal".to_string()),
        };
        apply_delta_in_tx(conn, &request, policy).await?;
        reversed += 1;
    }

    warn!(
        reference_id = %reference_id,
        movements = reversed,
        "Document stock effect reversed"
    );

    Ok(reversed)
}

/// Reads the current quantity inside an open transaction.
pub async fn quantity_in_tx(
    conn: &mut SqliteConnection,
    product_id: &str,
    warehouse_id: &str,
) -> DbResult<i64> {
    let quantity: Option<i64> = sqlx::query_scalar(
        "SELECT quantity FROM stock_levels WHERE product_id = ?1 AND warehouse_id = ?2",
    )
    .bind(product_id)
    .bind(warehouse_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quantity.unwrap_or(0))
}

/// Loads a product inside an open transaction, failing when missing.
async fn load_product(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))
}

/// Combines a transfer leg's counterpart note with the caller's note.
fn leg_note(counterpart: &str, extra: Option<&str>) -> String {
    match extra {
        Some(extra) => format!("{counterpart}: {extra}"),
        None => counterpart.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testutil::{seed_product, seed_warehouse, test_db};
    use storeflow_core::{CoreError, DEFAULT_TENANT_ID};

    fn delta(
        product_id: &str,
        warehouse_id: &str,
        amount: i64,
        movement_type: MovementType,
    ) -> DeltaRequest {
        DeltaRequest {
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            product_id: product_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            user_id: "tester".to_string(),
            delta: amount,
            movement_type,
            reference: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_delta_writes_level_and_movement() {
        let db = test_db().await;
        let product = seed_product(&db, "LED-1").await;
        let warehouse = seed_warehouse(&db, "Main").await;
        let ledger = db.ledger();

        let movement = ledger
            .apply_delta(delta(&product.id, &warehouse.id, 50, MovementType::Initial))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(movement.quantity_before, 0);
        assert_eq!(movement.quantity_after, 50);
        assert_eq!(ledger.quantity(&product.id, &warehouse.id).await.unwrap(), 50);

        let history = ledger.movements_for_product(&product.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_movement_sum_matches_level() {
        let db = test_db().await;
        let product = seed_product(&db, "LED-2").await;
        let warehouse = seed_warehouse(&db, "Main").await;
        let ledger = db.ledger();

        for amount in [50, -10, 25, -5] {
            let movement_type = if amount > 0 {
                MovementType::Purchase
            } else {
                MovementType::Sale
            };
            ledger
                .apply_delta(delta(&product.id, &warehouse.id, amount, movement_type))
                .await
                .unwrap();
        }

        let history = ledger.movements_for_product(&product.id, 100).await.unwrap();
        let sum: i64 = history.iter().map(|m| m.quantity_delta).sum();
        let level = ledger.quantity(&product.id, &warehouse.id).await.unwrap();
        assert_eq!(sum, level);
        assert_eq!(level, 60);
    }

    #[tokio::test]
    async fn test_insufficient_stock_blocks_and_writes_nothing() {
        let db = test_db().await;
        let product = seed_product(&db, "LED-3").await;
        let warehouse = seed_warehouse(&db, "Main").await;
        let ledger = db.ledger();

        ledger
            .apply_delta(delta(&product.id, &warehouse.id, 3, MovementType::Initial))
            .await
            .unwrap();

        let err = ledger
            .apply_delta(delta(&product.id, &warehouse.id, -5, MovementType::Sale))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 3, requested: 5, .. })
        ));

        // No partial writes
        assert_eq!(ledger.quantity(&product.id, &warehouse.id).await.unwrap(), 3);
        assert_eq!(
            ledger.movements_for_product(&product.id, 10).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_permissive_policy_allows_negative() {
        let db = test_db().await;
        let product = seed_product(&db, "LED-4").await;
        let warehouse = seed_warehouse(&db, "Main").await;

        db.settings()
            .set_stock_policy(
                DEFAULT_TENANT_ID,
                &StockPolicy {
                    prevent_negative_stock: false,
                },
            )
            .await
            .unwrap();

        db.ledger()
            .apply_delta(delta(&product.id, &warehouse.id, -5, MovementType::Sale))
            .await
            .unwrap();

        assert_eq!(db.ledger().quantity(&product.id, &warehouse.id).await.unwrap(), -5);
    }

    #[tokio::test]
    async fn test_untracked_product_is_noop() {
        let db = test_db().await;
        let mut product = seed_product(&db, "LED-5").await;
        let warehouse = seed_warehouse(&db, "Main").await;

        product.track_inventory = false;
        db.products().update(&product).await.unwrap();

        let result = db
            .ledger()
            .apply_delta(delta(&product.id, &warehouse.id, 10, MovementType::Purchase))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(db.ledger().quantity(&product.id, &warehouse.id).await.unwrap(), 0);
        assert!(db
            .ledger()
            .movements_for_product(&product.id, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_transfer_conserves_total() {
        let db = test_db().await;
        let product = seed_product(&db, "TRF-1").await;
        let source = seed_warehouse(&db, "Main").await;
        let dest = seed_warehouse(&db, "Backroom").await;
        let ledger = db.ledger();

        ledger
            .apply_delta(delta(&product.id, &source.id, 40, MovementType::Initial))
            .await
            .unwrap();

        let transfer_id = ledger
            .transfer(DEFAULT_TENANT_ID, &product.id, &source.id, &dest.id, 15, "tester", None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ledger.quantity(&product.id, &source.id).await.unwrap(), 25);
        assert_eq!(ledger.quantity(&product.id, &dest.id).await.unwrap(), 15);
        assert_eq!(ledger.total_quantity(&product.id).await.unwrap(), 40);

        // Both legs share the transfer reference
        let legs = ledger
            .movements_for_reference(ReferenceKind::Transfer, &transfer_id)
            .await
            .unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs.iter().map(|m| m.quantity_delta).sum::<i64>(), 0);

        // Each leg's note names the counterpart warehouse
        let out = legs
            .iter()
            .find(|m| m.movement_type == MovementType::TransferOut)
            .unwrap();
        let incoming = legs
            .iter()
            .find(|m| m.movement_type == MovementType::TransferIn)
            .unwrap();
        assert_eq!(
            out.notes.as_deref(),
            Some(format!("Transfer to warehouse {}", dest.id).as_str())
        );
        assert_eq!(
            incoming.notes.as_deref(),
            Some(format!("Transfer from warehouse {}", source.id).as_str())
        );
    }

    #[test]
    fn test_leg_note_appends_caller_note() {
        assert_eq!(leg_note("Transfer to warehouse w2", None), "Transfer to warehouse w2");
        assert_eq!(
            leg_note("Transfer from warehouse w1", Some("restock run")),
            "Transfer from warehouse w1: restock run"
        );
    }

    #[tokio::test]
    async fn test_transfer_rejections() {
        let db = test_db().await;
        let product = seed_product(&db, "TRF-2").await;
        let source = seed_warehouse(&db, "Main").await;
        let dest = seed_warehouse(&db, "Backroom").await;
        let ledger = db.ledger();

        ledger
            .apply_delta(delta(&product.id, &source.id, 10, MovementType::Initial))
            .await
            .unwrap();

        // Same warehouse
        let err = ledger
            .transfer(DEFAULT_TENANT_ID, &product.id, &source.id, &source.id, 5, "tester", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        // More than on hand: nothing moves
        let err = ledger
            .transfer(DEFAULT_TENANT_ID, &product.id, &source.id, &dest.id, 11, "tester", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock { .. })));
        assert_eq!(ledger.quantity(&product.id, &source.id).await.unwrap(), 10);
        assert_eq!(ledger.quantity(&product.id, &dest.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_adjustment_applies_both_directions() {
        let db = test_db().await;
        let product_a = seed_product(&db, "ADJ-1").await;
        let product_b = seed_product(&db, "ADJ-2").await;
        let warehouse = seed_warehouse(&db, "Main").await;
        let ledger = db.ledger();

        ledger
            .apply_delta(delta(&product_b.id, &warehouse.id, 20, MovementType::Initial))
            .await
            .unwrap();

        let adjustment = ledger
            .process_adjustment(NewAdjustment {
                tenant_id: DEFAULT_TENANT_ID.to_string(),
                warehouse_id: warehouse.id.clone(),
                user_id: "tester".to_string(),
                reference: "ADJ-100".to_string(),
                notes: None,
                items: vec![
                    NewAdjustmentItem {
                        product_id: product_a.id.clone(),
                        quantity: 12,
                        subtract: false,
                        reason: Some("found in backroom".to_string()),
                    },
                    NewAdjustmentItem {
                        product_id: product_b.id.clone(),
                        quantity: 4,
                        subtract: true,
                        reason: Some("damaged".to_string()),
                    },
                ],
            })
            .await
            .unwrap();

        assert_eq!(ledger.quantity(&product_a.id, &warehouse.id).await.unwrap(), 12);
        assert_eq!(ledger.quantity(&product_b.id, &warehouse.id).await.unwrap(), 16);

        let movements = ledger
            .movements_for_reference(ReferenceKind::StockAdjustment, &adjustment.id)
            .await
            .unwrap();
        assert_eq!(movements.len(), 2);
    }

    #[tokio::test]
    async fn test_adjustment_shortfall_rolls_back_whole_document() {
        let db = test_db().await;
        let product_a = seed_product(&db, "ADJ-3").await;
        let product_b = seed_product(&db, "ADJ-4").await;
        let warehouse = seed_warehouse(&db, "Main").await;
        let ledger = db.ledger();

        let err = ledger
            .process_adjustment(NewAdjustment {
                tenant_id: DEFAULT_TENANT_ID.to_string(),
                warehouse_id: warehouse.id.clone(),
                user_id: "tester".to_string(),
                reference: "ADJ-101".to_string(),
                notes: None,
                items: vec![
                    NewAdjustmentItem {
                        product_id: product_a.id.clone(),
                        quantity: 5,
                        subtract: false,
                        reason: None,
                    },
                    NewAdjustmentItem {
                        product_id: product_b.id.clone(),
                        quantity: 3,
                        subtract: true,
                        reason: None,
                    },
                ],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock { .. })));

        // The first item's delta rolled back with the failed document
        assert_eq!(ledger.quantity(&product_a.id, &warehouse.id).await.unwrap(), 0);
        assert!(ledger
            .movements_for_product(&product_a.id, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_stock_value_at_cost() {
        let db = test_db().await;
        let product = seed_product(&db, "VAL-1").await; // cost 150
        let warehouse = seed_warehouse(&db, "Main").await;
        let ledger = db.ledger();

        ledger
            .apply_delta(delta(&product.id, &warehouse.id, 10, MovementType::Initial))
            .await
            .unwrap();

        let value = ledger.stock_value(&warehouse.id).await.unwrap();
        assert_eq!(value.cents(), 1500);
    }
}
