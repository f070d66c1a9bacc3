//! # Purchase Repository
//!
//! Purchase documents and their stock effect.
//!
//! ## Stock Effect Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            When does a purchase touch the ledger?                       │
//! │                                                                         │
//! │  create(received)      ──► +qty per line                                │
//! │  create(pending)       ──► nothing                                      │
//! │                                                                         │
//! │  update(any)           ──► reverse old effect, re-apply if the new      │
//! │                            status is received                           │
//! │                            (reversal targets the warehouses the old     │
//! │                             movements were written against, so a        │
//! │                             warehouse change cannot strand stock)       │
//! │                                                                         │
//! │  change_status         ──► fulfilled → not: reverse                     │
//! │                            not → fulfilled: apply                       │
//! │                                                                         │
//! │  delete                ──► reverse, then remove document                │
//! │                                                                         │
//! │  Everything above is ONE transaction per call.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{apply_delta_in_tx, reverse_reference_in_tx, DeltaRequest};
use crate::repository::{generate_id, settings};
use storeflow_core::{
    validation, DocumentRef, MovementType, Purchase, PurchaseItem, PurchaseStatus, ReferenceKind,
    StockPolicy,
};

// =============================================================================
// Request types
// =============================================================================

/// One line of a purchase to create or replace.
#[derive(Debug, Clone)]
pub struct NewPurchaseItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// A purchase document to create.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub tenant_id: String,
    pub warehouse_id: String,
    pub user_id: String,
    pub reference: String,
    pub status: PurchaseStatus,
    pub notes: Option<String>,
    pub items: Vec<NewPurchaseItem>,
}

/// Replacement content for an existing purchase.
///
/// An update replaces the whole document: header fields and the full item
/// set. Partial item edits are expressed by sending the desired final list.
#[derive(Debug, Clone)]
pub struct PurchaseUpdate {
    pub warehouse_id: String,
    pub reference: String,
    pub status: PurchaseStatus,
    pub notes: Option<String>,
    pub items: Vec<NewPurchaseItem>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for purchase documents.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Creates a purchase. Applies stock deltas when created as received.
    pub async fn create(&self, new: NewPurchase) -> DbResult<Purchase> {
        validate_items(&new.items)?;

        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let purchase = Purchase {
            id: generate_id(),
            tenant_id: new.tenant_id.clone(),
            warehouse_id: new.warehouse_id.clone(),
            user_id: new.user_id.clone(),
            reference: new.reference.clone(),
            status: new.status,
            notes: new.notes.clone(),
            total_cents: items_total(&new.items),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, tenant_id, warehouse_id, user_id, reference,
                status, notes, total_cents, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.tenant_id)
        .bind(&purchase.warehouse_id)
        .bind(&purchase.user_id)
        .bind(&purchase.reference)
        .bind(purchase.status)
        .bind(&purchase.notes)
        .bind(purchase.total_cents)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_items(&mut tx, &purchase.id, &new.items).await?;

        if purchase.status.is_fulfilled() {
            let policy = settings::stock_policy_in_tx(&mut tx, &purchase.tenant_id).await?;
            apply_items(&mut tx, &purchase, &new.items, &policy).await?;
        }

        tx.commit().await?;

        info!(
            purchase_id = %purchase.id,
            status = purchase.status.as_str(),
            items = new.items.len(),
            "Purchase created"
        );

        Ok(purchase)
    }

    /// Replaces a purchase document.
    ///
    /// Reverses the old stock effect first (at whatever warehouses the old
    /// movements were written against), then re-applies from the new item
    /// set when the new status is fulfilled.
    pub async fn update(&self, id: &str, update: PurchaseUpdate) -> DbResult<Purchase> {
        validate_items(&update.items)?;

        let mut tx = self.pool.begin().await?;

        let existing = load_purchase(&mut tx, id).await?;
        let policy = settings::stock_policy_in_tx(&mut tx, &existing.tenant_id).await?;

        reverse_reference_in_tx(
            &mut tx,
            &existing.tenant_id,
            ReferenceKind::Purchase,
            id,
            &existing.user_id,
            MovementType::Purchase,
            &policy,
        )
        .await?;

        sqlx::query("DELETE FROM purchase_items WHERE purchase_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, id, &update.items).await?;

        let now = Utc::now();
        let updated = Purchase {
            warehouse_id: update.warehouse_id.clone(),
            reference: update.reference.clone(),
            status: update.status,
            notes: update.notes.clone(),
            total_cents: items_total(&update.items),
            updated_at: now,
            ..existing
        };

        sqlx::query(
            r#"
            UPDATE purchases SET
                warehouse_id = ?2, reference = ?3, status = ?4,
                notes = ?5, total_cents = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&updated.warehouse_id)
        .bind(&updated.reference)
        .bind(updated.status)
        .bind(&updated.notes)
        .bind(updated.total_cents)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.status.is_fulfilled() {
            apply_items(&mut tx, &updated, &update.items, &policy).await?;
        }

        tx.commit().await?;

        info!(purchase_id = %id, status = updated.status.as_str(), "Purchase updated");
        Ok(updated)
    }

    /// Changes only the status, adjusting stock when crossing the
    /// fulfilled boundary in either direction.
    pub async fn change_status(&self, id: &str, status: PurchaseStatus) -> DbResult<Purchase> {
        let mut tx = self.pool.begin().await?;

        let existing = load_purchase(&mut tx, id).await?;
        let policy = settings::stock_policy_in_tx(&mut tx, &existing.tenant_id).await?;

        match (existing.status.is_fulfilled(), status.is_fulfilled()) {
            (true, false) => {
                reverse_reference_in_tx(
                    &mut tx,
                    &existing.tenant_id,
                    ReferenceKind::Purchase,
                    id,
                    &existing.user_id,
                    MovementType::Purchase,
                    &policy,
                )
                .await?;
            }
            (false, true) => {
                let items = load_items_in_tx(&mut tx, id).await?;
                let lines: Vec<NewPurchaseItem> = items
                    .iter()
                    .map(|item| NewPurchaseItem {
                        product_id: item.product_id.clone(),
                        quantity: item.quantity,
                        unit_price_cents: item.unit_price_cents,
                    })
                    .collect();
                apply_items(&mut tx, &existing, &lines, &policy).await?;
            }
            _ => {
                debug!(purchase_id = %id, "Status change without stock effect");
            }
        }

        let now = Utc::now();
        sqlx::query("UPDATE purchases SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            purchase_id = %id,
            from = existing.status.as_str(),
            to = status.as_str(),
            "Purchase status changed"
        );

        Ok(Purchase {
            status,
            updated_at: now,
            ..existing
        })
    }

    /// Deletes a purchase, reversing its stock effect first.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let existing = load_purchase(&mut tx, id).await?;
        let policy = settings::stock_policy_in_tx(&mut tx, &existing.tenant_id).await?;

        reverse_reference_in_tx(
            &mut tx,
            &existing.tenant_id,
            ReferenceKind::Purchase,
            id,
            &existing.user_id,
            MovementType::Purchase,
            &policy,
        )
        .await?;

        // Items cascade; movement history stays as the audit trail.
        sqlx::query("DELETE FROM purchases WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(purchase_id = %id, "Purchase deleted");
        Ok(())
    }

    /// Gets a purchase by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(purchase)
    }

    /// Gets the line items of a purchase.
    pub async fn items(&self, purchase_id: &str) -> DbResult<Vec<PurchaseItem>> {
        let items = sqlx::query_as::<_, PurchaseItem>(
            "SELECT * FROM purchase_items WHERE purchase_id = ?1 ORDER BY id",
        )
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists purchases for a tenant, newest first.
    pub async fn list(&self, tenant_id: &str, limit: u32) -> DbResult<Vec<Purchase>> {
        let purchases = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT * FROM purchases
            WHERE tenant_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_items(items: &[NewPurchaseItem]) -> DbResult<()> {
    validation::validate_item_count(items.len())?;
    for item in items {
        validation::validate_positive_quantity(item.quantity)?;
    }
    Ok(())
}

fn items_total(items: &[NewPurchaseItem]) -> i64 {
    items
        .iter()
        .map(|item| item.quantity * item.unit_price_cents)
        .sum()
}

async fn insert_items(
    conn: &mut SqliteConnection,
    purchase_id: &str,
    items: &[NewPurchaseItem],
) -> DbResult<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO purchase_items (id, purchase_id, product_id, quantity, unit_price_cents, total_cents)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(generate_id())
        .bind(purchase_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.quantity * item.unit_price_cents)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Applies the positive receipt deltas for every line of a purchase.
async fn apply_items(
    conn: &mut SqliteConnection,
    purchase: &Purchase,
    items: &[NewPurchaseItem],
    policy: &StockPolicy,
) -> DbResult<()> {
    for item in items {
        let request = DeltaRequest {
            tenant_id: purchase.tenant_id.clone(),
            product_id: item.product_id.clone(),
            warehouse_id: purchase.warehouse_id.clone(),
            user_id: purchase.user_id.clone(),
            delta: item.quantity,
            movement_type: MovementType::Purchase,
            reference: Some(DocumentRef::new(ReferenceKind::Purchase, purchase.id.clone())),
            notes: None,
        };
        apply_delta_in_tx(conn, &request, policy).await?;
    }
    Ok(())
}

async fn load_purchase(conn: &mut SqliteConnection, id: &str) -> DbResult<Purchase> {
    sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Purchase", id))
}

async fn load_items_in_tx(
    conn: &mut SqliteConnection,
    purchase_id: &str,
) -> DbResult<Vec<PurchaseItem>> {
    let items = sqlx::query_as::<_, PurchaseItem>(
        "SELECT * FROM purchase_items WHERE purchase_id = ?1 ORDER BY id",
    )
    .bind(purchase_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::sale::{NewSale, NewSaleItem};
    use crate::repository::testutil::{seed_product, seed_warehouse, test_db};
    use storeflow_core::{SaleStatus, DEFAULT_TENANT_ID};

    fn purchase_of(warehouse_id: &str, product_id: &str, quantity: i64, status: PurchaseStatus) -> NewPurchase {
        NewPurchase {
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            warehouse_id: warehouse_id.to_string(),
            user_id: "buyer".to_string(),
            reference: "PO-1".to_string(),
            status,
            notes: None,
            items: vec![NewPurchaseItem {
                product_id: product_id.to_string(),
                quantity,
                unit_price_cents: 120,
            }],
        }
    }

    #[tokio::test]
    async fn test_pending_purchase_leaves_stock_untouched() {
        let db = test_db().await;
        let product = seed_product(&db, "PUR-1").await;
        let warehouse = seed_warehouse(&db, "Main").await;

        let purchase = db
            .purchases()
            .create(purchase_of(&warehouse.id, &product.id, 30, PurchaseStatus::Pending))
            .await
            .unwrap();

        assert_eq!(purchase.total_cents, 30 * 120);
        assert_eq!(db.ledger().quantity(&product.id, &warehouse.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_received_purchase_adds_stock() {
        let db = test_db().await;
        let product = seed_product(&db, "PUR-2").await;
        let warehouse = seed_warehouse(&db, "Main").await;

        db.purchases()
            .create(purchase_of(&warehouse.id, &product.id, 30, PurchaseStatus::Received))
            .await
            .unwrap();

        assert_eq!(db.ledger().quantity(&product.id, &warehouse.id).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_status_round_trip_restores_stock() {
        let db = test_db().await;
        let product = seed_product(&db, "PUR-3").await;
        let warehouse = seed_warehouse(&db, "Main").await;
        let repo = db.purchases();

        let purchase = repo
            .create(purchase_of(&warehouse.id, &product.id, 30, PurchaseStatus::Pending))
            .await
            .unwrap();

        repo.change_status(&purchase.id, PurchaseStatus::Received).await.unwrap();
        assert_eq!(db.ledger().quantity(&product.id, &warehouse.id).await.unwrap(), 30);

        repo.change_status(&purchase.id, PurchaseStatus::Canceled).await.unwrap();
        assert_eq!(db.ledger().quantity(&product.id, &warehouse.id).await.unwrap(), 0);

        // Partial counts as not fulfilled: receiving again from canceled, then
        // dropping to partial reverses too
        repo.change_status(&purchase.id, PurchaseStatus::Received).await.unwrap();
        repo.change_status(&purchase.id, PurchaseStatus::Partial).await.unwrap();
        assert_eq!(db.ledger().quantity(&product.id, &warehouse.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_moves_stock_to_new_warehouse() {
        let db = test_db().await;
        let product = seed_product(&db, "PUR-4").await;
        let old_warehouse = seed_warehouse(&db, "Main").await;
        let new_warehouse = seed_warehouse(&db, "Backroom").await;
        let repo = db.purchases();

        let purchase = repo
            .create(purchase_of(&old_warehouse.id, &product.id, 20, PurchaseStatus::Received))
            .await
            .unwrap();

        // Edit changes warehouse and quantity; old warehouse must end at zero
        repo.update(
            &purchase.id,
            PurchaseUpdate {
                warehouse_id: new_warehouse.id.clone(),
                reference: "PO-1b".to_string(),
                status: PurchaseStatus::Received,
                notes: None,
                items: vec![NewPurchaseItem {
                    product_id: product.id.clone(),
                    quantity: 25,
                    unit_price_cents: 120,
                }],
            },
        )
        .await
        .unwrap();

        assert_eq!(db.ledger().quantity(&product.id, &old_warehouse.id).await.unwrap(), 0);
        assert_eq!(db.ledger().quantity(&product.id, &new_warehouse.id).await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_delete_reverses_before_removal() {
        let db = test_db().await;
        let product = seed_product(&db, "PUR-5").await;
        let warehouse = seed_warehouse(&db, "Main").await;
        let repo = db.purchases();

        let purchase = repo
            .create(purchase_of(&warehouse.id, &product.id, 10, PurchaseStatus::Received))
            .await
            .unwrap();

        repo.delete(&purchase.id).await.unwrap();

        assert!(repo.get_by_id(&purchase.id).await.unwrap().is_none());
        assert_eq!(db.ledger().quantity(&product.id, &warehouse.id).await.unwrap(), 0);

        // Movement history survives the document
        let history = db.ledger().movements_for_product(&product.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().map(|m| m.quantity_delta).sum::<i64>(), 0);
    }

    #[tokio::test]
    async fn test_document_lifecycle_round_trip() {
        // purchase 50 received → sale 10 completed → sale canceled →
        // purchase deleted: stock ends where it started.
        let db = test_db().await;
        let product = seed_product(&db, "PUR-6").await;
        let warehouse = seed_warehouse(&db, "Main").await;
        let ledger = db.ledger();

        let purchase = db
            .purchases()
            .create(purchase_of(&warehouse.id, &product.id, 50, PurchaseStatus::Received))
            .await
            .unwrap();
        assert_eq!(ledger.quantity(&product.id, &warehouse.id).await.unwrap(), 50);

        let sale = db
            .sales()
            .create(NewSale {
                tenant_id: DEFAULT_TENANT_ID.to_string(),
                store_id: "store-1".to_string(),
                warehouse_id: warehouse.id.clone(),
                user_id: "cashier".to_string(),
                status: SaleStatus::Completed,
                notes: None,
                items: vec![NewSaleItem {
                    product_id: product.id.clone(),
                    quantity: 10,
                    unit_price_cents: 299,
                    discount_cents: 0,
                }],
            })
            .await
            .unwrap();
        assert_eq!(ledger.quantity(&product.id, &warehouse.id).await.unwrap(), 40);

        db.sales().change_status(&sale.id, SaleStatus::Canceled).await.unwrap();
        assert_eq!(ledger.quantity(&product.id, &warehouse.id).await.unwrap(), 50);

        db.purchases().delete(&purchase.id).await.unwrap();
        assert_eq!(ledger.quantity(&product.id, &warehouse.id).await.unwrap(), 0);

        // The full audit trail nets to zero
        let history = ledger.movements_for_product(&product.id, 100).await.unwrap();
        assert_eq!(history.iter().map(|m| m.quantity_delta).sum::<i64>(), 0);
    }

    #[tokio::test]
    async fn test_empty_items_rejected() {
        let db = test_db().await;
        let warehouse = seed_warehouse(&db, "Main").await;

        let err = db
            .purchases()
            .create(NewPurchase {
                tenant_id: DEFAULT_TENANT_ID.to_string(),
                warehouse_id: warehouse.id.clone(),
                user_id: "buyer".to_string(),
                reference: "PO-empty".to_string(),
                status: PurchaseStatus::Pending,
                notes: None,
                items: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Core(_)));
    }
}
