//! # Sale Repository
//!
//! Sale documents and their stock effect.
//!
//! Mirrors the purchase lifecycle with the opposite sign: a completed sale
//! subtracts stock, and reversal (cancel, edit, delete) gives it back. A
//! sale that would drive stock negative fails atomically under the default
//! policy: no header, no items, no movements.
//!
//! ## Sale Numbers
//! Business identifier `INV<yyyymmdd><seq>`, e.g. `INV202608250001`. The
//! sequence is per store and restarts daily, always one past the highest
//! number issued so far, so deleting a sale never recycles its number. A
//! UNIQUE (store_id, sale_number) constraint backs the generator: a race
//! between two concurrent writers surfaces as a constraint violation rather
//! than a duplicate number.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{apply_delta_in_tx, reverse_reference_in_tx, DeltaRequest};
use crate::repository::{generate_id, settings};
use storeflow_core::{
    validation, DocumentRef, MovementType, ReferenceKind, Sale, SaleItem, SaleStatus, StockPolicy,
};

// =============================================================================
// Request types
// =============================================================================

/// One line of a sale to create or replace.
#[derive(Debug, Clone)]
pub struct NewSaleItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Per-line discount already resolved by the caller.
    pub discount_cents: i64,
}

impl NewSaleItem {
    fn total_cents(&self) -> i64 {
        self.quantity * self.unit_price_cents - self.discount_cents
    }
}

/// A sale document to create.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub tenant_id: String,
    pub store_id: String,
    pub warehouse_id: String,
    pub user_id: String,
    pub status: SaleStatus,
    pub notes: Option<String>,
    pub items: Vec<NewSaleItem>,
}

/// Replacement content for an existing sale.
#[derive(Debug, Clone)]
pub struct SaleUpdate {
    pub warehouse_id: String,
    pub status: SaleStatus,
    pub notes: Option<String>,
    pub items: Vec<NewSaleItem>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale documents.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Creates a sale. Subtracts stock when created as completed.
    pub async fn create(&self, new: NewSale) -> DbResult<Sale> {
        validate_items(&new.items)?;

        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let sale_number = next_sale_number(&mut tx, &new.store_id).await?;
        let sale = Sale {
            id: generate_id(),
            tenant_id: new.tenant_id.clone(),
            store_id: new.store_id.clone(),
            warehouse_id: new.warehouse_id.clone(),
            user_id: new.user_id.clone(),
            sale_number,
            status: new.status,
            notes: new.notes.clone(),
            discount_cents: new.items.iter().map(|i| i.discount_cents).sum(),
            total_cents: new.items.iter().map(NewSaleItem::total_cents).sum(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, store_id, warehouse_id, user_id, sale_number,
                status, notes, discount_cents, total_cents, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(&sale.store_id)
        .bind(&sale.warehouse_id)
        .bind(&sale.user_id)
        .bind(&sale.sale_number)
        .bind(sale.status)
        .bind(&sale.notes)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_items(&mut tx, &sale.id, &new.items).await?;

        if sale.status.is_fulfilled() {
            let policy = settings::stock_policy_in_tx(&mut tx, &sale.tenant_id).await?;
            apply_items(&mut tx, &sale, &new.items, &policy).await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            sale_number = %sale.sale_number,
            status = sale.status.as_str(),
            "Sale created"
        );

        Ok(sale)
    }

    /// Replaces a sale document.
    ///
    /// Reverses the old stock effect (at the warehouses the old movements
    /// hit), then re-applies from the new item set when the new status is
    /// completed.
    pub async fn update(&self, id: &str, update: SaleUpdate) -> DbResult<Sale> {
        validate_items(&update.items)?;

        let mut tx = self.pool.begin().await?;

        let existing = load_sale(&mut tx, id).await?;
        let policy = settings::stock_policy_in_tx(&mut tx, &existing.tenant_id).await?;

        reverse_reference_in_tx(
            &mut tx,
            &existing.tenant_id,
            ReferenceKind::Sale,
            id,
            &existing.user_id,
            MovementType::Return,
            &policy,
        )
        .await?;

        sqlx::query("DELETE FROM sale_items WHERE sale_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, id, &update.items).await?;

        let now = Utc::now();
        let updated = Sale {
            warehouse_id: update.warehouse_id.clone(),
            status: update.status,
            notes: update.notes.clone(),
            discount_cents: update.items.iter().map(|i| i.discount_cents).sum(),
            total_cents: update.items.iter().map(NewSaleItem::total_cents).sum(),
            updated_at: now,
            ..existing
        };

        sqlx::query(
            r#"
            UPDATE sales SET
                warehouse_id = ?2, status = ?3, notes = ?4,
                discount_cents = ?5, total_cents = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&updated.warehouse_id)
        .bind(updated.status)
        .bind(&updated.notes)
        .bind(updated.discount_cents)
        .bind(updated.total_cents)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.status.is_fulfilled() {
            apply_items(&mut tx, &updated, &update.items, &policy).await?;
        }

        tx.commit().await?;

        info!(sale_id = %id, status = updated.status.as_str(), "Sale updated");
        Ok(updated)
    }

    /// Changes only the status, adjusting stock when crossing the
    /// fulfilled boundary in either direction.
    pub async fn change_status(&self, id: &str, status: SaleStatus) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;

        let existing = load_sale(&mut tx, id).await?;
        let policy = settings::stock_policy_in_tx(&mut tx, &existing.tenant_id).await?;

        match (existing.status.is_fulfilled(), status.is_fulfilled()) {
            (true, false) => {
                reverse_reference_in_tx(
                    &mut tx,
                    &existing.tenant_id,
                    ReferenceKind::Sale,
                    id,
                    &existing.user_id,
                    MovementType::Return,
                    &policy,
                )
                .await?;
            }
            (false, true) => {
                let items = load_items_in_tx(&mut tx, id).await?;
                let lines: Vec<NewSaleItem> = items
                    .iter()
                    .map(|item| NewSaleItem {
                        product_id: item.product_id.clone(),
                        quantity: item.quantity,
                        unit_price_cents: item.unit_price_cents,
                        discount_cents: item.discount_cents,
                    })
                    .collect();
                apply_items(&mut tx, &existing, &lines, &policy).await?;
            }
            _ => {
                debug!(sale_id = %id, "Status change without stock effect");
            }
        }

        let now = Utc::now();
        sqlx::query("UPDATE sales SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            sale_id = %id,
            from = existing.status.as_str(),
            to = status.as_str(),
            "Sale status changed"
        );

        Ok(Sale {
            status,
            updated_at: now,
            ..existing
        })
    }

    /// Deletes a sale, reversing its stock effect first.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let existing = load_sale(&mut tx, id).await?;
        let policy = settings::stock_policy_in_tx(&mut tx, &existing.tenant_id).await?;

        reverse_reference_in_tx(
            &mut tx,
            &existing.tenant_id,
            ReferenceKind::Sale,
            id,
            &existing.user_id,
            MovementType::Return,
            &policy,
        )
        .await?;

        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(sale_id = %id, "Sale deleted");
        Ok(())
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets a sale by its business number. Numbers are unique per store,
    /// not globally.
    pub async fn get_by_number(&self, store_id: &str, sale_number: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            "SELECT * FROM sales WHERE store_id = ?1 AND sale_number = ?2",
        )
        .bind(store_id)
        .bind(sale_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets the line items of a sale.
    pub async fn items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY id",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists sales for a tenant, newest first.
    pub async fn list(&self, tenant_id: &str, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE tenant_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_items(items: &[NewSaleItem]) -> DbResult<()> {
    validation::validate_item_count(items.len())?;
    for item in items {
        validation::validate_positive_quantity(item.quantity)?;
    }
    Ok(())
}

/// Generates the next sale number for a store inside the transaction.
///
/// Increments the highest sequence already issued under today's prefix for
/// this store, so a deleted sale never frees its number for reuse. The
/// zero-padded sequence keeps lexicographic and numeric order aligned.
async fn next_sale_number(conn: &mut SqliteConnection, store_id: &str) -> DbResult<String> {
    let date = Utc::now().format("%Y%m%d").to_string();
    let prefix = format!("INV{date}");

    let last: Option<String> = sqlx::query_scalar(
        r#"
        SELECT sale_number FROM sales
        WHERE store_id = ?1 AND sale_number LIKE ?2
        ORDER BY sale_number DESC
        LIMIT 1
        "#,
    )
    .bind(store_id)
    .bind(format!("{prefix}%"))
    .fetch_optional(&mut *conn)
    .await?;

    let seq = last
        .and_then(|number| number[prefix.len()..].parse::<i64>().ok())
        .unwrap_or(0)
        + 1;

    Ok(format!("{prefix}{seq:04}"))
}

async fn insert_items(
    conn: &mut SqliteConnection,
    sale_id: &str,
    items: &[NewSaleItem],
) -> DbResult<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO sale_items (id, sale_id, product_id, quantity, unit_price_cents, discount_cents, total_cents)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(generate_id())
        .bind(sale_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.discount_cents)
        .bind(item.total_cents())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Applies the negative fulfillment deltas for every line of a sale.
async fn apply_items(
    conn: &mut SqliteConnection,
    sale: &Sale,
    items: &[NewSaleItem],
    policy: &StockPolicy,
) -> DbResult<()> {
    for item in items {
        let request = DeltaRequest {
            tenant_id: sale.tenant_id.clone(),
            product_id: item.product_id.clone(),
            warehouse_id: sale.warehouse_id.clone(),
            user_id: sale.user_id.clone(),
            delta: -item.quantity,
            movement_type: MovementType::Sale,
            reference: Some(DocumentRef::new(ReferenceKind::Sale, sale.id.clone())),
            notes: None,
        };
        apply_delta_in_tx(conn, &request, policy).await?;
    }
    Ok(())
}

async fn load_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
    sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))
}

async fn load_items_in_tx(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items =
        sqlx::query_as::<_, SaleItem>("SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY id")
            .bind(sale_id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================
