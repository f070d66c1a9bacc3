//! # Discount Repository
//!
//! Discount definitions, their scope links, and best-discount resolution.
//!
//! The math lives in storeflow-core; this repository loads the candidate
//! set (active, tenant-scoped, with product/category links attached) and
//! hands it to the pure resolver.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use storeflow_core::{
    discount as resolver, validation, Discount, DiscountScope, DiscountType, Money, Product,
    ResolvedDiscount,
};

// =============================================================================
// Request types
// =============================================================================

/// A discount definition to create or replace.
#[derive(Debug, Clone)]
pub struct DiscountInput {
    pub tenant_id: String,
    pub name: String,
    pub discount_type: DiscountType,
    /// Basis points for percentage, cents for fixed, unused for buy-X-get-Y.
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
    /// Linked products; only meaningful when scoped to products.
    pub product_ids: Vec<String>,
    /// Linked categories; only meaningful when scoped to categories.
    pub category_ids: Vec<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for discount operations.
#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    /// Creates a new DiscountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Creates a discount with its scope links.
    pub async fn create(&self, input: DiscountInput) -> DbResult<Discount> {
        let now = Utc::now();
        let discount = Discount {
            id: generate_id(),
            tenant_id: input.tenant_id.clone(),
            name: input.name.clone(),
            discount_type: input.discount_type,
            value: input.value,
            applies_to: input.applies_to,
            start_date: input.start_date,
            end_date: input.end_date,
            min_purchase_qty: input.min_purchase_qty,
            min_purchase_amount_cents: input.min_purchase_amount_cents,
            max_discount_amount_cents: input.max_discount_amount_cents,
            buy_qty: input.buy_qty,
            get_qty: input.get_qty,
            active: input.active,
            created_at: now,
            updated_at: now,
            product_ids: input.product_ids.clone(),
            category_ids: input.category_ids.clone(),
        };
        validation::validate_discount(&discount)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO discounts (
                id, tenant_id, name, discount_type, value, applies_to,
                start_date, end_date, min_purchase_qty, min_purchase_amount_cents,
                max_discount_amount_cents, buy_qty, get_qty, active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&discount.id)
        .bind(&discount.tenant_id)
        .bind(&discount.name)
        .bind(discount.discount_type)
        .bind(discount.value)
        .bind(discount.applies_to)
        .bind(discount.start_date)
        .bind(discount.end_date)
        .bind(discount.min_purchase_qty)
        .bind(discount.min_purchase_amount_cents)
        .bind(discount.max_discount_amount_cents)
        .bind(discount.buy_qty)
        .bind(discount.get_qty)
        .bind(discount.active)
        .bind(discount.created_at)
        .bind(discount.updated_at)
        .execute(&mut *tx)
        .await?;

        sync_links(&mut tx, &discount).await?;

        tx.commit().await?;

        info!(discount_id = %discount.id, name = %discount.name, "Discount created");
        Ok(discount)
    }

    /// Replaces a discount definition and resyncs its scope links.
    pub async fn update(&self, id: &str, input: DiscountInput) -> DbResult<Discount> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, Discount>("SELECT * FROM discounts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Discount", id))?;

        let updated = Discount {
            name: input.name.clone(),
            discount_type: input.discount_type,
            value: input.value,
            applies_to: input.applies_to,
            start_date: input.start_date,
            end_date: input.end_date,
            min_purchase_qty: input.min_purchase_qty,
            min_purchase_amount_cents: input.min_purchase_amount_cents,
            max_discount_amount_cents: input.max_discount_amount_cents,
            buy_qty: input.buy_qty,
            get_qty: input.get_qty,
            active: input.active,
            updated_at: Utc::now(),
            product_ids: input.product_ids.clone(),
            category_ids: input.category_ids.clone(),
            ..existing
        };
        validation::validate_discount(&updated)?;

        sqlx::query(
            r#"
            UPDATE discounts SET
                name = ?2, discount_type = ?3, value = ?4, applies_to = ?5,
                start_date = ?6, end_date = ?7, min_purchase_qty = ?8,
                min_purchase_amount_cents = ?9, max_discount_amount_cents = ?10,
                buy_qty = ?11, get_qty = ?12, active = ?13, updated_at = ?14
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&updated.name)
        .bind(updated.discount_type)
        .bind(updated.value)
        .bind(updated.applies_to)
        .bind(updated.start_date)
        .bind(updated.end_date)
        .bind(updated.min_purchase_qty)
        .bind(updated.min_purchase_amount_cents)
        .bind(updated.max_discount_amount_cents)
        .bind(updated.buy_qty)
        .bind(updated.get_qty)
        .bind(updated.active)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        sync_links(&mut tx, &updated).await?;

        tx.commit().await?;

        info!(discount_id = %id, "Discount updated");
        Ok(updated)
    }

    /// Deletes a discount and its links.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM discounts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount", id));
        }

        Ok(())
    }

    /// Gets a discount by ID with its scope links loaded.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Discount>> {
        let discount = sqlx::query_as::<_, Discount>("SELECT * FROM discounts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match discount {
            Some(mut discount) => {
                self.load_links(&mut discount).await?;
                Ok(Some(discount))
            }
            None => Ok(None),
        }
    }

    /// Loads candidate discounts for resolution.
    ///
    /// SQL filters tenant, active flag, and the time window; the resolver
    /// re-checks the window plus the per-purchase gates.
    pub async fn candidates(
        &self,
        tenant_id: &str,
        as_of: DateTime<Utc>,
    ) -> DbResult<Vec<Discount>> {
        let mut discounts = sqlx::query_as::<_, Discount>(
            r#"
            SELECT * FROM discounts
            WHERE tenant_id = ?1
              AND active = 1
              AND (start_date IS NULL OR start_date <= ?2)
              AND (end_date IS NULL OR end_date >= ?2)
            ORDER BY created_at, id
            "#,
        )
        .bind(tenant_id)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        for discount in &mut discounts {
            self.load_links(discount).await?;
        }

        debug!(tenant_id = %tenant_id, count = discounts.len(), "Loaded discount candidates");
        Ok(discounts)
    }

    /// Resolves the best discount for a product purchase.
    ///
    /// ## Arguments
    /// * `product` - the product being purchased
    /// * `quantity` - units purchased
    /// * `as_of` - evaluation instant for time windows
    ///
    /// The purchase amount is `quantity × product price`; the largest
    /// discount amount wins, first-seen wins exact ties.
    pub async fn resolve_for_product(
        &self,
        product: &Product,
        quantity: i64,
        as_of: DateTime<Utc>,
    ) -> DbResult<ResolvedDiscount> {
        let candidates = self.candidates(&product.tenant_id, as_of).await?;

        let unit_price = product.price();
        let total = unit_price.multiply_quantity(quantity);

        Ok(resolver::resolve_best(
            product, quantity, total, unit_price, as_of, candidates,
        ))
    }

    /// Resolves against an explicit line total (already discounted upstream
    /// or priced off-list).
    pub async fn resolve_for_line(
        &self,
        product: &Product,
        quantity: i64,
        unit_price: Money,
        as_of: DateTime<Utc>,
    ) -> DbResult<ResolvedDiscount> {
        let candidates = self.candidates(&product.tenant_id, as_of).await?;
        let total = unit_price.multiply_quantity(quantity);

        Ok(resolver::resolve_best(
            product, quantity, total, unit_price, as_of, candidates,
        ))
    }

    /// Lists all discounts for a tenant.
    pub async fn list(&self, tenant_id: &str) -> DbResult<Vec<Discount>> {
        let mut discounts = sqlx::query_as::<_, Discount>(
            "SELECT * FROM discounts WHERE tenant_id = ?1 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        for discount in &mut discounts {
            self.load_links(discount).await?;
        }

        Ok(discounts)
    }

    async fn load_links(&self, discount: &mut Discount) -> DbResult<()> {
        discount.product_ids =
            sqlx::query_scalar("SELECT product_id FROM discount_products WHERE discount_id = ?1")
                .bind(&discount.id)
                .fetch_all(&self.pool)
                .await?;

        discount.category_ids = sqlx::query_scalar(
            "SELECT category_id FROM discount_categories WHERE discount_id = ?1",
        )
        .bind(&discount.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(())
    }
}

/// Replaces the scope link rows to match the discount's id lists.
async fn sync_links(conn: &mut SqliteConnection, discount: &Discount) -> DbResult<()> {
    sqlx::query("DELETE FROM discount_products WHERE discount_id = ?1")
        .bind(&discount.id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM discount_categories WHERE discount_id = ?1")
        .bind(&discount.id)
        .execute(&mut *conn)
        .await?;

    if discount.applies_to == DiscountScope::Products {
        for product_id in &discount.product_ids {
            sqlx::query("INSERT INTO discount_products (discount_id, product_id) VALUES (?1, ?2)")
                .bind(&discount.id)
                .bind(product_id)
                .execute(&mut *conn)
                .await?;
        }
    }

    if discount.applies_to == DiscountScope::Categories {
        for category_id in &discount.category_ids {
            sqlx::query(
                "INSERT INTO discount_categories (discount_id, category_id) VALUES (?1, ?2)",
            )
            .bind(&discount.id)
            .bind(category_id)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
