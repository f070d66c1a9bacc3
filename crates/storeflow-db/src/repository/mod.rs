//! # Repository Pattern Implementation
//!
//! Database access layer organized by aggregate.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Repository Layer                                    │
//! │                                                                         │
//! │  Callers (services, seeders, tests)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐ ┌──────────────┐  │
//! │  │   Product    │ │    Ledger    │ │   Purchase   │ │     Sale     │  │
//! │  │  Repository  │ │  Repository  │ │  Repository  │ │  Repository  │  │
//! │  └──────────────┘ └──────┬───────┘ └──────┬───────┘ └──────┬───────┘  │
//! │                          │                │                │           │
//! │                          │     apply_delta_in_tx(&mut conn)│           │
//! │                          │◄───────────────┴────────────────┘           │
//! │                          ▼                                             │
//! │  ┌──────────────────────────────────────────────────────────────────┐ │
//! │  │                     SQLite (WAL mode)                            │ │
//! │  └──────────────────────────────────────────────────────────────────┘ │
//! │                                                                         │
//! │  Rule: every stock quantity write goes through the ledger. The         │
//! │  document repositories never touch stock_levels directly.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transaction Boundaries
//! A document operation (create/update/delete/status change) is one SQLite
//! transaction: header writes, item writes, and every ledger delta commit or
//! roll back together. The ledger exposes `*_in_tx` variants taking
//! `&mut SqliteConnection` so document repositories can compose deltas into
//! their own transaction.

pub mod cash_register;
pub mod discount;
pub mod ledger;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod settings;

pub use cash_register::CashRegisterRepository;
pub use discount::DiscountRepository;
pub use ledger::LedgerRepository;
pub use product::ProductRepository;
pub use purchase::PurchaseRepository;
pub use sale::SaleRepository;
pub use settings::SettingsRepository;

/// Generates a new UUID v4 entity ID.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// Shared test fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod testutil {
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use storeflow_core::{Product, Warehouse, DEFAULT_TENANT_ID};

    /// In-memory database with the default tenant provisioned.
    pub async fn test_db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query("INSERT INTO tenants (id, name, created_at) VALUES (?1, 'Test', ?2)")
            .bind(DEFAULT_TENANT_ID)
            .bind(Utc::now())
            .execute(db.pool())
            .await
            .unwrap();
        db
    }

    /// Inserts a tracked product and returns it.
    pub async fn seed_product(db: &Database, sku: &str) -> Product {
        let now = Utc::now();
        let product = Product {
            id: super::generate_id(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            category_id: None,
            cost_cents: 150,
            price_cents: 299,
            track_inventory: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap()
    }

    /// Creates a warehouse.
    pub async fn seed_warehouse(db: &Database, name: &str) -> Warehouse {
        db.products()
            .create_warehouse(DEFAULT_TENANT_ID, name)
            .await
            .unwrap()
    }
}
