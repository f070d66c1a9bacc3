//! # Settings Repository
//!
//! Tenant-scoped key/value settings with typed accessors.
//!
//! Settings are stored as JSON strings in a (tenant_id, key) table and read
//! fresh from the database on each use. There is no process-global settings
//! cache: a setting read inside a transaction sees the committed value, and
//! two concurrent operations cannot observe different policies because one
//! of them cached a stale copy.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use storeflow_core::StockPolicy;

/// Settings key for the stock policy group.
pub const STOCK_POLICY_KEY: &str = "stock_policy";

/// Repository for tenant settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Gets a raw setting value.
    pub async fn get_raw(&self, tenant_id: &str, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE tenant_id = ?1 AND key = ?2")
                .bind(tenant_id)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value)
    }

    /// Sets a raw setting value (insert or replace).
    pub async fn set_raw(&self, tenant_id: &str, key: &str, value: &str) -> DbResult<()> {
        debug!(tenant_id = %tenant_id, key = %key, "Writing setting");

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO settings (tenant_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (tenant_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a typed setting, deserialized from its JSON value.
    ///
    /// Returns `Ok(None)` when the key has never been set.
    pub async fn get<T: DeserializeOwned>(
        &self,
        tenant_id: &str,
        key: &str,
    ) -> DbResult<Option<T>> {
        match self.get_raw(tenant_id, key).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .map_err(|e| DbError::Internal(format!("corrupt setting {key}: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Sets a typed setting, serialized to JSON.
    pub async fn set<T: Serialize>(&self, tenant_id: &str, key: &str, value: &T) -> DbResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| DbError::Internal(format!("serialize setting {key}: {e}")))?;
        self.set_raw(tenant_id, key, &raw).await
    }

    /// Returns the tenant's stock policy, defaulting when unset.
    ///
    /// The default policy prevents negative stock.
    pub async fn stock_policy(&self, tenant_id: &str) -> DbResult<StockPolicy> {
        Ok(self
            .get(tenant_id, STOCK_POLICY_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Persists the tenant's stock policy.
    pub async fn set_stock_policy(&self, tenant_id: &str, policy: &StockPolicy) -> DbResult<()> {
        self.set(tenant_id, STOCK_POLICY_KEY, policy).await
    }
}

/// Loads the stock policy inside an open transaction.
///
/// Document repositories call this so the policy and the deltas it governs
/// are read in the same transaction.
pub async fn stock_policy_in_tx(
    conn: &mut SqliteConnection,
    tenant_id: &str,
) -> DbResult<StockPolicy> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE tenant_id = ?1 AND key = ?2")
            .bind(tenant_id)
            .bind(STOCK_POLICY_KEY)
            .fetch_optional(&mut *conn)
            .await?;

    match raw {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| DbError::Internal(format!("corrupt setting {STOCK_POLICY_KEY}: {e}"))),
        None => Ok(StockPolicy::default()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
