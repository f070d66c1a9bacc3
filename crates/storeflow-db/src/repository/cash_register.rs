//! # Cash Register Repository
//!
//! Cash registers, drawer sessions, and session reconciliation.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cash Session Lifecycle                              │
//! │                                                                         │
//! │  open_session(register, user, opening)                                  │
//! │       │   rejected if the register already has an open session          │
//! │       │   rejected if the user has an open session ANYWHERE             │
//! │       ▼                                                                 │
//! │  [OPEN] ──► add_transaction(sale/refund/expense/deposit/withdrawal)     │
//! │       │         append-only rows; closed sessions reject them           │
//! │       ▼                                                                 │
//! │  close_session(counted)                                                 │
//! │       │   expected = opening + Σsigned(txns)   (full recompute)         │
//! │       │   difference = counted − expected      (recorded, NEVER blocks) │
//! │       ▼                                                                 │
//! │  [CLOSED]  terminal: no reopen, no more transactions                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use storeflow_core::{
    session, validation, CashRegister, CashRegisterSession, CashRegisterTransaction, CashTxnType,
    CoreError, Money, SessionStatus, SessionSummary, ValidationError,
};

/// Repository for cash register operations.
#[derive(Debug, Clone)]
pub struct CashRegisterRepository {
    pool: SqlitePool,
}

impl CashRegisterRepository {
    /// Creates a new CashRegisterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CashRegisterRepository { pool }
    }

    // =========================================================================
    // Registers
    // =========================================================================

    /// Creates a cash register.
    pub async fn create_register(&self, tenant_id: &str, name: &str) -> DbResult<CashRegister> {
        let register = CashRegister {
            id: generate_id(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO cash_registers (id, tenant_id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&register.id)
        .bind(&register.tenant_id)
        .bind(&register.name)
        .bind(register.is_active)
        .bind(register.created_at)
        .execute(&self.pool)
        .await?;

        Ok(register)
    }

    /// Lists active registers for a tenant.
    pub async fn list_registers(&self, tenant_id: &str) -> DbResult<Vec<CashRegister>> {
        let registers = sqlx::query_as::<_, CashRegister>(
            "SELECT * FROM cash_registers WHERE tenant_id = ?1 AND is_active = 1 ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(registers)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Opens a session on a register.
    ///
    /// ## Conflict rules
    /// Both checked inside the opening transaction:
    /// - a register can have at most one open session
    /// - a user can have at most one open session across ALL registers
    pub async fn open_session(
        &self,
        tenant_id: &str,
        cash_register_id: &str,
        user_id: &str,
        opening_amount_cents: i64,
        notes: Option<String>,
    ) -> DbResult<CashRegisterSession> {
        validation::validate_opening_amount(opening_amount_cents)?;

        let mut tx = self.pool.begin().await?;

        let register_open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cash_register_sessions WHERE cash_register_id = ?1 AND status = 'open'",
        )
        .bind(cash_register_id)
        .fetch_one(&mut *tx)
        .await?;

        if register_open > 0 {
            return Err(CoreError::ConflictingSession {
                reason: format!("register {cash_register_id} already has an open session"),
            }
            .into());
        }

        let user_open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cash_register_sessions WHERE user_id = ?1 AND status = 'open'",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if user_open > 0 {
            return Err(CoreError::ConflictingSession {
                reason: format!("user {user_id} already has an open session"),
            }
            .into());
        }

        let session = CashRegisterSession {
            id: generate_id(),
            tenant_id: tenant_id.to_string(),
            cash_register_id: cash_register_id.to_string(),
            user_id: user_id.to_string(),
            opening_amount_cents,
            closing_amount_cents: None,
            cash_sales_cents: None,
            cash_refunds_cents: None,
            expected_closing_cents: None,
            difference_cents: None,
            status: SessionStatus::Open,
            notes,
            opened_at: Utc::now(),
            closed_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO cash_register_sessions (
                id, tenant_id, cash_register_id, user_id,
                opening_amount_cents, status, notes, opened_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&session.id)
        .bind(&session.tenant_id)
        .bind(&session.cash_register_id)
        .bind(&session.user_id)
        .bind(session.opening_amount_cents)
        .bind(session.status)
        .bind(&session.notes)
        .bind(session.opened_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            session_id = %session.id,
            register = %cash_register_id,
            user = %user_id,
            opening_cents = opening_amount_cents,
            "Cash session opened"
        );

        Ok(session)
    }

    /// Records a cash-affecting event within an open session.
    ///
    /// Append-only: rows are never edited. A mistake is corrected by a
    /// compensating transaction of the opposite type.
    pub async fn add_transaction(
        &self,
        session_id: &str,
        txn_type: CashTxnType,
        amount_cents: i64,
        note: Option<String>,
    ) -> DbResult<CashRegisterTransaction> {
        if amount_cents <= 0 {
            return Err(ValidationError::MustBePositive { field: "amount" }.into());
        }

        let mut tx = self.pool.begin().await?;

        let session = self.load_session_tx(&mut tx, session_id).await?;
        if session.status != SessionStatus::Open {
            return Err(CoreError::InvalidTransition {
                entity: "session",
                id: session_id.to_string(),
                status: session.status.as_str().to_string(),
                action: "record a transaction",
            }
            .into());
        }

        let txn = CashRegisterTransaction {
            id: generate_id(),
            tenant_id: session.tenant_id.clone(),
            session_id: session_id.to_string(),
            txn_type,
            amount_cents,
            note,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cash_register_transactions (id, tenant_id, session_id, txn_type, amount_cents, note, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&txn.id)
        .bind(&txn.tenant_id)
        .bind(&txn.session_id)
        .bind(txn.txn_type)
        .bind(txn.amount_cents)
        .bind(&txn.note)
        .bind(txn.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(txn)
    }

    /// Computes the expected drawer balance of a session right now.
    ///
    /// Always recomputed from the full transaction set.
    pub async fn expected_closing(&self, session_id: &str) -> DbResult<Money> {
        let session = self.get_session(session_id).await?;
        let txns = self.transactions(session_id).await?;

        Ok(session::expected_closing(
            Money::from_cents(session.opening_amount_cents),
            &txns,
        ))
    }

    /// Builds the full reconciliation summary for a session.
    pub async fn session_summary(&self, session_id: &str) -> DbResult<SessionSummary> {
        let session = self.get_session(session_id).await?;
        let txns = self.transactions(session_id).await?;

        Ok(session::summarize(
            Money::from_cents(session.opening_amount_cents),
            &txns,
            session.closing_amount_cents.map(Money::from_cents),
        ))
    }

    /// Closes a session with the counted drawer amount.
    ///
    /// Persists the reconciliation snapshot (per-type totals, expected
    /// closing, difference). A nonzero difference is recorded and logged,
    /// never rejected.
    pub async fn close_session(
        &self,
        session_id: &str,
        closing_amount_cents: i64,
        notes: Option<String>,
    ) -> DbResult<CashRegisterSession> {
        validation::validate_opening_amount(closing_amount_cents)?;

        let mut tx = self.pool.begin().await?;

        let session = self.load_session_tx(&mut tx, session_id).await?;
        if session.status != SessionStatus::Open {
            return Err(CoreError::InvalidTransition {
                entity: "session",
                id: session_id.to_string(),
                status: session.status.as_str().to_string(),
                action: "close",
            }
            .into());
        }

        let txns = sqlx::query_as::<_, CashRegisterTransaction>(
            "SELECT * FROM cash_register_transactions WHERE session_id = ?1 ORDER BY created_at, id",
        )
        .bind(session_id)
        .fetch_all(&mut *tx)
        .await?;

        let summary = session::summarize(
            Money::from_cents(session.opening_amount_cents),
            &txns,
            Some(Money::from_cents(closing_amount_cents)),
        );
        let difference = summary.difference.unwrap_or(Money::zero());
        let closed_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE cash_register_sessions SET
                closing_amount_cents = ?2,
                cash_sales_cents = ?3,
                cash_refunds_cents = ?4,
                expected_closing_cents = ?5,
                difference_cents = ?6,
                status = 'closed',
                notes = COALESCE(?7, notes),
                closed_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(session_id)
        .bind(closing_amount_cents)
        .bind(summary.sales.cents())
        .bind(summary.refunds.cents())
        .bind(summary.expected_closing.cents())
        .bind(difference.cents())
        .bind(&notes)
        .bind(closed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if difference.is_zero() {
            info!(session_id = %session_id, "Cash session closed, drawer balanced");
        } else {
            warn!(
                session_id = %session_id,
                expected_cents = summary.expected_closing.cents(),
                counted_cents = closing_amount_cents,
                difference_cents = difference.cents(),
                "Cash session closed with discrepancy"
            );
        }

        Ok(CashRegisterSession {
            closing_amount_cents: Some(closing_amount_cents),
            cash_sales_cents: Some(summary.sales.cents()),
            cash_refunds_cents: Some(summary.refunds.cents()),
            expected_closing_cents: Some(summary.expected_closing.cents()),
            difference_cents: Some(difference.cents()),
            status: SessionStatus::Closed,
            notes: notes.or(session.notes.clone()),
            closed_at: Some(closed_at),
            ..session
        })
    }

    /// Gets a session by ID.
    pub async fn get_session(&self, session_id: &str) -> DbResult<CashRegisterSession> {
        sqlx::query_as::<_, CashRegisterSession>(
            "SELECT * FROM cash_register_sessions WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Session", session_id))
    }

    /// Returns the user's open session, if any.
    pub async fn active_session_for_user(
        &self,
        user_id: &str,
    ) -> DbResult<Option<CashRegisterSession>> {
        let session = sqlx::query_as::<_, CashRegisterSession>(
            "SELECT * FROM cash_register_sessions WHERE user_id = ?1 AND status = 'open'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Returns all transactions of a session, oldest first.
    pub async fn transactions(&self, session_id: &str) -> DbResult<Vec<CashRegisterTransaction>> {
        let txns = sqlx::query_as::<_, CashRegisterTransaction>(
            "SELECT * FROM cash_register_transactions WHERE session_id = ?1 ORDER BY created_at, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(txns)
    }

    async fn load_session_tx(
        &self,
        conn: &mut sqlx::SqliteConnection,
        session_id: &str,
    ) -> DbResult<CashRegisterSession> {
        sqlx::query_as::<_, CashRegisterSession>(
            "SELECT * FROM cash_register_sessions WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Session", session_id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
