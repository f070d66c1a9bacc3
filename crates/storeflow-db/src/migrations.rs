//! Schema migrations, embedded at compile time.
//!
//! Every `.sql` file under `migrations/sqlite/` is baked into the binary by
//! `sqlx::migrate!`, so deployments never ship loose SQL files. Migrations
//! are append-only: a shipped file must never change, new schema work gets
//! the next `NNN_description.sql` number.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration not yet recorded in `_sqlx_migrations`.
/// Each migration runs in its own transaction, in filename order.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(total = MIGRATOR.migrations.len(), "Migrations up to date");
    Ok(())
}

/// (embedded, applied) migration counts, for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);
    Ok((MIGRATOR.migrations.len(), applied as usize))
}
