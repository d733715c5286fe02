//! # Database Migrations
//!
//! Embedded SQL migrations, compiled into the binary so a deployed station
//! never depends on migration files being present on disk.
//!
//! Migration files live in `migrations/sqlite/` at the workspace root and
//! are applied in filename order. sqlx tracks applied migrations in its own
//! `_sqlx_migrations` table, so reruns are no-ops.

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;

use crate::error::DbResult;

/// Embedded migrations, resolved at compile time.
static MIGRATOR: Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies all pending migrations to the given pool.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    Ok(())
}
