//! # Tank Repository
//!
//! Current tank readings. Unlike dispatches this table is a snapshot, not
//! history: every cycle overwrites the previous reading per tank.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// A persisted tank reading.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PersistedTank {
    pub tank_id: i64,
    pub product_volume: String,
    /// Product plus water, precomputed by the caller.
    pub total: String,
    pub updated_at: DateTime<Utc>,
}

/// Repository for tank snapshot operations.
#[derive(Debug, Clone)]
pub struct TankRepository {
    pool: SqlitePool,
}

impl TankRepository {
    /// Creates a new TankRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TankRepository { pool }
    }

    /// Upserts the reading for one tank. Insert on first sight, overwrite
    /// thereafter.
    pub async fn upsert(&self, tank_id: i64, product_volume: &str, total: &str) -> DbResult<()> {
        debug!(tank_id, product_volume, total, "Upserting tank reading");

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO tanks (tank_id, product_volume, total, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (tank_id) DO UPDATE SET
                product_volume = excluded.product_volume,
                total = excluded.total,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tank_id)
        .bind(product_volume)
        .bind(total)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetches the current reading for one tank.
    pub async fn get(&self, tank_id: i64) -> DbResult<Option<PersistedTank>> {
        let row = sqlx::query_as::<_, PersistedTank>(
            "SELECT tank_id, product_volume, total, updated_at FROM tanks WHERE tank_id = ?1",
        )
        .bind(tank_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Lists all tank readings in tank order.
    pub async fn list(&self) -> DbResult<Vec<PersistedTank>> {
        let rows = sqlx::query_as::<_, PersistedTank>(
            "SELECT tank_id, product_volume, total, updated_at FROM tanks ORDER BY tank_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_upsert_inserts_then_overwrites() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.tanks();

        repo.upsert(1, "1000.50", "1012.75").await.unwrap();
        let first = repo.get(1).await.unwrap().unwrap();
        assert_eq!(first.product_volume, "1000.50");

        repo.upsert(1, "980.00", "992.25").await.unwrap();
        let second = repo.get(1).await.unwrap().unwrap();
        assert_eq!(second.product_volume, "980.00");
        assert_eq!(second.total, "992.25");

        // Still a single row.
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_is_tank_ordered() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.tanks();

        repo.upsert(3, "30.00", "30.00").await.unwrap();
        repo.upsert(1, "10.00", "10.00").await.unwrap();
        repo.upsert(2, "20.00", "20.00").await.unwrap();

        let ids: Vec<i64> = repo.list().await.unwrap().iter().map(|t| t.tank_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
