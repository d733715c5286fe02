//! # Closure Repository
//!
//! Shift-close coordination and the append-only closure records.
//!
//! ## Close Handshake
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Shift Close Coordination                       │
//! │                                                                 │
//! │  External collaborator                                          │
//! │      └── request_close() ──► close_requests row appears         │
//! │                                                                 │
//! │  Synchronization loop (each cycle)                              │
//! │      └── take_close_request()                                   │
//! │            ├── row existed ──► deleted, returns true,           │
//! │            │                   loop performs the device close   │
//! │            └── no row ───────► returns false, nothing to do     │
//! │                                                                 │
//! │  After the device confirms:                                     │
//! │      └── insert_closure(report) ──► one shift_closures row plus │
//! │                                     its detail rows, atomically │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `take_close_request` consumes the flag with a single DELETE, so two
//! concurrent loops could never both see it set.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use forecourt_core::{HoseTotals, ShiftClosure};

/// Repository for shift close requests and closure records.
#[derive(Debug, Clone)]
pub struct ClosureRepository {
    pool: SqlitePool,
}

impl ClosureRepository {
    /// Creates a new ClosureRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClosureRepository { pool }
    }

    /// Raises the close-request flag. Idempotent: re-requesting while a
    /// request is already pending leaves a single flag.
    pub async fn request_close(&self) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO close_requests (id, requested_at) VALUES (1, ?1)
            ON CONFLICT (id) DO UPDATE SET requested_at = excluded.requested_at
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!("Shift close requested");
        Ok(())
    }

    /// Atomically consumes a pending close request. Returns true when a
    /// request was pending (and is now cleared).
    pub async fn take_close_request(&self) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM close_requests WHERE id = 1")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Persists a complete closure report in one transaction and returns
    /// the new closure id.
    pub async fn insert_closure(&self, closure: &ShiftClosure) -> DbResult<i64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let closure_id: i64 = sqlx::query_scalar(
            "INSERT INTO shift_closures (closed_at, tax1, tax2) VALUES (?1, ?2, ?3) RETURNING id",
        )
        .bind(now)
        .bind(&closure.tax1)
        .bind(&closure.tax2)
        .fetch_one(&mut *tx)
        .await?;

        for (slot, total) in closure.payment_totals.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO closure_payment_totals (closure_id, slot, amount, volume)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(closure_id)
            .bind(slot as i64)
            .bind(&total.amount)
            .bind(&total.volume)
            .execute(&mut *tx)
            .await?;
        }

        for (idx, product) in closure.product_totals.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO closure_product_totals (closure_id, product_idx, amount, volume, price)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(closure_id)
            .bind(idx as i64)
            .bind(&product.amount)
            .bind(&product.volume)
            .bind(&product.price)
            .execute(&mut *tx)
            .await?;
        }

        Self::insert_hose_totals(&mut tx, closure_id, "tracked", &closure.hose_totals).await?;
        Self::insert_hose_totals(&mut tx, closure_id, "untracked", &closure.untracked_hose_totals)
            .await?;
        Self::insert_hose_totals(&mut tx, closure_id, "test", &closure.test_hose_totals).await?;

        for (idx, tank) in closure.tanks.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO closure_tanks
                    (closure_id, tank_idx, product_volume, water_volume, empty_space, capacity)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(closure_id)
            .bind(idx as i64)
            .bind(&tank.product_volume)
            .bind(&tank.water_volume)
            .bind(&tank.empty_space)
            .bind(&tank.capacity)
            .execute(&mut *tx)
            .await?;
        }

        for (idx, product) in closure.products.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO closure_products
                    (closure_id, product_idx, product_id, price,
                     volume, water_volume, empty_space, capacity)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(closure_id)
            .bind(idx as i64)
            .bind(&product.product_id)
            .bind(&product.price)
            .bind(&product.volume)
            .bind(&product.water_volume)
            .bind(&product.empty_space)
            .bind(&product.capacity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(closure_id, "Shift closure persisted");
        Ok(closure_id)
    }

    async fn insert_hose_totals(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        closure_id: i64,
        kind: &str,
        groups: &[HoseTotals],
    ) -> DbResult<()> {
        for group in groups {
            for (hose_idx, total) in group.totals.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO closure_hose_totals
                        (closure_id, kind, pump_id, hose_idx, amount, volume)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )
                .bind(closure_id)
                .bind(kind)
                .bind(group.pump_id)
                .bind(hose_idx as i64)
                .bind(&total.amount)
                .bind(&total.volume)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }

    /// Number of stored closures (debugging aid).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shift_closures")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use forecourt_core::{ProductTotal, TankSnapshot, Total};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_close_request_is_consumed_once() {
        let db = test_db().await;
        let repo = db.closures();

        assert!(!repo.take_close_request().await.unwrap());

        repo.request_close().await.unwrap();
        repo.request_close().await.unwrap(); // idempotent

        assert!(repo.take_close_request().await.unwrap());
        assert!(!repo.take_close_request().await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_closure_with_details() {
        let db = test_db().await;
        let repo = db.closures();

        let closure = ShiftClosure {
            payment_totals: vec![
                Total { amount: "1200.00".into(), volume: "340.10".into() },
                Total { amount: "0.00".into(), volume: "0.00".into() },
            ],
            tax1: Some("21.00".into()),
            tax2: None,
            product_totals: vec![ProductTotal {
                amount: "1200.00".into(),
                volume: "340.10".into(),
                price: "3.53".into(),
            }],
            hose_totals: vec![HoseTotals {
                pump_id: 1,
                totals: vec![Total { amount: "600.00".into(), volume: "170.05".into() }],
            }],
            untracked_hose_totals: vec![],
            test_hose_totals: vec![],
            tanks: vec![TankSnapshot {
                product_volume: "900.00".into(),
                water_volume: "2.00".into(),
                empty_space: "1098.00".into(),
                capacity: "2000.00".into(),
            }],
            products: vec![],
        };

        let id = repo.insert_closure(&closure).await.unwrap();
        assert!(id > 0);
        assert_eq!(repo.count().await.unwrap(), 1);

        let payment_rows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM closure_payment_totals WHERE closure_id = ?1")
                .bind(id)
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(payment_rows, 2);

        let hose_rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM closure_hose_totals WHERE closure_id = ?1 AND kind = 'tracked'",
        )
        .bind(id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(hose_rows, 1);
    }

    #[tokio::test]
    async fn test_empty_closure_still_persists_header() {
        let db = test_db().await;
        let repo = db.closures();

        let id = repo.insert_closure(&ShiftClosure::default()).await.unwrap();
        assert!(id > 0);
    }
}
