//! # Dispatch Repository
//!
//! Immutable per-pump sale history.
//!
//! ## Write Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Dispatch Persistence                         │
//! │                                                                 │
//! │  insert_if_absent(new)                                          │
//! │      │                                                          │
//! │      ├── key (pump_id, record_id) free ──► row inserted         │
//! │      └── key already present ───────────► DuplicateRecord       │
//! │                                            (caller swallows it) │
//! │                                                                 │
//! │  Rows are never updated or deleted except for the invoicing     │
//! │  flag, which flips 0 → 1 exactly once via the cutoff sweep.     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The plain INSERT is deliberate: the composite primary key turns a
//! re-polled sale into a constraint failure, which the error layer maps to
//! `DbError::DuplicateRecord`. That is the entire duplicate-rejection
//! mechanism; there is no read-then-write race to worry about.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// A dispatch row about to be persisted. Monetary fields travel as strings
/// (fixed-point renderings) so SQLite never sees a float.
#[derive(Debug, Clone)]
pub struct NewDispatch {
    pub pump_id: i64,
    /// Numeric record key derived from the device record id's digit suffix.
    pub record_id: i64,
    pub sale_id: i64,
    /// Normalized station product id.
    pub product_id: i64,
    pub amount: String,
    pub volume: String,
    pub unit_price: String,
    /// Set when the reported unit price disagreed with the configured price
    /// for the resolved product, or always when the product code had no
    /// topology entry and was persisted raw.
    pub price_mismatch: bool,
    pub invoiced: bool,
}

/// A persisted dispatch row, as read back from the store.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PersistedDispatch {
    pub pump_id: i64,
    pub record_id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub amount: String,
    pub volume: String,
    pub unit_price: String,
    pub price_mismatch: bool,
    pub invoiced: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Repository for dispatch history operations.
#[derive(Debug, Clone)]
pub struct DispatchRepository {
    pool: SqlitePool,
}

impl DispatchRepository {
    /// Creates a new DispatchRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DispatchRepository { pool }
    }

    /// Inserts a dispatch row, failing with `DbError::DuplicateRecord` when
    /// the (pump_id, record_id) key already exists.
    pub async fn insert_if_absent(&self, dispatch: &NewDispatch) -> DbResult<()> {
        debug!(
            pump_id = dispatch.pump_id,
            record_id = dispatch.record_id,
            sale_id = dispatch.sale_id,
            "Inserting dispatch"
        );

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO dispatches (
                pump_id, record_id, sale_id, product_id,
                amount, volume, unit_price,
                price_mismatch, invoiced, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(dispatch.pump_id)
        .bind(dispatch.record_id)
        .bind(dispatch.sale_id)
        .bind(dispatch.product_id)
        .bind(&dispatch.amount)
        .bind(&dispatch.volume)
        .bind(&dispatch.unit_price)
        .bind(dispatch.price_mismatch)
        .bind(dispatch.invoiced)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetches a dispatch row by its composite key.
    pub async fn get(&self, pump_id: i64, record_id: i64) -> DbResult<Option<PersistedDispatch>> {
        let row = sqlx::query_as::<_, PersistedDispatch>(
            r#"
            SELECT pump_id, record_id, sale_id, product_id,
                   amount, volume, unit_price,
                   price_mismatch, invoiced, recorded_at
            FROM dispatches
            WHERE pump_id = ?1 AND record_id = ?2
            "#,
        )
        .bind(pump_id)
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// True when a row with the given key exists.
    pub async fn exists(&self, pump_id: i64, record_id: i64) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM dispatches WHERE pump_id = ?1 AND record_id = ?2",
        )
        .bind(pump_id)
        .bind(record_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Lists all rows for one pump, newest first (debugging aid).
    pub async fn list_for_pump(&self, pump_id: i64) -> DbResult<Vec<PersistedDispatch>> {
        let rows = sqlx::query_as::<_, PersistedDispatch>(
            r#"
            SELECT pump_id, record_id, sale_id, product_id,
                   amount, volume, unit_price,
                   price_mismatch, invoiced, recorded_at
            FROM dispatches
            WHERE pump_id = ?1
            ORDER BY record_id DESC
            "#,
        )
        .bind(pump_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Marks every uninvoiced dispatch recorded before `cutoff` as invoiced.
    /// Returns the number of rows flipped. Already-invoiced rows are never
    /// touched, so repeating the sweep is harmless.
    pub async fn mark_invoiced_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE dispatches
            SET invoiced = 1
            WHERE invoiced = 0 AND recorded_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let flipped = result.rows_affected();
        if flipped > 0 {
            debug!(rows = flipped, "Marked dispatches invoiced");
        }

        Ok(flipped)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample(pump_id: i64, record_id: i64) -> NewDispatch {
        NewDispatch {
            pump_id,
            record_id,
            sale_id: 77,
            product_id: 2,
            amount: "150.00".to_string(),
            volume: "42.50".to_string(),
            unit_price: "3.53".to_string(),
            price_mismatch: false,
            invoiced: false,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let repo = db.dispatches();

        repo.insert_if_absent(&sample(3, 123)).await.unwrap();

        let row = repo.get(3, 123).await.unwrap().unwrap();
        assert_eq!(row.sale_id, 77);
        assert_eq!(row.amount, "150.00");
        assert!(!row.invoiced);
    }

    #[tokio::test]
    async fn test_duplicate_key_is_conflict() {
        let db = test_db().await;
        let repo = db.dispatches();

        repo.insert_if_absent(&sample(3, 123)).await.unwrap();
        let err = repo.insert_if_absent(&sample(3, 123)).await.unwrap_err();
        assert!(err.is_conflict());

        // Same record id on another pump is a distinct sale.
        repo.insert_if_absent(&sample(4, 123)).await.unwrap();
    }

    #[tokio::test]
    async fn test_exists() {
        let db = test_db().await;
        let repo = db.dispatches();

        assert!(!repo.exists(1, 9).await.unwrap());
        repo.insert_if_absent(&sample(1, 9)).await.unwrap();
        assert!(repo.exists(1, 9).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_invoiced_before_flips_once() {
        let db = test_db().await;
        let repo = db.dispatches();

        repo.insert_if_absent(&sample(2, 50)).await.unwrap();

        let future = Utc::now() + Duration::seconds(60);
        assert_eq!(repo.mark_invoiced_before(future).await.unwrap(), 1);
        assert_eq!(repo.mark_invoiced_before(future).await.unwrap(), 0);

        let row = repo.get(2, 50).await.unwrap().unwrap();
        assert!(row.invoiced);
    }

    #[tokio::test]
    async fn test_mark_invoiced_respects_cutoff() {
        let db = test_db().await;
        let repo = db.dispatches();

        repo.insert_if_absent(&sample(2, 51)).await.unwrap();

        let past = Utc::now() - Duration::seconds(60);
        assert_eq!(repo.mark_invoiced_before(past).await.unwrap(), 0);
    }
}
