use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use imgvault_core::models::{AssetRecord, GeoPoint};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::transaction::TransactionGuard;

/// Persistent image records, keyed by hosting id.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Insert every record or none of them. A hosting id that already exists
    /// fails the whole batch with [`StoreError::Duplicate`].
    async fn insert_many(&self, records: &[AssetRecord]) -> StoreResult<()>;

    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<AssetRecord>>;

    /// Returns the number of records removed. Missing ids are ignored.
    async fn delete_by_external_ids(&self, external_ids: &[String]) -> StoreResult<u64>;

    /// Adds `delta` to the access count. Returns false when no record matches.
    async fn increment_count(&self, external_id: &str, delta: i64) -> StoreResult<bool>;

    /// Records whose owner grant is unconfirmed and that were uploaded before
    /// `uploaded_before`, oldest first.
    async fn list_pending_owner(
        &self,
        uploaded_before: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<AssetRecord>>;

    async fn clear_pending_owner(&self, external_ids: &[String]) -> StoreResult<u64>;
}

#[derive(Debug, FromRow)]
struct AssetRow {
    id: Uuid,
    external_id: String,
    filename: String,
    uploaded_at: DateTime<Utc>,
    size: i64,
    longitude: Option<f64>,
    latitude: Option<f64>,
    meta: Json<BTreeMap<String, String>>,
    variants: Json<BTreeMap<String, String>>,
    count: i64,
    pending_owner: Option<String>,
}

impl From<AssetRow> for AssetRecord {
    fn from(row: AssetRow) -> Self {
        let location = match (row.longitude, row.latitude) {
            (Some(longitude), Some(latitude)) => Some(GeoPoint {
                longitude,
                latitude,
            }),
            _ => None,
        };
        AssetRecord {
            id: row.id,
            external_id: row.external_id,
            filename: row.filename,
            uploaded_at: row.uploaded_at,
            size: row.size,
            location,
            meta: row.meta.0,
            variants: row.variants.0,
            count: row.count,
            pending_owner: row.pending_owner,
        }
    }
}

const SELECT_COLUMNS: &str = "id, external_id, filename, uploaded_at, size, longitude, latitude, \
                              meta, variants, count, pending_owner";

/// Repository for image records
#[derive(Clone)]
pub struct AssetRepository {
    pool: PgPool,
}

impl AssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_insert_error(err: sqlx::Error, external_id: &str) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate(external_id.to_string());
            }
        }
        StoreError::Database(err)
    }
}

#[async_trait]
impl AssetStore for AssetRepository {
    #[tracing::instrument(skip(self, records), fields(db.table = "assets", db.operation = "insert", count = records.len()))]
    async fn insert_many(&self, records: &[AssetRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = TransactionGuard::begin(&self.pool, "assets.insert_many").await?;

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO assets (
                    id, external_id, filename, uploaded_at, size,
                    longitude, latitude, meta, variants, count, pending_owner
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(record.id)
            .bind(&record.external_id)
            .bind(&record.filename)
            .bind(record.uploaded_at)
            .bind(record.size)
            .bind(record.location.map(|p| p.longitude))
            .bind(record.location.map(|p| p.latitude))
            .bind(Json(&record.meta))
            .bind(Json(&record.variants))
            .bind(record.count)
            .bind(record.pending_owner.as_deref())
            .execute(&mut **tx)
            .await;

            if let Err(err) = result {
                let err = Self::map_insert_error(err, &record.external_id);
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback after failed insert also failed");
                }
                return Err(err);
            }
        }

        tx.commit().await
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select"))]
    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<AssetRecord>> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "SELECT {} FROM assets WHERE external_id = $1",
            SELECT_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AssetRecord::from))
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "delete"))]
    async fn delete_by_external_ids(&self, external_ids: &[String]) -> StoreResult<u64> {
        if external_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM assets WHERE external_id = ANY($1)")
            .bind(external_ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "update"))]
    async fn increment_count(&self, external_id: &str, delta: i64) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE assets SET count = count + $2 WHERE external_id = $1")
            .bind(external_id)
            .bind(delta)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select"))]
    async fn list_pending_owner(
        &self,
        uploaded_before: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<AssetRecord>> {
        let rows = sqlx::query_as::<_, AssetRow>(&format!(
            r#"
            SELECT {}
            FROM assets
            WHERE pending_owner IS NOT NULL AND uploaded_at < $1
            ORDER BY uploaded_at ASC
            LIMIT $2
            "#,
            SELECT_COLUMNS
        ))
        .bind(uploaded_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AssetRecord::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "update"))]
    async fn clear_pending_owner(&self, external_ids: &[String]) -> StoreResult<u64> {
        if external_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE assets SET pending_owner = NULL WHERE external_id = ANY($1) AND pending_owner IS NOT NULL",
        )
        .bind(external_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
