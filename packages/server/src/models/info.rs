//! PageInfo model - an extractor's output for a snapshot.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

/// A structured record derived from a snapshot, unique per
/// `(snapshot_id, extractor_version)`.
#[derive(Debug, Clone, FromRow)]
pub struct PageInfo {
    pub id: i64,
    pub snapshot_id: i64,
    pub extractor_version: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl PageInfo {
    /// Store an extracted record.
    ///
    /// Concurrent extractor replicas race here by design; the unique
    /// constraint collapses them and the loser sees false.
    pub async fn insert(
        pool: &PgPool,
        snapshot_id: i64,
        extractor_version: &str,
        data: &serde_json::Value,
    ) -> Result<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO page_info (snapshot_id, extractor_version, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (snapshot_id, extractor_version) DO NOTHING
            "#,
        )
        .bind(snapshot_id)
        .bind(extractor_version)
        .bind(data)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(inserted > 0)
    }

    /// Records stored for a snapshot, across extractor versions.
    pub async fn for_snapshot(pool: &PgPool, snapshot_id: i64) -> Result<Vec<PageInfo>> {
        let rows = sqlx::query_as::<_, PageInfo>(
            r#"
            SELECT id, snapshot_id, extractor_version, data, created_at
            FROM page_info
            WHERE snapshot_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(snapshot_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}
