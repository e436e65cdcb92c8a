//! PageSnapshot model - an archived capture, written only on content change.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use typed_builder::TypedBuilder;

/// An archived capture. Rows are append-only and deleted only with their
/// page; `(page_id, clean_hash)` makes snapshots logically deduplicated,
/// `(page_id, snapshot_timestamp)` ties each row to one object-store
/// directory.
#[derive(Debug, Clone, FromRow)]
pub struct PageSnapshot {
    pub id: i64,
    pub page_id: i64,
    pub snapshot_timestamp: DateTime<Utc>,
    /// `{url_hash}/{timestamp}/` - artifact directory, relative to the
    /// storage prefix.
    pub oss_path: String,
    pub content_hash: String,
    pub clean_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new snapshot row.
#[derive(Debug, Clone, TypedBuilder)]
pub struct NewPageSnapshot {
    pub page_id: i64,
    pub snapshot_timestamp: DateTime<Utc>,
    pub oss_path: String,
    pub content_hash: String,
    pub clean_hash: String,
}

/// A snapshot joined with its page URL, as handed to the extractor loop.
#[derive(Debug, Clone, FromRow)]
pub struct UnextractedSnapshot {
    #[sqlx(flatten)]
    pub snapshot: PageSnapshot,
    pub url: String,
}

impl PageSnapshot {
    /// Insert a snapshot, collapsing duplicates on `(page_id, clean_hash)`.
    ///
    /// Returns false when an equivalent snapshot already existed; the caller
    /// treats that as success (the blobs for the losing write become
    /// harmless orphans under their own timestamp directory).
    pub async fn insert(conn: &mut PgConnection, new: &NewPageSnapshot) -> Result<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO page_snapshot
                (page_id, snapshot_timestamp, oss_path, content_hash, clean_hash)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (page_id, clean_hash) DO NOTHING
            "#,
        )
        .bind(new.page_id)
        .bind(new.snapshot_timestamp)
        .bind(&new.oss_path)
        .bind(&new.content_hash)
        .bind(&new.clean_hash)
        .execute(conn)
        .await?
        .rows_affected();

        Ok(inserted > 0)
    }

    /// Most recent snapshot for a page, if any.
    pub async fn latest_for_page(pool: &PgPool, page_id: i64) -> Result<Option<PageSnapshot>> {
        let snapshot = sqlx::query_as::<_, PageSnapshot>(
            r#"
            SELECT id, page_id, snapshot_timestamp, oss_path, content_hash,
                   clean_hash, created_at
            FROM page_snapshot
            WHERE page_id = $1
            ORDER BY snapshot_timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(page_id)
        .fetch_optional(pool)
        .await?;

        Ok(snapshot)
    }

    /// Snapshots with no record for the given extractor version, oldest
    /// first. The anti-join keeps the extractor loop idempotent: re-polling
    /// after a crash simply sees the same rows again.
    pub async fn find_unextracted(
        pool: &PgPool,
        extractor_version: &str,
        limit: i64,
    ) -> Result<Vec<UnextractedSnapshot>> {
        let snapshots = sqlx::query_as::<_, UnextractedSnapshot>(
            r#"
            SELECT s.id, s.page_id, s.snapshot_timestamp, s.oss_path,
                   s.content_hash, s.clean_hash, s.created_at,
                   p.url
            FROM page_snapshot s
            JOIN page p ON p.id = s.page_id
            WHERE NOT EXISTS (
                SELECT 1 FROM page_info i
                WHERE i.snapshot_id = s.id
                  AND i.extractor_version = $1
            )
            ORDER BY s.snapshot_timestamp ASC
            LIMIT $2
            "#,
        )
        .bind(extractor_version)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(snapshots)
    }
}
