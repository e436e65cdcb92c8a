//! Page model - a monitored URL and its scheduling state.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::types::PgInterval;
use sqlx::{FromRow, PgConnection, PgPool};

/// Page lifecycle status.
///
/// `PROCESSING` means a worker holds the lease (and keeps `heartbeat_at`
/// fresh); `PAUSED` pages are never selected by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "page_status", rename_all = "UPPERCASE")]
pub enum PageStatus {
    Pending,
    Processing,
    Paused,
}

const PAGE_COLUMNS: &str = "id, url, hash, domain, status, last_clean_hash, last_check_at, \
     next_schedule_at, heartbeat_at, check_interval, created_at, updated_at";

/// A monitored URL.
///
/// Rows are seeded externally and never deleted by the pipeline; the
/// scheduler and the leasing worker are the only writers, and the reclaim
/// path only touches expired leases.
#[derive(Debug, Clone, FromRow)]
pub struct Page {
    pub id: i64,
    pub url: String,
    /// sha1(url), 40 lowercase hex chars; also the object-store prefix.
    pub hash: String,
    pub domain: String,
    pub status: PageStatus,
    pub last_clean_hash: Option<String>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub next_schedule_at: DateTime<Utc>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub check_interval: PgInterval,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    /// Register a URL for monitoring. Returns `None` when the URL is already
    /// registered.
    pub async fn create(
        pool: &PgPool,
        url: &str,
        hash: &str,
        domain: &str,
        check_interval_seconds: f64,
    ) -> Result<Option<Page>> {
        let page = sqlx::query_as::<_, Page>(&format!(
            r#"
            INSERT INTO page (url, hash, domain, check_interval)
            VALUES ($1, $2, $3, make_interval(secs => $4))
            ON CONFLICT (url) DO NOTHING
            RETURNING {PAGE_COLUMNS}
            "#,
        ))
        .bind(url)
        .bind(hash)
        .bind(domain)
        .bind(check_interval_seconds)
        .fetch_optional(pool)
        .await?;

        Ok(page)
    }

    /// Select due candidates with non-blocking row locks.
    ///
    /// Must run inside the transaction that will grant leases: the locks are
    /// what keeps concurrent claimers from seeing the same rows. Ordering is
    /// deliberately random to avoid domain clustering.
    pub async fn select_due_for_update(conn: &mut PgConnection, limit: i64) -> Result<Vec<Page>> {
        let pages = sqlx::query_as::<_, Page>(&format!(
            r#"
            SELECT {PAGE_COLUMNS}
            FROM page
            WHERE status = 'PENDING'
              AND next_schedule_at <= NOW()
            ORDER BY random()
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        ))
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(pages)
    }

    /// Transition admitted candidates to PROCESSING with a fresh heartbeat.
    pub async fn grant_lease(conn: &mut PgConnection, ids: &[i64]) -> Result<Vec<Page>> {
        let pages = sqlx::query_as::<_, Page>(&format!(
            r#"
            UPDATE page
            SET status = 'PROCESSING',
                heartbeat_at = NOW(),
                updated_at = NOW()
            WHERE id = ANY($1)
            RETURNING {PAGE_COLUMNS}
            "#,
        ))
        .bind(ids)
        .fetch_all(conn)
        .await?;

        Ok(pages)
    }

    /// Reclaim leases whose heartbeat went stale. Set-based and idempotent.
    pub async fn reap_zombies(pool: &PgPool, timeout_seconds: f64) -> Result<u64> {
        let reaped = sqlx::query(
            r#"
            UPDATE page
            SET status = 'PENDING',
                heartbeat_at = NULL,
                updated_at = NOW()
            WHERE status = 'PROCESSING'
              AND heartbeat_at < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(timeout_seconds)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(reaped)
    }

    /// Refresh the lease heartbeat.
    ///
    /// Conditional on still holding the lease so a reclaimed job cannot
    /// re-acquire it; returns false when the lease is gone.
    pub async fn heartbeat(pool: &PgPool, id: i64) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE page
            SET heartbeat_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'PROCESSING'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    /// Release the lease after a completed check, recording the observed
    /// clean hash and advancing the schedule by the page's check interval.
    pub async fn complete(conn: &mut PgConnection, id: i64, clean_hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE page
            SET status = 'PENDING',
                heartbeat_at = NULL,
                last_check_at = NOW(),
                last_clean_hash = $2,
                next_schedule_at = NOW() + check_interval,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(clean_hash)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Release the lease after an audit-only attempt (HTTP gate or
    /// fingerprint failure). The page stays scheduled; `last_clean_hash` and
    /// `last_check_at` are untouched.
    pub async fn release_after_failure(conn: &mut PgConnection, id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE page
            SET status = 'PENDING',
                heartbeat_at = NULL,
                next_schedule_at = NOW() + check_interval,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Operator pause: the page drops out of scheduling until resumed.
    pub async fn pause(pool: &PgPool, url: &str) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE page
            SET status = 'PAUSED',
                heartbeat_at = NULL,
                updated_at = NOW()
            WHERE url = $1
            "#,
        )
        .bind(url)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    /// Operator resume: back to PENDING, eligible immediately.
    pub async fn resume(pool: &PgPool, url: &str) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE page
            SET status = 'PENDING',
                heartbeat_at = NULL,
                updated_at = NOW()
            WHERE url = $1 AND status = 'PAUSED'
            "#,
        )
        .bind(url)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    /// Look up a page by URL.
    pub async fn find_by_url(pool: &PgPool, url: &str) -> Result<Option<Page>> {
        let page = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM page WHERE url = $1",
        ))
        .bind(url)
        .fetch_optional(pool)
        .await?;

        Ok(page)
    }
}
