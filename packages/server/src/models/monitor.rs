//! PageMonitor model - the per-attempt audit log.
//!
//! Every graceful worker attempt leaves exactly one row here, whether or not
//! a snapshot was taken; hard crashes leave none (the stale heartbeat is
//! their trace).

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use typed_builder::TypedBuilder;

/// One monitoring attempt.
#[derive(Debug, Clone, FromRow)]
pub struct PageMonitor {
    pub id: i64,
    pub page_id: i64,
    pub monitor_timestamp: DateTime<Utc>,
    pub content_hash: Option<String>,
    pub clean_hash: Option<String>,
    pub change_detected: bool,
    pub http_status: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for an audit row.
#[derive(Debug, Clone, TypedBuilder)]
pub struct NewPageMonitor {
    pub page_id: i64,
    pub monitor_timestamp: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    pub content_hash: Option<String>,
    #[builder(default, setter(strip_option))]
    pub clean_hash: Option<String>,
    #[builder(default)]
    pub change_detected: bool,
    #[builder(default, setter(strip_option))]
    pub http_status: Option<i32>,
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,
}

impl PageMonitor {
    /// Append an audit row. Runs inside the transaction that also releases
    /// the page lease, so an attempt is either fully recorded or not at all.
    pub async fn insert(conn: &mut PgConnection, new: &NewPageMonitor) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO page_monitor
                (page_id, monitor_timestamp, content_hash, clean_hash,
                 change_detected, http_status, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(new.page_id)
        .bind(new.monitor_timestamp)
        .bind(&new.content_hash)
        .bind(&new.clean_hash)
        .bind(new.change_detected)
        .bind(new.http_status)
        .bind(&new.error_message)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Most recent attempts for a page, newest first.
    ///
    /// Operator surface; the pipeline itself only ever appends.
    pub async fn recent_for_page(
        pool: &PgPool,
        page_id: i64,
        limit: i64,
    ) -> Result<Vec<PageMonitor>> {
        let rows = sqlx::query_as::<_, PageMonitor>(
            r#"
            SELECT id, page_id, monitor_timestamp, content_hash, clean_hash,
                   change_detected, http_status, error_message, created_at
            FROM page_monitor
            WHERE page_id = $1
            ORDER BY monitor_timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(page_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_model_an_audit_only_row() {
        let row = NewPageMonitor::builder()
            .page_id(1)
            .monitor_timestamp(Utc::now())
            .http_status(503)
            .error_message("HTTP 503".to_string())
            .build();

        assert!(!row.change_detected);
        assert_eq!(row.content_hash, None);
        assert_eq!(row.clean_hash, None);
        assert_eq!(row.http_status, Some(503));
        assert_eq!(row.error_message.as_deref(), Some("HTTP 503"));
    }
}
