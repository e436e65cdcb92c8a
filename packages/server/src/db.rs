//! Database pool construction and embedded migrations.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::DatabaseSettings;

/// Connect to Postgres using the configured pool size.
///
/// Connectivity failures here are fatal to the calling process.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool> {
    let url = settings.url()?;
    let pool = PgPoolOptions::new()
        .max_connections(settings.pool_size)
        .connect(&url)
        .await
        .context("failed to connect to database")?;

    info!(pool_size = settings.pool_size, "database pool ready");
    Ok(pool)
}

/// Apply pending schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    info!("database schema up to date");
    Ok(())
}
