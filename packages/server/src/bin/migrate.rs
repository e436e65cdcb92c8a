//! Apply database migrations and exit.

use anyhow::Result;
use talemon_server::{db, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load(None)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.general.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let pool = db::connect(&settings.database).await?;
    db::migrate(&pool).await?;
    Ok(())
}
