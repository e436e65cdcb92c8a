//! Extractor process: structured records from archived snapshots.

use std::sync::Arc;

use anyhow::Result;
use extraction::{DomExtractor, Extractor};
use talemon_server::kernel::{storage, ExtractorService, ServiceHost};
use talemon_server::{db, Settings};
use tracing::{info, warn};
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

    if !settings.extractor.enabled {
        warn!("extractor disabled by configuration");
        return Ok(());
    }

    info!(
        app = %settings.general.app_name,
        env = %settings.general.env,
        "starting extractor"
    );

    let pool = db::connect(&settings.database).await?;
    db::migrate(&pool).await?;

    let storage = storage::from_settings(&settings.oss)?;
    let extractor: Arc<dyn Extractor> = Arc::new(DomExtractor::new());

    let service = ExtractorService::new(pool, storage, extractor, settings.extractor.clone());

    ServiceHost::new()
        .with_service(service)
        .run_until_shutdown()
        .await
}
