//! Capture worker process.
//!
//! Claims due pages, drives the browser sidecar, fingerprints content, and
//! archives snapshots on change. Scale out by running more of these.

use std::sync::Arc;

use anyhow::Result;
use talemon_server::kernel::browser::BrowserDriver;
use talemon_server::kernel::{
    storage, CleanHasher, RemoteBrowser, Scheduler, ServiceHost, SnapshotService, Worker,
};
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

    if !settings.worker.enabled {
        warn!("worker disabled by configuration");
        return Ok(());
    }

    info!(
        app = %settings.general.app_name,
        env = %settings.general.env,
        browser = %settings.worker.browser.endpoint,
        "starting worker"
    );

    let pool = db::connect(&settings.database).await?;
    db::migrate(&pool).await?;

    let storage = storage::from_settings(&settings.oss)?;
    let browser: Arc<dyn BrowserDriver> = Arc::new(RemoteBrowser::new(&settings.worker.browser)?);
    let hasher = Arc::new(CleanHasher::new(&settings.hasher));
    let snapshots = Arc::new(SnapshotService::new(
        browser,
        storage,
        hasher,
        settings.oss.path.clone(),
        settings.worker.page_timeout(),
    ));
    let scheduler = Arc::new(Scheduler::new(
        pool.clone(),
        settings.scheduler.clone(),
        &settings.worker.rate_limit,
    ));

    let worker = Worker::new(pool, scheduler, snapshots, settings.worker.clone());

    ServiceHost::new()
        .with_service(worker)
        .run_until_shutdown()
        .await
}
