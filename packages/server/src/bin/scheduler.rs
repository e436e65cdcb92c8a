//! Scheduler process: zombie-lease reclamation.
//!
//! Claiming itself happens inside worker processes; this process only
//! returns stale leases to PENDING, so it is safe (and cheap) to run exactly
//! one of it next to any number of workers.

use anyhow::Result;
use talemon_server::kernel::{Scheduler, ServiceHost};
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

    if !settings.scheduler.enabled {
        warn!("scheduler disabled by configuration");
        return Ok(());
    }

    info!(
        app = %settings.general.app_name,
        env = %settings.general.env,
        "starting scheduler"
    );

    let pool = db::connect(&settings.database).await?;
    db::migrate(&pool).await?;

    let scheduler = Scheduler::new(pool, settings.scheduler.clone(), &settings.worker.rate_limit);

    ServiceHost::new()
        .with_service(scheduler)
        .run_until_shutdown()
        .await
}
