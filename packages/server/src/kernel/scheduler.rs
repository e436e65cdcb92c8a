//! Scheduling: zombie reclamation and lease grants.
//!
//! Claiming happens in one transaction per round: select due candidates with
//! non-blocking row locks, admit per domain, and transition the admitted
//! rows to PROCESSING. Rejected candidates stay PENDING and their locks
//! release at commit, so they are simply reconsidered next round.
//!
//! Workers embed `next_batch` directly; the standalone `scheduler` process
//! only runs the reaper loop so it never leases work it cannot execute.

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{RateLimitSettings, SchedulerSettings};
use crate::kernel::rate_limit::DomainRateLimiter;
use crate::kernel::service::Service;
use crate::models::Page;

pub struct Scheduler {
    pool: PgPool,
    settings: SchedulerSettings,
    limiter: Mutex<DomainRateLimiter>,
}

impl Scheduler {
    pub fn new(pool: PgPool, settings: SchedulerSettings, rate_limit: &RateLimitSettings) -> Self {
        Self {
            pool,
            settings,
            limiter: Mutex::new(DomainRateLimiter::new(rate_limit)),
        }
    }

    /// Return stale PROCESSING rows to PENDING in one set-based statement.
    pub async fn reap_zombies(&self) -> Result<u64> {
        Page::reap_zombies(&self.pool, self.settings.zombie_timeout_seconds as f64).await
    }

    /// Claim the next batch of leased pages for a worker.
    pub async fn next_batch(&self) -> Result<Vec<Page>> {
        let mut tx = self.pool.begin().await?;

        let candidates = Page::select_due_for_update(&mut *tx, self.settings.batch_size).await?;
        if candidates.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let admitted: Vec<i64> = {
            let now = Instant::now();
            let mut limiter = self.limiter.lock().await;
            limiter.evict_idle(now);
            candidates
                .iter()
                .filter(|page| limiter.admit(&page.domain, now))
                .map(|page| page.id)
                .collect()
        };

        let rejected = candidates.len() - admitted.len();
        if rejected > 0 {
            debug!(rejected, "candidates over domain budget stay pending");
        }
        if admitted.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let leased = Page::grant_lease(&mut *tx, &admitted).await?;
        tx.commit().await?;

        Ok(leased)
    }
}

#[async_trait]
impl Service for Scheduler {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(
            zombie_timeout_seconds = self.settings.zombie_timeout_seconds,
            "scheduler starting"
        );

        let mut interval = tokio::time::interval(self.settings.zombie_check_interval());
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    match self.reap_zombies().await {
                        Ok(0) => debug!("no stale leases"),
                        Ok(reaped) => warn!(reaped, "reclaimed stale leases"),
                        Err(e) => error!(error = %e, "zombie reclamation failed"),
                    }
                }
            }
        }

        info!("scheduler stopped");
        Ok(())
    }
}
