//! Capture worker service.
//!
//! Claims leased pages through the scheduler, runs the capture pipeline
//! under a concurrency bound, and commits each outcome in a single
//! transaction: the monitor audit row, the snapshot row when content
//! changed, and the page release all land atomically.
//!
//! While a job is in flight a heartbeat task refreshes the lease; the write
//! is conditional on still being PROCESSING so a reclaimed job can never
//! re-acquire its lease. A failure after the gate (storage, database) simply
//! abandons the job - the heartbeat stops and the reaper returns the page to
//! PENDING after the zombie timeout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WorkerSettings;
use crate::kernel::scheduler::Scheduler;
use crate::kernel::service::Service;
use crate::kernel::snapshot::{SnapshotOutcome, SnapshotService};
use crate::models::{NewPageMonitor, NewPageSnapshot, Page, PageMonitor, PageSnapshot};

pub struct Worker {
    pool: PgPool,
    scheduler: Arc<Scheduler>,
    snapshots: Arc<SnapshotService>,
    settings: WorkerSettings,
    worker_id: String,
}

impl Worker {
    pub fn new(
        pool: PgPool,
        scheduler: Arc<Scheduler>,
        snapshots: Arc<SnapshotService>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            pool,
            scheduler,
            snapshots,
            settings,
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }

    /// Run one leased job to completion, heartbeating along the way.
    async fn process_page(&self, page: Page) {
        let heartbeat_token = CancellationToken::new();
        let heartbeat = tokio::spawn(heartbeat_loop(
            self.pool.clone(),
            page.id,
            self.settings.heartbeat_interval(),
            heartbeat_token.clone(),
        ));

        let result = self.check_page(&page).await;

        heartbeat_token.cancel();
        let _ = heartbeat.await;

        match result {
            Ok(outcome) => debug!(page_id = page.id, url = %page.url, outcome, "check committed"),
            Err(e) => warn!(
                page_id = page.id,
                url = %page.url,
                error = %e,
                "check failed before commit; lease left for the reaper"
            ),
        }
    }

    async fn check_page(&self, page: &Page) -> Result<&'static str> {
        let outcome = self
            .snapshots
            .capture(&page.url, page.last_clean_hash.as_deref())
            .await?;
        self.commit(page, outcome).await
    }

    /// Persist one attempt atomically.
    async fn commit(&self, page: &Page, outcome: SnapshotOutcome) -> Result<&'static str> {
        let mut tx = self.pool.begin().await?;

        let label = match outcome {
            SnapshotOutcome::Failed {
                timestamp,
                http_status,
                error_message,
            } => {
                PageMonitor::insert(
                    &mut *tx,
                    &NewPageMonitor {
                        page_id: page.id,
                        monitor_timestamp: timestamp,
                        content_hash: None,
                        clean_hash: None,
                        change_detected: false,
                        http_status,
                        error_message,
                    },
                )
                .await?;
                Page::release_after_failure(&mut *tx, page.id).await?;
                "audit-only"
            }

            SnapshotOutcome::Unchanged {
                timestamp,
                http_status,
                content_hash,
                clean_hash,
            } => {
                PageMonitor::insert(
                    &mut *tx,
                    &NewPageMonitor {
                        page_id: page.id,
                        monitor_timestamp: timestamp,
                        content_hash: Some(content_hash),
                        clean_hash: Some(clean_hash.clone()),
                        change_detected: false,
                        http_status: Some(http_status),
                        error_message: None,
                    },
                )
                .await?;
                Page::complete(&mut *tx, page.id, &clean_hash).await?;
                "unchanged"
            }

            SnapshotOutcome::Changed {
                timestamp,
                http_status,
                content_hash,
                clean_hash,
                oss_path,
            } => {
                let inserted = PageSnapshot::insert(
                    &mut *tx,
                    &NewPageSnapshot {
                        page_id: page.id,
                        snapshot_timestamp: timestamp,
                        oss_path,
                        content_hash: content_hash.clone(),
                        clean_hash: clean_hash.clone(),
                    },
                )
                .await?;
                if !inserted {
                    debug!(
                        page_id = page.id,
                        clean_hash, "snapshot already archived; new blobs stay as orphans"
                    );
                }
                PageMonitor::insert(
                    &mut *tx,
                    &NewPageMonitor {
                        page_id: page.id,
                        monitor_timestamp: timestamp,
                        content_hash: Some(content_hash),
                        clean_hash: Some(clean_hash.clone()),
                        change_detected: true,
                        http_status: Some(http_status),
                        error_message: None,
                    },
                )
                .await?;
                Page::complete(&mut *tx, page.id, &clean_hash).await?;
                "changed"
            }
        };

        tx.commit().await?;
        Ok(label)
    }
}

/// Lease keep-alive. Stops by cancellation, or on its own once the lease is
/// observed gone.
async fn heartbeat_loop(pool: PgPool, page_id: i64, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await; // skip the immediate tick

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                match Page::heartbeat(&pool, page_id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(page_id, "lease no longer held; stopping heartbeat");
                        break;
                    }
                    Err(e) => warn!(page_id, error = %e, "heartbeat failed"),
                }
            }
        }
    }
}

#[async_trait]
impl Service for Worker {
    fn name(&self) -> &'static str {
        "worker"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(
            worker_id = %self.worker_id,
            concurrency = self.settings.concurrency,
            "worker starting"
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));
        let worker = &*self;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let batch = match worker.scheduler.next_batch().await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "failed to claim pages");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(worker.settings.poll_interval()) => {}
                }
                continue;
            }

            debug!(count = batch.len(), "claimed pages");

            let tasks = batch.into_iter().map(|page| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return;
                    };
                    worker.process_page(page).await;
                }
            });
            futures::future::join_all(tasks).await;
        }

        info!(worker_id = %self.worker_id, "worker stopped");
        Ok(())
    }
}
