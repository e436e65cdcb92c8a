//! Extractor service: derive structured records from archived snapshots.
//!
//! Poll-driven and lease-free. Each tick anti-joins for snapshots that have
//! no record for the configured extractor version, downloads their cleaned
//! DOM, runs the extractor, and inserts with `ON CONFLICT DO NOTHING`.
//! At-least-once with constraint-based dedup: crashes and concurrent
//! replicas are both safe, they just re-observe the same rows.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use extraction::{Extractor, SnapshotDocument};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ExtractorSettings;
use crate::kernel::service::Service;
use crate::kernel::snapshot::DOM_FILE;
use crate::kernel::storage::StorageBackend;
use crate::models::{PageInfo, PageSnapshot, UnextractedSnapshot};

pub struct ExtractorService {
    pool: PgPool,
    storage: Arc<dyn StorageBackend>,
    extractor: Arc<dyn Extractor>,
    settings: ExtractorSettings,
}

impl ExtractorService {
    pub fn new(
        pool: PgPool,
        storage: Arc<dyn StorageBackend>,
        extractor: Arc<dyn Extractor>,
        settings: ExtractorSettings,
    ) -> Self {
        Self {
            pool,
            storage,
            extractor,
            settings,
        }
    }

    /// Extract one snapshot. Returns false when another run got there first.
    async fn process(&self, item: &UnextractedSnapshot) -> Result<bool> {
        let dom_path = format!("{}{DOM_FILE}", item.snapshot.oss_path);
        let bytes = self
            .storage
            .read(&dom_path)
            .await
            .with_context(|| format!("failed to fetch {dom_path}"))?;
        let html = String::from_utf8(bytes).context("dom.html is not valid UTF-8")?;

        let doc = SnapshotDocument {
            url: item.url.clone(),
            html,
            captured_at: item.snapshot.snapshot_timestamp,
        };
        let record = self.extractor.extract(&doc).await?;

        PageInfo::insert(
            &self.pool,
            item.snapshot.id,
            self.extractor.version(),
            &record,
        )
        .await
    }
}

#[async_trait]
impl Service for ExtractorService {
    fn name(&self) -> &'static str {
        "extractor"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(
            extractor = self.extractor.name(),
            version = self.extractor.version(),
            batch_size = self.settings.batch_size,
            "extractor starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let batch = match PageSnapshot::find_unextracted(
                &self.pool,
                self.extractor.version(),
                self.settings.batch_size,
            )
            .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "failed to query unextracted snapshots");
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
                    _ = tokio::time::sleep(self.settings.poll_interval()) => {}
                }
                continue;
            }

            debug!(count = batch.len(), "found unextracted snapshots");

            for item in &batch {
                if shutdown.is_cancelled() {
                    break;
                }
                match self.process(item).await {
                    Ok(true) => debug!(snapshot_id = item.snapshot.id, "record stored"),
                    Ok(false) => {
                        debug!(snapshot_id = item.snapshot.id, "record already present")
                    }
                    Err(e) => warn!(
                        snapshot_id = item.snapshot.id,
                        error = %e,
                        "extraction failed; will retry next tick"
                    ),
                }
            }
        }

        info!("extractor stopped");
        Ok(())
    }
}
