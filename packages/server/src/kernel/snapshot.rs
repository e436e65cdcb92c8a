//! The capture pipeline: navigate, gate, fingerprint, archive.
//!
//! Produces a typed outcome for the worker to commit. Artifact uploads
//! always complete before this function returns a `Changed` outcome, which
//! is what keeps object-store writes ahead of the database rows that
//! reference them.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::OssPathSettings;
use crate::kernel::browser::{BrowserDriver, PageCapture};
use crate::kernel::hasher::CleanHasher;
use crate::kernel::storage::{generate_path, StorageBackend};

/// Artifact file names within a snapshot directory.
pub const DOM_FILE: &str = "dom.html";
pub const SOURCE_FILE: &str = "source.html";
pub const MHTML_FILE: &str = "page.mhtml";
pub const SCREENSHOT_FILE: &str = "screenshot.png";

/// Result of one capture attempt.
#[derive(Debug, Clone)]
pub enum SnapshotOutcome {
    /// Navigation yielded no usable content (non-2xx, browser error, or an
    /// undecodable body). Audit-only; nothing was archived.
    Failed {
        timestamp: DateTime<Utc>,
        http_status: Option<i32>,
        error_message: Option<String>,
    },

    /// Content fingerprint matches the last archived state.
    Unchanged {
        timestamp: DateTime<Utc>,
        http_status: i32,
        content_hash: String,
        clean_hash: String,
    },

    /// Content changed (or this is the first capture); the full artifact set
    /// was uploaded under `oss_path`.
    Changed {
        timestamp: DateTime<Utc>,
        http_status: i32,
        content_hash: String,
        clean_hash: String,
        oss_path: String,
    },
}

/// Captures page snapshots:
///
/// - `dom.html`: cleaned DOM, as used for fingerprinting
/// - `source.html`: raw response
/// - `page.mhtml`: single-file web archive
/// - `screenshot.png`: full-page visual evidence
pub struct SnapshotService {
    browser: Arc<dyn BrowserDriver>,
    storage: Arc<dyn StorageBackend>,
    hasher: Arc<CleanHasher>,
    path_settings: OssPathSettings,
    page_timeout: Duration,
}

impl SnapshotService {
    pub fn new(
        browser: Arc<dyn BrowserDriver>,
        storage: Arc<dyn StorageBackend>,
        hasher: Arc<CleanHasher>,
        path_settings: OssPathSettings,
        page_timeout: Duration,
    ) -> Self {
        Self {
            browser,
            storage,
            hasher,
            path_settings,
            page_timeout,
        }
    }

    /// Capture a URL and decide persistence against the last clean hash.
    ///
    /// Gate failures come back as `Failed` outcomes, not errors; an `Err`
    /// means a post-gate collaborator (storage) failed and the attempt must
    /// not be recorded.
    pub async fn capture(
        &self,
        url: &str,
        last_clean_hash: Option<&str>,
    ) -> Result<SnapshotOutcome> {
        let timestamp = Utc::now();

        let capture = match self.browser.capture(url, self.page_timeout).await {
            Ok(capture) => capture,
            Err(e) => {
                warn!(url, error = %e, "navigation failed");
                return Ok(SnapshotOutcome::Failed {
                    timestamp,
                    http_status: None,
                    error_message: Some(e.to_string()),
                });
            }
        };

        let http_status = capture.http_status as i32;
        if !capture.is_success() {
            warn!(url, http_status, "navigation returned an error status");
            return Ok(SnapshotOutcome::Failed {
                timestamp,
                http_status: Some(http_status),
                error_message: Some(format!("HTTP {}", capture.http_status)),
            });
        }

        let PageCapture {
            html,
            mhtml,
            screenshot,
            ..
        } = capture;

        let fingerprint = match self.hasher.fingerprint(&html) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!(url, error = %e, "fingerprinting failed");
                return Ok(SnapshotOutcome::Failed {
                    timestamp,
                    http_status: Some(http_status),
                    error_message: Some(e.to_string()),
                });
            }
        };

        if last_clean_hash == Some(fingerprint.clean_hash.as_str()) {
            info!(url, "no change detected");
            return Ok(SnapshotOutcome::Unchanged {
                timestamp,
                http_status,
                content_hash: fingerprint.content_hash,
                clean_hash: fingerprint.clean_hash,
            });
        }

        // Valid UTF-8 here: fingerprinting already decoded it.
        let source_html = String::from_utf8(html).context("capture body is not valid UTF-8")?;
        let cleaned_dom = self.hasher.cleaned_dom(&source_html);
        let oss_path = generate_path(&self.path_settings, url, timestamp);

        self.storage
            .save(&format!("{oss_path}{DOM_FILE}"), cleaned_dom.as_bytes())
            .await?;
        self.storage
            .save(&format!("{oss_path}{SOURCE_FILE}"), source_html.as_bytes())
            .await?;
        self.storage
            .save(&format!("{oss_path}{MHTML_FILE}"), &mhtml)
            .await?;
        self.storage
            .save(&format!("{oss_path}{SCREENSHOT_FILE}"), &screenshot)
            .await?;

        info!(url, oss_path, "snapshot archived");
        Ok(SnapshotOutcome::Changed {
            timestamp,
            http_status,
            content_hash: fingerprint.content_hash,
            clean_hash: fingerprint.clean_hash,
            oss_path,
        })
    }
}
