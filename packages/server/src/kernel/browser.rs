//! Browser driver seam.
//!
//! Captures happen in a headless-Chromium sidecar that keeps a persistent
//! profile with ad-block and cookie-consent extensions installed, hides the
//! usual automation fingerprint, and can export MHTML through the debugging
//! protocol. This module only speaks its HTTP capture API: one navigation in,
//! the full artifact set out.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::BrowserSettings;

/// Slack added on top of the page timeout for the sidecar round-trip.
const REQUEST_GRACE: Duration = Duration::from_secs(10);

/// Capture failures, classified for the worker's HTTP gate: a completed
/// navigation carries its status inside [`PageCapture`]; these errors mean
/// no status was observed at all.
#[derive(Debug, Clone, Error)]
pub enum BrowserError {
    #[error("navigation timed out after {0:?}")]
    Timeout(Duration),

    #[error("browser transport error: {0}")]
    Transport(String),

    #[error("capture protocol error: {0}")]
    Protocol(String),
}

/// Everything one navigation produces.
#[derive(Debug, Clone)]
pub struct PageCapture {
    /// Final HTTP status of the navigation.
    pub http_status: u16,
    /// Raw response HTML bytes as received.
    pub html: Vec<u8>,
    /// Single-file web archive exported via the debugging protocol.
    pub mhtml: Vec<u8>,
    /// Full-page PNG screenshot.
    pub screenshot: Vec<u8>,
}

impl PageCapture {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }
}

/// Drives one page capture with a bounded timeout.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn capture(&self, url: &str, timeout: Duration) -> Result<PageCapture, BrowserError>;

    /// Driver name for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}

#[derive(Debug, Serialize)]
struct CaptureRequest<'a> {
    url: &'a str,
    timeout_ms: u64,
    full_page: bool,
    headless: bool,
    user_data_dir: &'a str,
    extensions_dir: &'a str,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    status: u16,
    /// base64
    html: String,
    /// base64
    mhtml: String,
    /// base64
    screenshot: String,
}

impl CaptureResponse {
    fn into_capture(self) -> Result<PageCapture, BrowserError> {
        let decode = |field: &str, value: &str| {
            BASE64
                .decode(value)
                .map_err(|e| BrowserError::Protocol(format!("invalid base64 in {field}: {e}")))
        };

        Ok(PageCapture {
            http_status: self.status,
            html: decode("html", &self.html)?,
            mhtml: decode("mhtml", &self.mhtml)?,
            screenshot: decode("screenshot", &self.screenshot)?,
        })
    }
}

/// HTTP client for the capture sidecar.
pub struct RemoteBrowser {
    client: reqwest::Client,
    settings: BrowserSettings,
}

impl RemoteBrowser {
    pub fn new(settings: &BrowserSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build browser HTTP client")?;

        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    fn capture_url(&self) -> String {
        format!("{}/capture", self.settings.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl BrowserDriver for RemoteBrowser {
    async fn capture(&self, url: &str, timeout: Duration) -> Result<PageCapture, BrowserError> {
        let request = CaptureRequest {
            url,
            timeout_ms: timeout.as_millis() as u64,
            full_page: true,
            headless: self.settings.headless,
            user_data_dir: &self.settings.user_data_dir,
            extensions_dir: &self.settings.extensions_dir,
        };

        let response = self
            .client
            .post(self.capture_url())
            .timeout(timeout + REQUEST_GRACE)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BrowserError::Timeout(timeout)
                } else {
                    BrowserError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrowserError::Protocol(format!(
                "capture sidecar returned {status}: {body}"
            )));
        }

        let payload: CaptureResponse = response
            .json()
            .await
            .map_err(|e| BrowserError::Protocol(format!("invalid capture response: {e}")))?;

        let capture = payload.into_capture()?;
        debug!(url, http_status = capture.http_status, "captured page");
        Ok(capture)
    }

    fn name(&self) -> &str {
        "remote"
    }
}
