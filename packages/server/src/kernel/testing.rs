//! Test doubles for the external collaborators.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::kernel::browser::{BrowserDriver, BrowserError, PageCapture};
use crate::kernel::storage::StorageBackend;

/// Browser driver with canned per-URL captures and a call log.
#[derive(Default)]
pub struct MockBrowser {
    captures: RwLock<HashMap<String, Result<PageCapture, BrowserError>>>,
    calls: RwLock<Vec<String>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a 200 response with the given HTML (and placeholder artifacts).
    pub fn add_page(&self, url: impl Into<String>, html: impl Into<String>) {
        self.add_capture(
            url,
            PageCapture {
                http_status: 200,
                html: html.into().into_bytes(),
                mhtml: b"mock-mhtml".to_vec(),
                screenshot: b"mock-png".to_vec(),
            },
        );
    }

    /// Serve a non-2xx navigation result.
    pub fn add_status(&self, url: impl Into<String>, http_status: u16) {
        self.add_capture(
            url,
            PageCapture {
                http_status,
                html: Vec::new(),
                mhtml: Vec::new(),
                screenshot: Vec::new(),
            },
        );
    }

    pub fn add_capture(&self, url: impl Into<String>, capture: PageCapture) {
        self.captures
            .write()
            .unwrap()
            .insert(url.into(), Ok(capture));
    }

    /// Make navigation of a URL fail outright.
    pub fn add_failure(&self, url: impl Into<String>, error: BrowserError) {
        self.captures
            .write()
            .unwrap()
            .insert(url.into(), Err(error));
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.add_page(url, html);
        self
    }

    /// URLs captured so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn capture(&self, url: &str, _timeout: Duration) -> Result<PageCapture, BrowserError> {
        self.calls.write().unwrap().push(url.to_string());
        match self.captures.read().unwrap().get(url) {
            Some(Ok(capture)) => Ok(capture.clone()),
            Some(Err(error)) => Err(error.clone()),
            None => Err(BrowserError::Transport(format!(
                "no canned capture for {url}"
            ))),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// In-memory object store.
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    /// Stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.read().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn save(&self, path: &str, content: &[u8]) -> Result<String> {
        self.objects
            .write()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        Ok(format!("mem://{path}"))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.objects.read().unwrap().contains_key(path))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        match self.objects.read().unwrap().get(path) {
            Some(content) => Ok(content.clone()),
            None => bail!("no object at {path}"),
        }
    }
}
