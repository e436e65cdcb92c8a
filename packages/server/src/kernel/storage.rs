//! Object storage backends.
//!
//! Snapshot artifacts live under content-addressed directories:
//! `{url_hash}/{timestamp}/` where `url_hash = sha1(url)` and the timestamp
//! is the capture instant in UTC. The store is append-only; uploads always
//! complete before the database rows that reference them are written, so the
//! set of referenced paths is a subset of the paths present here (orphans
//! from crashed workers are harmless).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::{debug, info};

use crate::config::{OssPathSettings, OssSettings};
use crate::kernel::hasher::sha1_hex;

type HmacSha1 = Hmac<Sha1>;

/// Append-only blob repository keyed by hierarchical path.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store content, returning the full path/URL of the saved object.
    async fn save(&self, path: &str, content: &[u8]) -> Result<String>;

    /// Check whether an object exists at the given path.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Read an object's content.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
}

/// Render the artifact directory for a capture.
pub fn generate_path(settings: &OssPathSettings, url: &str, timestamp: DateTime<Utc>) -> String {
    let url_hash = sha1_hex(url.as_bytes());
    let ts = timestamp.format(&settings.timestamp_format).to_string();
    settings
        .template
        .replace("{url_hash}", &url_hash)
        .replace("{timestamp}", &ts)
}

/// Pick the backend from configuration: OSS when credentials are present,
/// the local filesystem otherwise.
pub fn from_settings(settings: &OssSettings) -> Result<Arc<dyn StorageBackend>> {
    if settings.has_credentials() {
        info!(
            bucket = %settings.bucket,
            endpoint = %settings.endpoint,
            "using OSS object storage"
        );
        Ok(Arc::new(OssStorage::new(settings.clone())?))
    } else {
        info!(dir = %settings.local_dir, "no OSS credentials; using local object storage");
        Ok(Arc::new(LocalStorage::new(&settings.local_dir)))
    }
}

/// Filesystem storage for development and tests.
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn save(&self, path: &str, content: &[u8]) -> Result<String> {
        let full_path = self.base_dir.join(path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&full_path, content)
            .await
            .with_context(|| format!("failed to write {}", full_path.display()))?;

        debug!(bytes = content.len(), path = %full_path.display(), "saved object");
        Ok(full_path.display().to_string())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.base_dir.join(path)).await?)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_dir.join(path);
        tokio::fs::read(&full_path)
            .await
            .with_context(|| format!("failed to read {}", full_path.display()))
    }
}

/// Aliyun-compatible OSS backend over plain REST.
pub struct OssStorage {
    client: reqwest::Client,
    settings: OssSettings,
}

impl OssStorage {
    pub fn new(settings: OssSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.upload_timeout())
            .build()
            .context("failed to build OSS HTTP client")?;

        Ok(Self { client, settings })
    }

    fn object_key(&self, path: &str) -> String {
        let prefix = self.settings.prefix.trim_matches('/');
        if prefix.is_empty() {
            path.to_string()
        } else {
            format!("{prefix}/{path}")
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}.{}/{}",
            self.settings.bucket, self.settings.endpoint, key
        )
    }

    /// `Authorization: OSS key:signature` over the canonical request string.
    fn authorization(&self, verb: &str, content_type: &str, date: &str, key: &str) -> String {
        let canonical = format!(
            "{verb}\n\n{content_type}\n{date}\n/{}/{key}",
            self.settings.bucket
        );
        let mut mac = HmacSha1::new_from_slice(self.settings.access_key_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(canonical.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());
        format!("OSS {}:{}", self.settings.access_key_id, signature)
    }

    fn http_date() -> String {
        Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }
}

fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".html") {
        "text/html"
    } else if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".mhtml") {
        "multipart/related"
    } else {
        "application/octet-stream"
    }
}

#[async_trait]
impl StorageBackend for OssStorage {
    async fn save(&self, path: &str, content: &[u8]) -> Result<String> {
        let key = self.object_key(path);
        let date = Self::http_date();
        let content_type = content_type_for(path);

        let response = self
            .client
            .put(self.object_url(&key))
            .header("Authorization", self.authorization("PUT", content_type, &date, &key))
            .header("Date", date)
            .header("Content-Type", content_type)
            .body(content.to_vec())
            .send()
            .await
            .with_context(|| format!("OSS PUT failed for {key}"))?;

        if !response.status().is_success() {
            bail!("OSS PUT for {key} returned {}", response.status());
        }

        let oss_url = format!("oss://{}/{}", self.settings.bucket, key);
        debug!(bytes = content.len(), url = %oss_url, "saved object");
        Ok(oss_url)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let key = self.object_key(path);
        let date = Self::http_date();

        let response = self
            .client
            .head(self.object_url(&key))
            .header("Authorization", self.authorization("HEAD", "", &date, &key))
            .header("Date", date)
            .send()
            .await
            .with_context(|| format!("OSS HEAD failed for {key}"))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => bail!("OSS HEAD for {key} returned {status}"),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let key = self.object_key(path);
        let date = Self::http_date();

        let response = self
            .client
            .get(self.object_url(&key))
            .header("Authorization", self.authorization("GET", "", &date, &key))
            .header("Date", date)
            .send()
            .await
            .with_context(|| format!("OSS GET failed for {key}"))?;

        if !response.status().is_success() {
            bail!("OSS GET for {key} returned {}", response.status());
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn path_follows_template_and_timestamp_format() {
        let settings = OssPathSettings::default();
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 6, 7, 8).unwrap();
        let url = "https://example.com/a";

        let path = generate_path(&settings, url, ts);

        assert_eq!(path, format!("{}/240305.060708/", sha1_hex(url.as_bytes())));
    }

    #[test]
    fn url_hash_is_40_hex_chars() {
        let settings = OssPathSettings::default();
        let path = generate_path(&settings, "https://example.com", Utc::now());
        let hash = path.split('/').next().unwrap();

        assert_eq!(hash.len(), 40);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_urls_get_distinct_directories() {
        let settings = OssPathSettings::default();
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert_ne!(
            generate_path(&settings, "https://example.com/a", ts),
            generate_path(&settings, "https://example.com/b", ts)
        );
    }

    #[test]
    fn oss_key_carries_the_prefix() {
        let storage = OssStorage::new(OssSettings::default()).unwrap();
        assert_eq!(storage.object_key("abc/240101.000000/dom.html"), "data/abc/240101.000000/dom.html");
    }

    #[test]
    fn content_types_match_artifacts() {
        assert_eq!(content_type_for("x/dom.html"), "text/html");
        assert_eq!(content_type_for("x/screenshot.png"), "image/png");
        assert_eq!(content_type_for("x/page.mhtml"), "multipart/related");
        assert_eq!(content_type_for("x/blob.bin"), "application/octet-stream");
    }

    #[tokio::test]
    async fn local_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert!(!storage.exists("a/b/dom.html").await.unwrap());
        storage.save("a/b/dom.html", b"<html></html>").await.unwrap();
        assert!(storage.exists("a/b/dom.html").await.unwrap());
        assert_eq!(storage.read("a/b/dom.html").await.unwrap(), b"<html></html>");
    }

    #[tokio::test]
    async fn local_storage_read_of_missing_object_errors() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert!(storage.read("missing").await.is_err());
    }
}
