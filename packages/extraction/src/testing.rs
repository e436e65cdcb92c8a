//! Mock extractor for tests.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::ExtractError;
use crate::traits::Extractor;
use crate::types::SnapshotDocument;

/// Configurable mock implementation of [`Extractor`].
///
/// Returns a canned record and logs every URL it was asked to process.
///
/// # Example
///
/// ```rust,ignore
/// let mock = MockExtractor::new("v1").with_record(serde_json::json!({"ok": true}));
/// let record = mock.extract(&doc).await?;
/// assert_eq!(mock.call_count(), 1);
/// ```
pub struct MockExtractor {
    version: String,
    record: serde_json::Value,
    fail: bool,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockExtractor {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            record: serde_json::Value::Null,
            fail: false,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the record returned by every `extract` call.
    pub fn with_record(mut self, record: serde_json::Value) -> Self {
        self.record = record;
        self
    }

    /// Make every `extract` call fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Number of times `extract` was called.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// URLs that were passed to `extract`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn version(&self) -> &str {
        &self.version
    }

    async fn extract(&self, doc: &SnapshotDocument) -> Result<serde_json::Value, ExtractError> {
        self.calls.write().unwrap().push(doc.url.clone());
        if self.fail {
            return Err(ExtractError::Document("mock failure".to_string()));
        }
        Ok(self.record.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_and_returns_canned_record() {
        let mock = MockExtractor::new("v1").with_record(serde_json::json!({"k": "v"}));
        let doc = SnapshotDocument::new("https://example.com", "<html></html>");

        let record = mock.extract(&doc).await.unwrap();

        assert_eq!(record["k"], "v");
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.calls(), vec!["https://example.com".to_string()]);
    }

    #[tokio::test]
    async fn failing_mock_errors() {
        let mock = MockExtractor::new("v1").failing();
        let doc = SnapshotDocument::new("https://example.com", "<html></html>");

        assert!(mock.extract(&doc).await.is_err());
    }
}
