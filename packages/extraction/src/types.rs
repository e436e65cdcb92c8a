//! Input types handed to extractors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A snapshot artifact as presented to an [`crate::Extractor`].
///
/// Carries the cleaned DOM of a single capture plus enough provenance to
/// resolve relative references. The pipeline materializes this from object
/// storage; extractors never touch storage themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// The monitored URL this snapshot was captured from.
    pub url: String,

    /// Cleaned DOM HTML (`dom.html` artifact).
    pub html: String,

    /// Capture instant of the snapshot.
    pub captured_at: DateTime<Utc>,
}

impl SnapshotDocument {
    /// Create a document captured now (mostly useful in tests).
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            captured_at: Utc::now(),
        }
    }

    /// Set the capture instant.
    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// Check whether there is anything to extract from.
    pub fn has_content(&self) -> bool {
        !self.html.trim().is_empty()
    }
}
