//! The extractor trait.

use async_trait::async_trait;

use crate::error::ExtractError;
use crate::types::SnapshotDocument;

/// Derives a structured record from a snapshot document.
///
/// Implementations must be deterministic per version: the pipeline stores one
/// record per `(snapshot, version)` and will never re-run an extractor whose
/// version already produced output for a snapshot.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Version tag stored alongside every record this extractor produces.
    fn version(&self) -> &str;

    /// Derive a JSON record from the document.
    async fn extract(&self, doc: &SnapshotDocument) -> Result<serde_json::Value, ExtractError>;

    /// Extractor name for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}
