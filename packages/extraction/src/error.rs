//! Typed errors for the extraction library.
//!
//! Uses `thiserror` rather than `anyhow` so callers can tell a document
//! problem (skip and move on) from an extractor malfunction.

use thiserror::Error;

/// Errors that can occur while deriving a record from a snapshot.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The snapshot document could not be interpreted.
    #[error("document error: {0}")]
    Document(String),

    /// The extractor itself failed (backend call, internal invariant).
    #[error("extractor error: {0}")]
    Extractor(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Output could not be encoded as a JSON record.
    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}
