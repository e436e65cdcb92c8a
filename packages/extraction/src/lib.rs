//! Snapshot extraction library for talemon.
//!
//! The collection pipeline archives immutable page snapshots; this crate is
//! the seam through which structured records are derived from them. The
//! pipeline only depends on the [`Extractor`] trait; what an extractor
//! actually computes (DOM heuristics, an LLM call, a site-specific parser)
//! is its own business.
//!
//! Every extractor carries a free-form `version` string. The pipeline stores
//! output keyed by `(snapshot, version)`, so bumping the version is how a
//! reworked extractor gets re-run over the existing archive.
//!
//! # Usage
//!
//! ```rust,ignore
//! use extraction::{DomExtractor, Extractor, SnapshotDocument};
//!
//! let extractor = DomExtractor::new();
//! let doc = SnapshotDocument::new("https://example.com", "<html>...</html>");
//! let record = extractor.extract(&doc).await?;
//! ```

pub mod error;
pub mod extractors;
pub mod testing;
pub mod traits;
pub mod types;

pub use error::ExtractError;
pub use extractors::DomExtractor;
pub use testing::MockExtractor;
pub use traits::Extractor;
pub use types::SnapshotDocument;
