// Talemon - traceable web-data collection core
//
// A scheduler turns the monitored-page table into a lease-disciplined stream
// of capture jobs; workers fetch pages through a headless-browser sidecar,
// fingerprint the content, and archive snapshot artifacts to object storage
// only when the clean hash changes; an extractor derives structured records
// from snapshots exactly once per (snapshot, extractor version).
//
// Postgres is the single source of truth; all cross-process coordination
// happens through row locks and unique constraints on its tables.

pub mod config;
pub mod db;
pub mod kernel;
pub mod models;

pub use config::Settings;
