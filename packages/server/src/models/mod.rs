//! Row models and SQL operations for the four core tables.
//!
//! All cross-process coordination lives here: the skip-locked claim, the
//! conditional heartbeat, zombie reclamation, and the `ON CONFLICT DO
//! NOTHING` upserts that make snapshot and record writes effectively-once.

mod info;
mod monitor;
mod page;
mod snapshot;

pub use info::PageInfo;
pub use monitor::{NewPageMonitor, PageMonitor};
pub use page::{Page, PageStatus};
pub use snapshot::{NewPageSnapshot, PageSnapshot, UnextractedSnapshot};
