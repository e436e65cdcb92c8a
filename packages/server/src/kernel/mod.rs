//! Kernel: the pipeline services and their collaborator seams.

pub mod browser;
pub mod extractor;
pub mod hasher;
pub mod rate_limit;
pub mod scheduler;
pub mod service;
pub mod snapshot;
pub mod storage;
pub mod testing;
pub mod worker;

pub use browser::{BrowserDriver, BrowserError, PageCapture, RemoteBrowser};
pub use extractor::ExtractorService;
pub use hasher::{sha1_hex, CleanHasher, Fingerprint, FingerprintError};
pub use rate_limit::DomainRateLimiter;
pub use scheduler::Scheduler;
pub use service::{Service, ServiceHost};
pub use snapshot::{SnapshotOutcome, SnapshotService};
pub use storage::{generate_path, LocalStorage, OssStorage, StorageBackend};
pub use worker::Worker;
