//! Crawler module for fetching paginated content
//!
//! This module contains the core harvesting logic, including:
//! - The transport seam and its reqwest implementation
//! - The two-tier retry engine and its block-retry ledger
//! - Job generation over a bounded queue
//! - Per-page, per-batch and global throttling
//! - Page-count discovery and data-island extraction
//! - Worker pool and run orchestration

mod coordinator;
mod discovery;
mod engine;
mod fetcher;
mod jobs;
mod ledger;
mod parser;
mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{Harvester, WorkerPool};
pub use discovery::{DiscoveryError, NextDataDiscovery, PageCountDiscovery};
pub use engine::{FetchEngine, FetchResult, FetchStatus, RetryPolicy};
pub use fetcher::{
    build_http_client, AttemptRequest, RawResponse, ReqwestTransport, Transport, TransportError,
};
pub use jobs::{job_queue, FetchJob, JobGenerator, JobReceiver, JobSender};
pub use ledger::{RetryLedger, RetryLogEntry, RetryOutcome};
pub use parser::{next_data_json, total_pages, ContentExtractor, NextDataExtractor, PageKind, ParsedRecord};
pub use scheduler::{ThrottleController, WorkerThrottle};
