//! Outcome counters collected while a run is in progress

use crate::crawler::{FetchResult, FetchStatus, PageKind};
use crate::output::traits::FailedPage;
use std::sync::{Mutex, PoisonError};

/// Failures kept for the summary sample
pub const FAILED_SAMPLE_SIZE: usize = 5;

/// Snapshot of outcome counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeCounts {
    pub succeeded: u64,
    pub empty: u64,
    pub failed: u64,
    pub files_saved: u64,
    pub profile_saved: bool,
    pub review_pages_saved: u64,
    pub items_saved: u64,
    pub storage_errors: u64,
    pub total_attempts: u64,
    pub failed_sample: Vec<FailedPage>,
}

/// Thread-safe outcome counters shared by all workers
#[derive(Debug, Default)]
pub struct OutcomeTally {
    counts: Mutex<OutcomeCounts>,
}

impl OutcomeTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a terminal result
    ///
    /// `saved` says whether storage actually wrote the page's records.
    pub fn record(&self, result: &FetchResult, saved: bool) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.total_attempts += u64::from(result.attempts);

        match &result.status {
            FetchStatus::Success { record, .. } => {
                counts.succeeded += 1;
                if saved {
                    counts.files_saved += 1;
                    counts.items_saved += record.item_count as u64;
                    match result.job.kind {
                        PageKind::Profile => counts.profile_saved = true,
                        PageKind::Reviews => counts.review_pages_saved += 1,
                    }
                }
            }
            FetchStatus::Empty { .. } => counts.empty += 1,
            FetchStatus::Failed {
                kind,
                http_status,
                message,
            } => {
                counts.failed += 1;
                if counts.failed_sample.len() < FAILED_SAMPLE_SIZE {
                    counts.failed_sample.push(FailedPage {
                        url: result.job.url.to_string(),
                        page_index: result.job.page_index,
                        kind: *kind,
                        http_status: *http_status,
                        message: message.clone(),
                        attempts: result.attempts,
                    });
                }
            }
        }
    }

    pub fn record_storage_error(&self) {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .storage_errors += 1;
    }

    pub fn snapshot(&self) -> OutcomeCounts {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
