//! Outcome sink trait and run summary types
//!
//! This module defines the trait every finished job is delivered to and the
//! data structures describing a completed run.

use crate::crawler::FetchResult;
use crate::state::FailureKind;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Receives every terminal job result
///
/// Results arrive from all workers in completion order, which is not job
/// order. Delivery never fails from the worker's point of view.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn deliver(&self, result: FetchResult);
}

/// A job that ended in failure
#[derive(Debug, Clone, PartialEq)]
pub struct FailedPage {
    pub url: String,
    pub page_index: u32,
    pub kind: FailureKind,
    pub http_status: Option<u16>,
    pub message: String,
    pub attempts: u32,
}

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Something was saved and nothing failed
    Success,
    /// Something was saved, some jobs failed
    PartialSuccess,
    /// Nothing was saved and some jobs failed
    Error,
    /// Nothing was saved and nothing failed
    NoDataSavedOrNeeded,
}

impl RunStatus {
    /// Derives the run status from saved and failed counts
    pub fn from_counts(files_saved: u64, failed: u64) -> Self {
        match (files_saved > 0, failed > 0) {
            (true, false) => Self::Success,
            (true, true) => Self::PartialSuccess,
            (false, true) => Self::Error,
            (false, false) => Self::NoDataSavedOrNeeded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Error => "error",
            Self::NoDataSavedOrNeeded => "no_data_saved_or_needed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    // Run metadata
    pub target: String,
    pub base_url: String,
    pub output_location: String,
    pub started_at: String,
    pub finished_at: String,
    pub duration_seconds: u64,
    pub status: RunStatus,
    pub config_hash: Option<String>,

    // Planning
    pub discovered_pages: Option<u32>,
    pub planned_pages: u32,
    pub jobs_queued: u64,

    // Outcomes
    pub succeeded: u64,
    pub empty: u64,
    pub failed: u64,
    pub files_saved: u64,
    pub profile_saved: bool,
    pub review_pages_saved: u64,
    pub items_saved: u64,
    pub storage_errors: u64,

    // Retry and throttle activity
    pub total_attempts: u64,
    pub ledger_entries: usize,
    pub global_pauses: u64,

    /// First few failures, in delivery order
    pub failed_sample: Vec<FailedPage>,
}

impl RunSummary {
    /// Jobs that reached a terminal result
    pub fn jobs_completed(&self) -> u64 {
        self.succeeded + self.empty + self.failed
    }

    /// Percentage of completed jobs that failed
    pub fn failure_rate(&self) -> f64 {
        let completed = self.jobs_completed();
        if completed == 0 {
            0.0
        } else {
            (self.failed as f64 / completed as f64) * 100.0
        }
    }

    /// The one-line completion message logged at the end of a run
    pub fn finished_line(&self) -> String {
        format!(
            "FINISHED | status={} | files_saved={} (profile: {}, reviews: {}) | empty_pages={} | failed_pages={} | block_retries={} | dir=./{}",
            self.status,
            self.files_saved,
            self.profile_saved,
            self.review_pages_saved,
            self.empty,
            self.failed,
            self.ledger_entries,
            self.output_location
        )
    }
}
