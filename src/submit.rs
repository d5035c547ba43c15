//! Job-submission boundary
//!
//! `submit` validates a scrape request, starts the run on the tokio runtime
//! and returns at once with an acknowledgment. The returned handle resolves
//! to the run summary after the worker pool has drained the queue.

use crate::crawler::Harvester;
use crate::output::RunSummary;
use crate::url::normalize_base_url;
use crate::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One scrape request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    /// Target listing URL, e.g. `https://www.example.com/review/acme.io`
    pub base_url: String,

    /// Explicit page count; caps the discovered count when both exist
    #[serde(default)]
    pub page_count: Option<u32>,

    /// Overrides the configured worker count
    #[serde(default)]
    pub worker_count: Option<usize>,
}

impl ScrapeRequest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            page_count: None,
            worker_count: None,
        }
    }
}

/// Immediate reply to a submitted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeAck {
    pub status: &'static str,
    pub message: String,
}

/// A run in progress
#[derive(Debug)]
pub struct ScrapeHandle {
    pub ack: ScrapeAck,
    task: JoinHandle<Result<RunSummary>>,
}

impl ScrapeHandle {
    /// Waits for the run to finish
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The queue drained; page failures are in the summary
    /// * `Err(HarvestError)` - Set-up failed, or the run task panicked or was cancelled
    pub async fn wait(self) -> Result<RunSummary> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(HarvestError::Aborted(e.to_string())),
        }
    }

    /// Whether the run has already finished
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Starts a run in the background
///
/// The base URL is checked before anything is spawned, so a malformed
/// request is rejected synchronously.
///
/// # Arguments
///
/// * `harvester` - The configured harvester to run the request with
/// * `request` - What to scrape
///
/// # Returns
///
/// * `Ok(ScrapeHandle)` - The run was accepted and is in progress
/// * `Err(HarvestError)` - The base URL is invalid
pub fn submit(harvester: Arc<Harvester>, request: ScrapeRequest) -> Result<ScrapeHandle> {
    let base_url = normalize_base_url(&request.base_url)?;

    let pages = match request.page_count {
        Some(count) => format!("{} pages", count),
        None => "discovered page count".to_string(),
    };
    let ack = ScrapeAck {
        status: "accepted",
        message: format!("Scraping {} ({}) in the background", base_url, pages),
    };
    tracing::info!(url = %base_url, "Scrape request accepted");

    let task = tokio::spawn(async move { harvester.run(&request).await });

    Ok(ScrapeHandle { ack, task })
}
