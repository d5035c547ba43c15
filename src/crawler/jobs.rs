//! Fetch jobs, the shared job queue and the job generator
//!
//! The queue is a bounded MPMC channel: the generator blocks when workers fall
//! behind, and each job is received by exactly one worker. Closing the sender
//! lets workers drain what is left and then exit.

use crate::crawler::parser::PageKind;
use crate::url::prepare_page_url;
use async_channel::{Receiver, Sender};
use url::Url;

/// One page to retrieve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    /// Fully prepared page URL
    pub url: Url,
    /// 0 for the profile page, 1..=N for content pages
    pub page_index: u32,
    /// Position in generation order
    pub position: u64,
    pub kind: PageKind,
}

impl FetchJob {
    pub fn is_profile(&self) -> bool {
        self.kind == PageKind::Profile
    }
}

/// Producer half of the job queue
#[derive(Debug, Clone)]
pub struct JobSender {
    inner: Sender<FetchJob>,
}

/// Consumer half of the job queue, cloned into every worker
#[derive(Debug, Clone)]
pub struct JobReceiver {
    inner: Receiver<FetchJob>,
}

/// Creates a bounded job queue
pub fn job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (tx, rx) = async_channel::bounded(capacity.max(1));
    (JobSender { inner: tx }, JobReceiver { inner: rx })
}

impl JobSender {
    /// Enqueues a job, waiting while the queue is full
    ///
    /// Returns `false` if every receiver is gone and the job was dropped.
    pub async fn push(&self, job: FetchJob) -> bool {
        self.inner.send(job).await.is_ok()
    }

    /// Closes the queue; queued jobs are still delivered
    pub fn close(&self) {
        self.inner.close();
    }
}

impl JobReceiver {
    /// Waits for the next job; `None` once the queue is closed and empty
    pub async fn next(&self) -> Option<FetchJob> {
        self.inner.recv().await.ok()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Produces the ordered job sequence for one target
#[derive(Debug, Clone)]
pub struct JobGenerator {
    base_url: Url,
    languages: Option<String>,
    fallback_max_pages: u32,
}

impl JobGenerator {
    pub fn new(base_url: Url, languages: Option<&str>, fallback_max_pages: u32) -> Self {
        Self {
            base_url,
            languages: languages.map(str::to_string),
            fallback_max_pages,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Decides how many content pages to enqueue
    ///
    /// | requested | discovered | result |
    /// |-----------|------------|--------|
    /// | `Some(n)` | `Some(d)`  | `min(n, d)` |
    /// | `Some(n)` | `None`     | `n` |
    /// | `None`    | `Some(d)`  | `d` (0 means profile only) |
    /// | `None`    | `None`     | fallback maximum |
    pub fn resolve_page_count(&self, requested: Option<u32>, discovered: Option<u32>) -> u32 {
        match (requested, discovered) {
            (Some(requested), Some(discovered)) => requested.min(discovered),
            (Some(requested), None) => requested,
            (None, Some(discovered)) => discovered,
            (None, None) => {
                tracing::warn!(
                    fallback = self.fallback_max_pages,
                    "Page count unknown; using fallback maximum"
                );
                self.fallback_max_pages
            }
        }
    }

    /// Lazily yields the profile job followed by `page_count` content jobs
    pub fn jobs(&self, page_count: u32) -> impl Iterator<Item = FetchJob> + '_ {
        let profile = FetchJob {
            url: self.page_url(1),
            page_index: 0,
            position: 0,
            kind: PageKind::Profile,
        };

        let content = (1..=page_count).map(move |page| FetchJob {
            url: self.page_url(page),
            page_index: page,
            position: u64::from(page),
            kind: PageKind::Reviews,
        });

        std::iter::once(profile).chain(content)
    }

    /// Pushes every job onto the queue, then closes it
    ///
    /// # Returns
    ///
    /// The number of jobs enqueued. Fewer than planned means every worker
    /// went away before the queue was filled.
    pub async fn fill(&self, page_count: u32, sender: JobSender) -> u64 {
        let mut queued = 0u64;
        for job in self.jobs(page_count) {
            if !sender.push(job).await {
                tracing::warn!(queued, "Job queue closed early; stopping generation");
                break;
            }
            queued += 1;
        }
        sender.close();
        tracing::info!(queued, page_count, "All jobs queued");
        queued
    }

    fn page_url(&self, page: u32) -> Url {
        prepare_page_url(&self.base_url, page, self.languages.as_deref())
    }
}
