//! Append-only record of block-tier retries
//!
//! Every block signal a job receives produces exactly one entry. Entries are
//! kept in memory for the run summary and, when a path is configured, mirrored
//! as rows of a markdown table:
//!
//! ```text
//! |UTC time|URL|Proxy|UA|Attempt|Result|
//! |---|---|---|---|---|---|
//! |2025-06-02 12:34:56|https://…?page=123|http://1.2.3.4:5555|Mozilla/5.0 …|2/10|rotated|
//! ```
//!
//! The ledger only observes; nothing in the retry state machine reads it back.

use crate::identity::Identity;
use crate::state::FailureKind;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const MARKDOWN_HEADER: &str = "|UTC time|URL|Proxy|UA|Attempt|Result|\n|---|---|---|---|---|---|\n";

/// What the engine did after a block signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// A new identity and connection were taken and the job continues
    Rotated,
    /// The block budget is spent and the job failed
    Exhausted,
}

impl RetryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rotated => "rotated",
            Self::Exhausted => "failed",
        }
    }
}

/// One block-tier attempt
#[derive(Debug, Clone)]
pub struct RetryLogEntry {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    /// Identity that received the block signal
    pub proxy: String,
    pub user_agent: String,
    /// 1-based block attempt number
    pub attempt: u32,
    pub max_attempts: u32,
    /// HTTP status that triggered the entry; `None` for exhausted general retries
    pub triggering_status: Option<u16>,
    pub trigger: FailureKind,
    pub outcome: RetryOutcome,
}

impl RetryLogEntry {
    pub fn new(
        url: &str,
        identity: &Identity,
        attempt: u32,
        max_attempts: u32,
        triggering_status: Option<u16>,
        trigger: FailureKind,
        outcome: RetryOutcome,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            url: url.to_string(),
            proxy: identity.proxy_label(),
            user_agent: identity.user_agent().to_string(),
            attempt,
            max_attempts,
            triggering_status,
            trigger,
            outcome,
        }
    }

    /// Renders the entry as one markdown table row
    pub fn to_markdown_row(&self) -> String {
        format!(
            "|{}|{}|{}|{}|{}/{}|{}|\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            escape_cell(&self.url),
            escape_cell(&self.proxy),
            escape_cell(&self.user_agent),
            self.attempt,
            self.max_attempts,
            self.outcome.as_str()
        )
    }
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

/// Shared, append-only retry ledger
#[derive(Debug)]
pub struct RetryLedger {
    entries: Mutex<Vec<RetryLogEntry>>,
    markdown_path: Option<PathBuf>,

    /// Serializes file appends so rows from concurrent workers never interleave
    file_lock: tokio::sync::Mutex<()>,
}

impl RetryLedger {
    /// Creates a ledger mirrored to a markdown file
    pub fn new(markdown_path: impl Into<PathBuf>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            markdown_path: Some(markdown_path.into()),
            file_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Creates a ledger that only keeps entries in memory
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            markdown_path: None,
            file_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Appends an entry
    ///
    /// A failed file write is logged and the entry is still kept in memory.
    /// The file is written through `tokio::fs`, so a slow disk never blocks
    /// a runtime worker thread.
    pub async fn append(&self, entry: RetryLogEntry) {
        tracing::warn!(
            url = %entry.url,
            proxy = %entry.proxy,
            attempt = entry.attempt,
            max_attempts = entry.max_attempts,
            status = ?entry.triggering_status,
            outcome = entry.outcome.as_str(),
            "Block-tier retry"
        );

        if let Some(path) = &self.markdown_path {
            let _file = self.file_lock.lock().await;
            if let Err(e) = append_markdown_row(path, &entry).await {
                tracing::error!(file = %path.display(), error = %e, "Failed to write retry log");
            }
        }

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Snapshot of every entry so far
    pub fn entries(&self) -> Vec<RetryLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries recorded for one URL, in append order
    pub fn entries_for(&self, url: &str) -> Vec<RetryLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.url == url)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn markdown_path(&self) -> Option<&Path> {
        self.markdown_path.as_deref()
    }
}

async fn append_markdown_row(path: &Path, entry: &RetryLogEntry) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    let mut row = String::new();
    if file.metadata().await?.len() == 0 {
        row.push_str(MARKDOWN_HEADER);
    }
    row.push_str(&entry.to_markdown_row());
    file.write_all(row.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ProxyEndpoint;
    use tempfile::TempDir;

    fn entry(url: &str, attempt: u32, outcome: RetryOutcome) -> RetryLogEntry {
        let identity = Identity::new(
            Some(ProxyEndpoint::new("http://10.0.0.1:8080")),
            "Agent|1",
        );
        RetryLogEntry::new(
            url,
            &identity,
            attempt,
            10,
            Some(403),
            FailureKind::BlockSignal,
            outcome,
        )
    }

    #[tokio::test]
    async fn test_in_memory_append() {
        let ledger = RetryLedger::in_memory();
        assert!(ledger.is_empty());

        ledger.append(entry("https://a/?page=1", 1, RetryOutcome::Rotated)).await;
        ledger.append(entry("https://a/?page=2", 1, RetryOutcome::Rotated)).await;
        ledger.append(entry("https://a/?page=1", 2, RetryOutcome::Exhausted)).await;

        assert_eq!(ledger.len(), 3);
        let page_one = ledger.entries_for("https://a/?page=1");
        assert_eq!(page_one.len(), 2);
        assert_eq!(page_one[1].outcome, RetryOutcome::Exhausted);
    }

    #[test]
    fn test_markdown_row() {
        let row = entry("https://a/?page=1", 2, RetryOutcome::Rotated).to_markdown_row();
        assert!(row.starts_with('|'));
        assert!(row.ends_with("|2/10|rotated|\n"));
        assert!(row.contains("http://10.0.0.1:8080"));
        assert!(row.contains("Agent\\|1"));
    }

    #[tokio::test]
    async fn test_markdown_header_written_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("retry.md");
        let ledger = RetryLedger::new(&path);

        ledger.append(entry("https://a/?page=1", 1, RetryOutcome::Rotated)).await;
        ledger.append(entry("https://a/?page=1", 2, RetryOutcome::Exhausted)).await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("|UTC time|").count(), 1);
        assert_eq!(content.lines().count(), 4);
        assert!(content.lines().last().unwrap().ends_with("|failed|"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_keep_rows_whole() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("retry.md");
        let ledger = std::sync::Arc::new(RetryLedger::new(&path));

        let mut handles = Vec::new();
        for worker in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                for attempt in 1..=5 {
                    let url = format!("https://a/?page={}", worker);
                    ledger.append(entry(&url, attempt, RetryOutcome::Rotated)).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ledger.len(), 40);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("|UTC time|").count(), 1);
        assert_eq!(content.lines().count(), 42);
        assert!(content
            .lines()
            .skip(2)
            .all(|line| line.starts_with('|') && line.ends_with("|rotated|")));
    }
}
