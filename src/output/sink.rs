//! Outcome sink that persists results and counts outcomes

use crate::crawler::{FetchResult, FetchStatus};
use crate::output::stats::{OutcomeCounts, OutcomeTally};
use crate::output::traits::OutcomeSink;
use crate::storage::{RecordStore, StoredPayload};
use async_trait::async_trait;
use std::sync::Arc;

/// Hands successful and empty pages to storage and tallies every outcome
pub struct StoreSink {
    target: String,
    store: Arc<dyn RecordStore>,
    tally: OutcomeTally,
}

impl StoreSink {
    pub fn new(target: impl Into<String>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            target: target.into(),
            store,
            tally: OutcomeTally::new(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.tally.snapshot()
    }

    async fn persist(&self, result: &FetchResult) -> bool {
        let payload = match &result.status {
            FetchStatus::Success { record, .. } => StoredPayload::Records(record),
            FetchStatus::Empty { .. } => StoredPayload::NoContent,
            FetchStatus::Failed { .. } => return false,
        };

        match self
            .store
            .store(&self.target, result.job.page_index, result.job.kind, payload)
            .await
        {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!(
                    page = result.job.page_index,
                    error = %e,
                    "Failed to store page"
                );
                self.tally.record_storage_error();
                false
            }
        }
    }
}

#[async_trait]
impl OutcomeSink for StoreSink {
    async fn deliver(&self, result: FetchResult) {
        let saved = self.persist(&result).await;
        self.tally.record(&result, saved);
    }
}
