//! JSON directory storage
//!
//! Writes one pretty-printed UTF-8 file per page under
//! `<root>/<target>/`: `page0_company_profile.json` for the profile and
//! `page<N>_reviews.json` for content pages. Pages without content leave no
//! file behind.

use crate::crawler::PageKind;
use crate::storage::traits::{check_target, RecordStore, StorageResult, StoredPayload};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File-per-page JSON backend
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one target's files
    pub fn target_dir(&self, target: &str) -> PathBuf {
        self.root.join(target)
    }

    /// File a page is written to
    pub fn page_path(&self, target: &str, page_index: u32, kind: PageKind) -> PathBuf {
        let file_name = match kind {
            PageKind::Profile => format!("page{}_company_profile.json", page_index),
            PageKind::Reviews => format!("page{}_reviews.json", page_index),
        };
        self.target_dir(target).join(file_name)
    }
}

#[async_trait]
impl RecordStore for JsonDirStore {
    async fn store(
        &self,
        target: &str,
        page_index: u32,
        kind: PageKind,
        payload: StoredPayload<'_>,
    ) -> StorageResult<bool> {
        check_target(target)?;

        let record = match payload {
            StoredPayload::Records(record) => record,
            StoredPayload::NoContent => {
                tracing::debug!(target_slug = target, page = page_index, "No content; nothing written");
                return Ok(false);
            }
        };

        let path = self.page_path(target, page_index, kind);
        tokio::fs::create_dir_all(self.target_dir(target)).await?;
        tokio::fs::write(&path, serde_json::to_vec_pretty(&record.data)?).await?;

        tracing::info!(
            page = page_index,
            items = record.item_count,
            file = %path.display(),
            "Saved page"
        );
        Ok(true)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
