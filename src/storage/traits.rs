//! Storage traits and error types
//!
//! This module defines the trait interface for record persistence backends
//! and associated error types.

use crate::crawler::{PageKind, ParsedRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid target slug: {0}")]
    InvalidTarget(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What a finished job hands to storage
#[derive(Debug, Clone, Copy)]
pub enum StoredPayload<'a> {
    /// Extracted content of a successful job
    Records(&'a ParsedRecord),
    /// The page was fetched but carried nothing to extract
    NoContent,
}

/// Trait for record persistence backends
///
/// Called once per successful or empty job, from any worker, in any order.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists one page
    ///
    /// # Arguments
    ///
    /// * `target` - Target slug, e.g. the company name from the base URL
    /// * `page_index` - 0 for the profile page, otherwise the page number
    /// * `kind` - Which record the page was expected to yield
    /// * `payload` - Extracted records, or the no-content marker
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Records were written
    /// * `Ok(false)` - Nothing needed writing
    /// * `Err(StorageError)` - The write failed
    async fn store(
        &self,
        target: &str,
        page_index: u32,
        kind: PageKind,
        payload: StoredPayload<'_>,
    ) -> StorageResult<bool>;

    /// Where records end up, for logs and reports
    fn location(&self) -> String;
}

/// Rejects slugs that would escape the output root
pub(crate) fn check_target(target: &str) -> StorageResult<()> {
    if target.is_empty()
        || target == "."
        || target == ".."
        || target.contains(['/', '\\'])
    {
        return Err(StorageError::InvalidTarget(target.to_string()));
    }
    Ok(())
}
