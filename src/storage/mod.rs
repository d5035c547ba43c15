//! Storage module for persisting extracted records
//!
//! This module handles every write of fetched content, including:
//! - A JSON backend writing one file per page
//! - A SQLite backend keeping one row per page
//! - Selecting the backend from the output configuration

mod json_dir;
mod schema;
mod sqlite;
mod traits;

pub use json_dir::JsonDirStore;
pub use schema::initialize_schema;
pub use sqlite::{SqliteRecordStore, StoredPage};
pub use traits::{RecordStore, StorageError, StorageResult, StoredPayload};

use crate::config::{OutputConfig, StorageBackend};
use std::sync::Arc;

/// Opens the backend selected in the output configuration
///
/// # Arguments
///
/// * `config` - The output section of the configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn RecordStore>)` - Ready-to-use backend
/// * `Err(StorageError)` - The database could not be opened
pub fn open_store(config: &OutputConfig) -> StorageResult<Arc<dyn RecordStore>> {
    match config.backend {
        StorageBackend::Json => Ok(Arc::new(JsonDirStore::new(&config.directory))),
        StorageBackend::Sqlite => Ok(Arc::new(SqliteRecordStore::new(&config.database_path())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_json_store() {
        let config = OutputConfig::default();
        let store = open_store(&config).unwrap();
        assert_eq!(store.location(), "scraped_data");
    }

    #[test]
    fn test_open_sqlite_store() {
        let temp_dir = TempDir::new().unwrap();
        let config = OutputConfig {
            backend: StorageBackend::Sqlite,
            directory: temp_dir.path().display().to_string(),
            ..OutputConfig::default()
        };

        let store = open_store(&config).unwrap();
        assert!(store.location().ends_with("harvest.db"));
        assert!(temp_dir.path().join("harvest.db").exists());
    }
}
