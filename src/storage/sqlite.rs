//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::crawler::PageKind;
use crate::state::FetchPhase;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{check_target, RecordStore, StorageResult, StoredPayload};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// A page row read back from the database
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPage {
    pub target: String,
    pub page_index: u32,
    pub kind: String,
    pub phase: FetchPhase,
    pub item_count: usize,
    /// `None` for pages recorded as having no content
    pub payload: Option<Value>,
    pub stored_at: String,
}

/// SQLite storage backend
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteRecordStore {
    /// Creates a new SqliteRecordStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file; parent directories are created
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteRecordStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Many workers write small rows concurrently
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upserts one page row
    pub fn upsert_page(
        &self,
        target: &str,
        page_index: u32,
        kind: PageKind,
        payload: StoredPayload<'_>,
    ) -> StorageResult<()> {
        check_target(target)?;

        let (phase, item_count, json) = match payload {
            StoredPayload::Records(record) => (
                FetchPhase::Success,
                record.item_count,
                Some(serde_json::to_string(&record.data)?),
            ),
            StoredPayload::NoContent => (FetchPhase::Empty, 0, None),
        };

        self.conn().execute(
            "INSERT INTO pages (target, page_index, kind, phase, item_count, payload, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(target, page_index) DO UPDATE SET
                kind = excluded.kind,
                phase = excluded.phase,
                item_count = excluded.item_count,
                payload = excluded.payload,
                stored_at = excluded.stored_at",
            params![
                target,
                page_index,
                kind.as_str(),
                phase.to_db_string(),
                item_count as i64,
                json,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Loads one page row
    pub fn load_page(&self, target: &str, page_index: u32) -> StorageResult<Option<StoredPage>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT target, page_index, kind, phase, item_count, payload, stored_at
             FROM pages WHERE target = ?1 AND page_index = ?2",
        )?;

        let row = stmt
            .query_row(params![target, page_index], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .optional()?;

        let Some((target, page_index, kind, phase, item_count, payload, stored_at)) = row else {
            return Ok(None);
        };

        let payload = match payload {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };

        Ok(Some(StoredPage {
            target,
            page_index,
            kind,
            phase: FetchPhase::from_db_string(&phase).unwrap_or(FetchPhase::Success),
            item_count: item_count.max(0) as usize,
            payload,
            stored_at,
        }))
    }

    /// Counts stored pages of a target, optionally restricted to one phase
    pub fn count_pages(&self, target: &str, phase: Option<FetchPhase>) -> StorageResult<usize> {
        let conn = self.conn();
        let count: i64 = match phase {
            Some(phase) => conn.query_row(
                "SELECT COUNT(*) FROM pages WHERE target = ?1 AND phase = ?2",
                params![target, phase.to_db_string()],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM pages WHERE target = ?1",
                params![target],
                |row| row.get(0),
            )?,
        };
        Ok(count.max(0) as usize)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn store(
        &self,
        target: &str,
        page_index: u32,
        kind: PageKind,
        payload: StoredPayload<'_>,
    ) -> StorageResult<bool> {
        self.upsert_page(target, page_index, kind, payload)?;
        Ok(matches!(payload, StoredPayload::Records(_)))
    }

    fn location(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }
}
