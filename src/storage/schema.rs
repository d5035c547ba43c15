//! Database schema definitions
//!
//! This module contains the SQL schema of the SQLite record backend.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per fetched page, rewritten when a page is fetched again
CREATE TABLE IF NOT EXISTS pages (
    target TEXT NOT NULL,
    page_index INTEGER NOT NULL,
    kind TEXT NOT NULL,
    phase TEXT NOT NULL,
    item_count INTEGER NOT NULL DEFAULT 0,
    payload TEXT,
    stored_at TEXT NOT NULL,
    PRIMARY KEY (target, page_index)
);

CREATE INDEX IF NOT EXISTS idx_pages_target ON pages(target);
CREATE INDEX IF NOT EXISTS idx_pages_phase ON pages(phase);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
