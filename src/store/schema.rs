//! Database schema for the SQLite document store

/// SQL schema for the document store
pub const SCHEMA_SQL: &str = r#"
-- Documents visible to queries
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    indexed_at TEXT NOT NULL
);

-- Writes waiting for the next refresh
CREATE TABLE IF NOT EXISTS staged_documents (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    body TEXT NOT NULL,
    staged_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_staged_documents_id ON staged_documents(id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
