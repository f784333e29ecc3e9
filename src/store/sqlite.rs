//! SQLite document store implementation
//!
//! Writes are staged first and only become visible to queries once `refresh`
//! moves them into the documents table, mirroring the commit semantics of a
//! search index.

use crate::store::schema::initialize_schema;
use crate::store::traits::{DocumentStore, StoreError, StoreResult};
use crate::store::{Filter, Query, QueryPage, Record};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed document store
pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteStore {
    /// Opens or creates a store at the given path
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StoreError)` - Failed to open database
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(|e| StoreError::Connection {
            url: format!("sqlite://{}", path.display()),
            reason: e.to_string(),
        })?;

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
            location: format!("sqlite://{}", path.display()),
        })
    }

    /// Creates an in-memory store
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: "sqlite::memory:".to_string(),
        })
    }

    /// Gets a visible document by id
    pub fn get(&self, id: &str) -> StoreResult<Option<Record>> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|body| decode_record(id.to_string(), &body))
            .transpose()
    }

    /// Number of writes waiting for the next refresh
    pub fn staged_count(&self) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM staged_documents", [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn stage(conn: &Connection, record: &Record) -> StoreResult<()> {
        let body = serde_json::to_string(&record.body)?;
        conn.execute(
            "INSERT INTO staged_documents (id, body, staged_at) VALUES (?1, ?2, ?3)",
            params![record.id, body, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Moves every staged write into the visible table in one transaction
    fn commit_staged(conn: &mut Connection) -> StoreResult<usize> {
        let tx = conn.transaction()?;
        let moved = tx.execute(
            "INSERT OR REPLACE INTO documents (id, body, indexed_at)
             SELECT id, body, staged_at FROM staged_documents ORDER BY seq",
            [],
        )?;
        tx.execute("DELETE FROM staged_documents", [])?;
        tx.commit()?;
        Ok(moved)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn describe(&self) -> String {
        self.location.clone()
    }

    async fn query(&self, query: &Query, page: u32, page_size: u32) -> StoreResult<QueryPage> {
        let (where_sql, args) = where_clause(query);
        let conn = self.lock()?;

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM documents{}", where_sql),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let offset = u64::from(page) * u64::from(page_size);
        let mut stmt = conn.prepare(&format!(
            "SELECT id, body FROM documents{} ORDER BY id LIMIT {} OFFSET {}",
            where_sql, page_size, offset
        ))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let records = rows
            .into_iter()
            .map(|(id, body)| decode_record(id, &body))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(QueryPage {
            records,
            total_hits: total as u64,
        })
    }

    async fn save(&self, record: &Record, reconsolidate: bool) -> StoreResult<()> {
        let mut conn = self.lock()?;
        Self::stage(&conn, record)?;
        if reconsolidate {
            Self::commit_staged(&mut conn)?;
        }
        Ok(())
    }

    async fn update(&self, records: &[Record]) -> StoreResult<()> {
        let mut conn = self.lock()?;
        {
            let tx = conn.transaction()?;
            for record in records {
                Self::stage(&tx, record)?;
            }
            tx.commit()?;
        }
        Self::commit_staged(&mut conn)?;
        Ok(())
    }

    async fn refresh(&self) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let moved = Self::commit_staged(&mut conn)?;
        tracing::trace!("Refreshed {}: {} staged documents committed", self.location, moved);
        Ok(())
    }

    async fn delete_all(&self) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM documents", [])?;
        tx.execute("DELETE FROM staged_documents", [])?;
        tx.commit()?;
        Ok(())
    }

    async fn facet_counts(
        &self,
        query: &Query,
        field: &str,
        limit: u32,
    ) -> StoreResult<Vec<(String, u64)>> {
        let (where_sql, mut args) = where_clause(query);
        args.push(json_path(field));
        let field_param = args.len();

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT CAST(json_extract(body, ?{}) AS TEXT) AS term, COUNT(*) AS hits
             FROM documents{}
             GROUP BY term
             HAVING term IS NOT NULL
             ORDER BY hits DESC, term ASC
             LIMIT {}",
            field_param, where_sql, limit
        ))?;

        let terms = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(terms)
    }
}

/// Builds a JSON path for a top-level field
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

/// Translates query filters into a WHERE clause and its positional arguments
fn where_clause(query: &Query) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();

    for filter in &query.filters {
        match filter {
            Filter::Exists(field) => {
                args.push(json_path(field));
                clauses.push(format!("json_extract(body, ?{}) IS NOT NULL", args.len()));
            }
            Filter::Term { field, value } => {
                args.push(json_path(field));
                let path_param = args.len();
                args.push(value.clone());
                clauses.push(format!(
                    "CAST(json_extract(body, ?{}) AS TEXT) = ?{}",
                    path_param,
                    path_param + 1
                ));
            }
        }
    }

    if clauses.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), args)
    }
}

fn decode_record(id: String, body: &str) -> StoreResult<Record> {
    let body: Map<String, Value> = serde_json::from_str(body)?;
    Ok(Record { id, body })
}
