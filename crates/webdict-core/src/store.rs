//! Relational store access.
//!
//! The engines only need "run this query, hand me the rows". [`IndexStore`]
//! is that seam; [`SqliteStore`] implements it over a single rusqlite
//! connection.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::error::{Result, WebdictError};
use crate::query::SqlQuery;

/// Executes generated queries against the dictionary tables.
pub trait IndexStore: Send + Sync {
    /// Run `query` and materialize its rows.
    ///
    /// A failure is reported once; nothing retries.
    fn execute(&self, query: &SqlQuery) -> Result<RowSet>;
}

/// Materialized query result.
///
/// Rows are handed out in order by [`RowSet::next_row`], which yields `None`
/// once the set is exhausted or closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    cursor: usize,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            cursor: 0,
        }
    }

    /// Number of rows returned by the query.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of the column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The next unread row, or `None` when exhausted.
    pub fn next_row(&mut self) -> Option<Row<'_>> {
        let values = self.rows.get(self.cursor)?;
        self.cursor += 1;
        Some(Row {
            columns: &self.columns,
            values,
        })
    }

    /// Release the rows. Later calls to [`RowSet::next_row`] yield `None`.
    pub fn close(&mut self) {
        self.rows = Vec::new();
        self.cursor = 0;
    }
}

/// One row of a [`RowSet`].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Field at position `index`.
    pub fn get(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }

    /// Field in the column named `name`.
    pub fn get_named(&self, name: &str) -> Option<&'a Value> {
        let index = self.columns.iter().position(|c| c == name)?;
        self.values.get(index)
    }

    /// Field `index` as text; `None` for NULL or a missing column.
    pub fn text(&self, index: usize) -> Option<String> {
        self.get(index).and_then(value_as_text)
    }

    /// Field `name` as text; `None` for NULL or a missing column.
    pub fn text_named(&self, name: &str) -> Option<String> {
        self.get_named(name).and_then(value_as_text)
    }

    /// Field `name` as an integer, parsing text if needed.
    pub fn integer_named(&self, name: &str) -> Option<i64> {
        self.get_named(name).and_then(value_as_integer)
    }

    /// Field `index` as an integer, parsing text if needed.
    pub fn integer(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(value_as_integer)
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(r) => Some(r.to_string()),
        Value::Text(s) => Some(s.clone()),
        Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

fn value_as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Real(r) => Some(*r as i64),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// SQLite-backed [`IndexStore`].
///
/// The engine never writes, so connections are put into `query_only` mode.
pub struct SqliteStore {
    db_path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open an existing dictionary database read-only.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| WebdictError::Database {
            message: format!("Failed to open database {}: {}", db_path.display(), e),
            source: Some(e),
        })?;

        Self::configure_connection(&conn)?;

        Ok(Self {
            db_path: Some(db_path),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Wrap an already opened connection.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        Self::configure_connection(&conn)?;
        Ok(Self {
            db_path: None,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA busy_timeout=30000;
            PRAGMA query_only=ON;
            ",
        )?;
        Ok(())
    }

    /// Path of the database file, if opened from one.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| WebdictError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }
}

impl IndexStore for SqliteStore {
    fn execute(&self, query: &SqlQuery) -> Result<RowSet> {
        let conn = self.lock()?;
        debug!("Executing: {}", query);

        let query_error = |e: rusqlite::Error| WebdictError::Database {
            message: format!("Query error: {}. Query was: {}", e, query),
            source: Some(e),
        };

        let mut stmt = conn.prepare(&query.sql).map_err(query_error)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();

        let mut rows = stmt
            .query(params_from_iter(query.params.iter()))
            .map_err(query_error)?;
        let mut values = Vec::new();
        while let Some(row) = rows.next().map_err(query_error)? {
            let mut fields = Vec::with_capacity(column_count);
            for i in 0..column_count {
                fields.push(row.get::<_, Value>(i).map_err(query_error)?);
            }
            values.push(fields);
        }

        debug!("Query returned {} rows", values.len());
        Ok(RowSet::new(columns, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_db() -> (PathBuf, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("dict.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE words (id INTEGER PRIMARY KEY, entry TEXT, lemma TEXT);
             INSERT INTO words VALUES (1, '<teiHeader/>', NULL);
             INSERT INTO words VALUES (7, '<entry>cat</entry>', 'cat');",
        )
        .unwrap();
        (db_path, temp_dir)
    }

    #[test]
    fn test_execute_with_params() {
        let (db_path, _temp) = create_test_db();
        let store = SqliteStore::open(&db_path).unwrap();
        assert_eq!(store.db_path(), Some(db_path.as_path()));

        let query = SqlQuery::with_params(
            "SELECT id, entry, lemma FROM words WHERE id = ?",
            vec![Value::Integer(7)],
        );
        let mut rows = store.execute(&query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.columns(), &["id", "entry", "lemma"]);
        assert_eq!(rows.column_index("lemma"), Some(2));

        let row = rows.next_row().unwrap();
        assert_eq!(row.integer(0), Some(7));
        assert_eq!(row.text_named("entry").as_deref(), Some("<entry>cat</entry>"));
        assert_eq!(row.text_named("lemma").as_deref(), Some("cat"));
        assert!(rows.next_row().is_none());
    }

    #[test]
    fn test_null_and_missing_fields() {
        let (db_path, _temp) = create_test_db();
        let store = SqliteStore::open(&db_path).unwrap();
        let mut rows = store
            .execute(&SqlQuery::new("SELECT lemma FROM words WHERE id = 1"))
            .unwrap();
        let row = rows.next_row().unwrap();
        assert_eq!(row.text(0), None);
        assert_eq!(row.text_named("missing"), None);
        assert_eq!(row.get(3), None);
    }

    #[test]
    fn test_close_ends_iteration() {
        let (db_path, _temp) = create_test_db();
        let store = SqliteStore::open(&db_path).unwrap();
        let mut rows = store.execute(&SqlQuery::new("SELECT id FROM words")).unwrap();
        assert_eq!(rows.len(), 2);
        rows.close();
        assert!(rows.next_row().is_none());
    }

    #[test]
    fn test_failed_query_reports_database_error() {
        let (db_path, _temp) = create_test_db();
        let store = SqliteStore::open(&db_path).unwrap();
        let err = store
            .execute(&SqlQuery::new("SELECT * FROM no_such_table"))
            .unwrap_err();
        assert!(err.is_store_failure());
        assert!(err.to_string().contains("no_such_table"));
    }

    #[test]
    fn test_store_is_read_only() {
        let (db_path, _temp) = create_test_db();
        let store = SqliteStore::open(&db_path).unwrap();
        let result = store.execute(&SqlQuery::new("DELETE FROM words"));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_connection() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (n INTEGER); INSERT INTO t VALUES (3);")
            .unwrap();
        let store = SqliteStore::from_connection(conn).unwrap();
        assert!(store.db_path().is_none());
        let mut rows = store.execute(&SqlQuery::new("SELECT n FROM t")).unwrap();
        assert_eq!(rows.next_row().unwrap().integer(0), Some(3));
    }

    #[test]
    fn test_integer_from_text() {
        let mut rows = RowSet::new(
            vec!["hits".to_string()],
            vec![vec![Value::Text(" 12 ".to_string())]],
        );
        assert_eq!(rows.next_row().unwrap().integer_named("hits"), Some(12));
    }
}
