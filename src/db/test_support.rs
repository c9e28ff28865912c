// src/db/test_support.rs
//
// Fixtures shared by the context and repository tests.

use rusqlite::types::Value;
use rusqlite::Row;
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::DatabaseOptions;
use crate::db::{create_connection_pool, initialize_database, ConnectionPool};
use crate::domain::Entity;

const NOTES_TABLE: &str = "CREATE TABLE notes (
    id    INTEGER PRIMARY KEY NOT NULL,
    name  TEXT NOT NULL,
    body  TEXT
);";

/// On-disk database in a temp dir; keep the `TempDir` alive for the test.
pub(crate) fn test_pool() -> (TempDir, Arc<ConnectionPool>) {
    let dir = tempfile::tempdir().unwrap();
    let pool = create_connection_pool(&DatabaseOptions::new(dir.path().join("test.db"))).unwrap();

    {
        let conn = pool.get().unwrap();
        initialize_database(&conn).unwrap();
        conn.execute_batch(NOTES_TABLE).unwrap();
    }

    (dir, Arc::new(pool))
}

/// Untracked entity keyed by an integer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Note {
    pub id: i64,
    pub name: String,
    pub body: Option<String>,
}

impl Note {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            body: None,
        }
    }
}

impl Entity for Note {
    type Id = i64;

    const TABLE: &'static str = "notes";
    const COLUMNS: &'static [&'static str] = &["name", "body"];

    fn id(&self) -> &i64 {
        &self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone()), self.body.clone().into()]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Note {
            id: row.get("id")?,
            name: row.get("name")?,
            body: row.get("body")?,
        })
    }
}
