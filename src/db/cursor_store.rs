use duckdb::{params, Connection};
use log::warn;

use crate::errors::{Result, SyncError};

/// Marker of the last processed version of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub last_update: String,
    /// Rows already exported.  Only tracked by the incremental sync.
    pub row_count: Option<u64>,
}

/// Small key-value store holding one cursor per dataset key.
pub trait CursorStore {
    fn get(&self, key: &str) -> Result<Option<Cursor>>;

    /// Fails with [`SyncError::CursorExists`] if the key is already present.
    fn insert(&self, key: &str, cursor: &Cursor) -> Result<()>;

    /// Fails with [`SyncError::CursorMissing`] if the key is not present.
    fn update(&self, key: &str, cursor: &Cursor) -> Result<()>;
}

pub struct DuckDbCursorStore {
    conn: Connection,
}

impl DuckDbCursorStore {
    /// Open (and create if needed) the cursor table in the DuckDB file at
    /// `path`.  An empty path gives an in-memory store.
    pub fn open(path: &str) -> Result<DuckDbCursorStore> {
        let conn = if path.is_empty() {
            warn!("no cursor store path configured, using an in-memory store");
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS sync_cursor (
    key VARCHAR PRIMARY KEY,
    last_update VARCHAR NOT NULL,
    row_count BIGINT
);
            "#,
        )?;
        Ok(DuckDbCursorStore { conn })
    }
}

impl CursorStore for DuckDbCursorStore {
    fn get(&self, key: &str) -> Result<Option<Cursor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT last_update, row_count FROM sync_cursor WHERE key = ?")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => {
                let row_count: Option<i64> = row.get(1)?;
                Ok(Some(Cursor {
                    last_update: row.get(0)?,
                    row_count: row_count.map(|n| n as u64),
                }))
            }
            None => Ok(None),
        }
    }

    fn insert(&self, key: &str, cursor: &Cursor) -> Result<()> {
        if self.get(key)?.is_some() {
            return Err(SyncError::CursorExists(key.to_string()));
        }
        self.conn.execute(
            "INSERT INTO sync_cursor (key, last_update, row_count) VALUES (?, ?, ?)",
            params![key, cursor.last_update, cursor.row_count.map(|n| n as i64)],
        )?;
        Ok(())
    }

    fn update(&self, key: &str, cursor: &Cursor) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE sync_cursor SET last_update = ?, row_count = ? WHERE key = ?",
            params![cursor.last_update, cursor.row_count.map(|n| n as i64), key],
        )?;
        if n == 0 {
            return Err(SyncError::CursorMissing(key.to_string()));
        }
        Ok(())
    }
}
