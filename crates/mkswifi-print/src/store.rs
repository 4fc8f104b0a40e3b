// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Machine metadata persisted in SQLite.
//
// One database holds the metadata of every machine profile, partitioned by
// machine id.  A batch of edits is applied inside a single transaction, so a
// binding change and its credential removal land together or not at all.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, params};
use tracing::{debug, info, instrument};

use mkswifi_core::error::{MksError, Result};
use mkswifi_core::metadata::{MetadataEdit, MetadataStore};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS machine_metadata (
        machine_id TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (machine_id, key)
    )
"#;

/// Metadata store for one machine profile, backed by a SQLite database.
///
/// All methods are synchronous because `rusqlite` does not support async
/// natively.  In an async context, wrap calls in `tokio::task::spawn_blocking`.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
    machine_id: String,
}

impl SqliteMetadataStore {
    /// Open (or create) the metadata database at `path` for `machine_id`.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), machine_id = %machine_id))]
    pub fn open(path: impl AsRef<Path>, machine_id: &str) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| MksError::Database(format!("open: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| MksError::Database(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| MksError::Database(format!("create table: {e}")))?;

        info!("machine metadata database opened");
        Ok(Self {
            conn: Mutex::new(conn),
            machine_id: machine_id.to_string(),
        })
    }

    /// Open an in-memory database.
    pub fn open_in_memory(machine_id: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MksError::Database(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| MksError::Database(format!("create table: {e}")))?;

        debug!("in-memory machine metadata database opened");
        Ok(Self {
            conn: Mutex::new(conn),
            machine_id: machine_id.to_string(),
        })
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetadataStore for SqliteMetadataStore {
    #[instrument(skip(self), fields(machine_id = %self.machine_id))]
    fn metadata(&self) -> Result<BTreeMap<String, String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT key, value FROM machine_metadata WHERE machine_id = ?1")
            .map_err(|e| MksError::Database(format!("prepare metadata: {e}")))?;

        let entries = stmt
            .query_map(params![self.machine_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| MksError::Database(format!("query metadata: {e}")))?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()
            .map_err(|e| MksError::Database(format!("collect rows: {e}")))?;

        Ok(entries)
    }

    #[instrument(skip(self, edits), fields(machine_id = %self.machine_id, count = edits.len()))]
    fn apply(&self, edits: &[MetadataEdit]) -> Result<()> {
        if edits.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| MksError::Database(format!("begin: {e}")))?;

        for edit in edits {
            match edit {
                MetadataEdit::Set { key, value } => {
                    tx.execute(
                        "INSERT INTO machine_metadata (machine_id, key, value)
                         VALUES (?1, ?2, ?3)
                         ON CONFLICT (machine_id, key) DO UPDATE SET value = excluded.value",
                        params![self.machine_id, key, value],
                    )
                    .map_err(|e| MksError::Database(format!("set {key}: {e}")))?;
                }
                MetadataEdit::Remove { key } => {
                    tx.execute(
                        "DELETE FROM machine_metadata WHERE machine_id = ?1 AND key = ?2",
                        params![self.machine_id, key],
                    )
                    .map_err(|e| MksError::Database(format!("remove {key}: {e}")))?;
                }
            }
        }

        tx.commit()
            .map_err(|e| MksError::Database(format!("commit: {e}")))?;

        debug!("metadata edits committed");
        Ok(())
    }
}
