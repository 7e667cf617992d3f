//! SQLite record store.
//!
//! [`Store`] owns a single `rusqlite::Connection`. Repository methods are
//! grouped per entity in the submodules, all as inherent methods on `Store`.
//! The table layout is a fixed bootstrap applied on open; there is no
//! migration machinery.

mod analysis;
mod audit;
mod catalog;
mod datasets;
mod jobs;
mod models;

use crate::error::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

const BOOTSTRAP: &str = r#"
CREATE TABLE IF NOT EXISTS tags (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    category    TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS data_schemas (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    tag_id      INTEGER NOT NULL REFERENCES tags(id),
    name        TEXT NOT NULL,
    version     TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    UNIQUE (tag_id, name, version)
);

CREATE TABLE IF NOT EXISTS data_fields (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    schema_id     INTEGER NOT NULL REFERENCES data_schemas(id) ON DELETE CASCADE,
    name          TEXT NOT NULL,
    data_type     TEXT NOT NULL,
    required      INTEGER NOT NULL DEFAULT 0,
    nullable      INTEGER NOT NULL DEFAULT 1,
    default_value TEXT,
    position      INTEGER NOT NULL DEFAULT 0,
    description   TEXT NOT NULL DEFAULT '',
    UNIQUE (schema_id, name)
);

CREATE TABLE IF NOT EXISTS datasets (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    tag_id      INTEGER NOT NULL REFERENCES tags(id),
    schema_id   INTEGER REFERENCES data_schemas(id),
    description TEXT NOT NULL DEFAULT '',
    source_type TEXT NOT NULL,
    source_info TEXT NOT NULL DEFAULT '',
    status      TEXT NOT NULL,
    num_records INTEGER,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dataset_files (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset_id  INTEGER NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
    path        TEXT NOT NULL,
    format      TEXT NOT NULL,
    size        INTEGER,
    checksum    TEXT,
    position    INTEGER NOT NULL DEFAULT 0,
    uploaded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dataset_profiles (
    dataset_id   INTEGER PRIMARY KEY REFERENCES datasets(id) ON DELETE CASCADE,
    data         TEXT NOT NULL,
    generated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS analysis_templates (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT NOT NULL UNIQUE,
    tag_id           INTEGER REFERENCES tags(id),
    description      TEXT NOT NULL DEFAULT '',
    code_identifier  TEXT,
    parameter_schema TEXT NOT NULL DEFAULT '[]',
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS analysis_runs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id INTEGER NOT NULL REFERENCES analysis_templates(id),
    dataset_id  INTEGER NOT NULL REFERENCES datasets(id),
    status      TEXT NOT NULL,
    parameters  TEXT NOT NULL DEFAULT '{}',
    result      TEXT,
    log         TEXT NOT NULL DEFAULT '',
    created_by  TEXT,
    created_at  TEXT NOT NULL,
    started_at  TEXT,
    finished_at TEXT
);

CREATE TABLE IF NOT EXISTS ml_models (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT NOT NULL UNIQUE,
    tag_id           INTEGER NOT NULL REFERENCES tags(id),
    task_type        TEXT NOT NULL,
    description      TEXT NOT NULL DEFAULT '',
    input_schema_id  INTEGER REFERENCES data_schemas(id),
    output_schema_id INTEGER REFERENCES data_schemas(id),
    is_active        INTEGER NOT NULL DEFAULT 1,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ml_model_versions (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    model_id              INTEGER NOT NULL REFERENCES ml_models(id),
    version               TEXT NOT NULL,
    status                TEXT NOT NULL,
    artifact_path         TEXT,
    metrics               TEXT,
    trained_on_dataset_id INTEGER REFERENCES datasets(id),
    description           TEXT NOT NULL DEFAULT '',
    created_at            TEXT NOT NULL,
    UNIQUE (model_id, version)
);

CREATE TABLE IF NOT EXISTS ml_training_runs (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    model_version_id INTEGER NOT NULL REFERENCES ml_model_versions(id),
    dataset_id       INTEGER REFERENCES datasets(id),
    status           TEXT NOT NULL,
    hyperparams      TEXT NOT NULL DEFAULT '{}',
    log              TEXT NOT NULL DEFAULT '',
    created_by       TEXT,
    created_at       TEXT NOT NULL,
    started_at       TEXT,
    finished_at      TEXT
);

CREATE TABLE IF NOT EXISTS jobs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    job_type    TEXT NOT NULL,
    target_id   TEXT NOT NULL,
    status      TEXT NOT NULL,
    priority    INTEGER NOT NULL DEFAULT 0,
    queue       TEXT NOT NULL DEFAULT 'default',
    log         TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    started_at  TEXT,
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_jobs_pending ON jobs (queue, status, priority DESC, created_at);

CREATE TABLE IF NOT EXISTS audit_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type  TEXT NOT NULL,
    actor       TEXT,
    target_type TEXT NOT NULL,
    target_id   TEXT NOT NULL,
    message     TEXT NOT NULL DEFAULT '',
    payload     TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT NOT NULL
);
"#;

/// Handle to the record store.
pub struct Store {
    conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Store {
    /// Open (creating if needed) a store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "Opened record store");
        Self::bootstrap(conn)
    }

    /// A private in-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(BOOTSTRAP)?;
        Ok(Self { conn })
    }

    /// Raw access for callers that need ad-hoc queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Serialize a value into a JSON text column.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Read a JSON text column.
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a nullable JSON text column.
pub(crate) fn json_column_opt<T: DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        serde_json::from_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Read a non-negative count stored as INTEGER.
pub(crate) fn count_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    let value: Option<i64> = row.get(idx)?;
    Ok(value.map(|v| v.max(0) as u64))
}

/// Append `line` to a newline-separated log.
pub(crate) fn append_line(log: &str, line: &str) -> String {
    if log.is_empty() {
        line.to_string()
    } else {
        format!("{log}\n{line}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("desk.db");
        drop(Store::open(&path).unwrap());
        let store = Store::open(&path).unwrap();
        let tables: i64 = store
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 13);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let store = Store::open_in_memory().unwrap();
        let on: bool = store
            .connection()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(on);
    }

    #[test]
    fn test_append_line() {
        assert_eq!(append_line("", "a"), "a");
        assert_eq!(append_line("a", "b"), "a\nb");
    }
}
