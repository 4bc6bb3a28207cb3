//! SQLite-backed local store.
//!
//! Documents are flattened into one row per leaf, keyed by full path, so a
//! subtree read is a prefix scan and `update_field` touches a single row.
//! Used when no remote database is configured.

use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::memory::entry;
use super::{data_dir, segments, PersistenceStore};
use crate::error::{CoreError, StoreError};

pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    /// Open the store at `~/.config/pomotray/pomotray.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("pomotray.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                path  TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn normalize(path: &str) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}

/// Flatten `value` into `(path, json)` leaf rows below `prefix`.
fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten(&format!("{prefix}/{key}"), child, out);
            }
        }
        Value::Null => {}
        leaf => out.push((prefix.to_string(), leaf.to_string())),
    }
}

fn write_subtree(conn: &Connection, path: &str, value: &Value) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;
    // Ancestors stored as leaves would shadow the new subtree.
    let parts: Vec<&str> = path.split('/').collect();
    for depth in 1..parts.len() {
        tx.execute(
            "DELETE FROM documents WHERE path = ?1",
            params![parts[..depth].join("/")],
        )?;
    }
    tx.execute(
        "DELETE FROM documents WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2",
        params![path, format!("{path}/")],
    )?;

    let mut rows = Vec::new();
    flatten(path, value, &mut rows);
    for (leaf_path, json) in rows {
        tx.execute(
            "INSERT OR REPLACE INTO documents (path, value) VALUES (?1, ?2)",
            params![leaf_path, json],
        )?;
    }
    tx.commit()?;
    Ok(())
}

impl PersistenceStore for LocalStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let path = normalize(path);
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT path, value FROM documents
             WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2",
        )?;
        let rows = stmt.query_map(params![path, format!("{path}/")], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut root = Value::Null;
        let mut found = false;
        for row in rows {
            let (row_path, raw) = row?;
            let value: Value = serde_json::from_str(&raw).map_err(|e| StoreError::Decode {
                path: row_path.clone(),
                message: e.to_string(),
            })?;
            found = true;
            if row_path == path {
                return Ok(Some(value));
            }
            *entry(&mut root, &row_path[path.len() + 1..]) = value;
        }
        Ok(found.then_some(root))
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let path = normalize(path);
        write_subtree(&self.conn(), &path, &value)
    }

    fn update_field(&self, path: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let path = normalize(path);
        let conn = self.conn();
        let leaf: Option<String> = conn
            .query_row(
                "SELECT value FROM documents WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        if let Some(raw) = leaf {
            if raw != "{}" {
                return Err(StoreError::NotAnObject(path));
            }
        }

        write_subtree(&conn, &format!("{path}/{key}"), &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn roundtrips_nested_documents() {
        let store = LocalStore::open_memory().unwrap();
        let settings = json!({"work_timer": 25, "Spotify": false, "nested": {"a": [1, 2]}});
        store.set("pomodoro/settings", settings.clone()).unwrap();
        assert_eq!(store.get("pomodoro/settings").unwrap(), Some(settings));
        assert_eq!(store.get("pomodoro/settings/work_timer").unwrap(), Some(json!(25)));
        assert_eq!(store.get("pomodoro/missing").unwrap(), None);
    }

    #[test]
    fn update_field_only_touches_one_key() {
        let store = LocalStore::open_memory().unwrap();
        store
            .set("s", json!({"work_timer": 25, "pause_timer": 5}))
            .unwrap();
        store.update_field("s", "work_timer", json!(30)).unwrap();
        assert_eq!(
            store.get("s").unwrap(),
            Some(json!({"work_timer": 30, "pause_timer": 5}))
        );
    }

    #[test]
    fn set_replaces_whole_subtree() {
        let store = LocalStore::open_memory().unwrap();
        store.set("s", json!({"a": 1, "b": 2})).unwrap();
        store.set("s", json!({"c": 3})).unwrap();
        assert_eq!(store.get("s").unwrap(), Some(json!({"c": 3})));
    }

    #[test]
    fn underscores_are_not_wildcards() {
        let store = LocalStore::open_memory().unwrap();
        store.set("time_done/x", json!(1)).unwrap();
        store.set("timeXdone/y", json!(2)).unwrap();
        assert_eq!(store.get("time_done").unwrap(), Some(json!({"x": 1})));
    }

    #[test]
    fn update_field_rejects_scalar_document() {
        let store = LocalStore::open_memory().unwrap();
        store.set("flag", json!(true)).unwrap();
        assert!(matches!(
            store.update_field("flag", "x", json!(1)),
            Err(StoreError::NotAnObject(_))
        ));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");
        {
            let store = LocalStore::open_at(&path).unwrap();
            store.update_field("days/2024-05-01", "time_worked", json!(12)).unwrap();
        }
        let store = LocalStore::open_at(&path).unwrap();
        assert_eq!(
            store.get("days/2024-05-01/time_worked").unwrap(),
            Some(json!(12))
        );
    }
}
