//! SQLite-backed storage backend.
//!
//! # Invariants
//! - Each collection is one row in `collections`, holding a JSON array.
//! - Rows that do not decode to a JSON array are reported, never masked.

use super::{Storage, StorageError, StorageResult};
use crate::db::{open_db, open_db_in_memory};
use log::error;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

/// Key/collection store over a migrated SQLite connection.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }

    /// Returns stored collection keys sorted by name.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM collections ORDER BY key ASC;")?;
        let mut rows = stmt.query([])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get(0)?);
        }
        Ok(keys)
    }
}

impl Storage for SqliteStorage {
    fn load(&self, key: &str, fallback: Vec<Value>) -> StorageResult<Vec<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT records FROM collections WHERE key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(fallback);
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(records)) => Ok(records),
            Ok(_) => Err(corrupt(key, "payload is not a JSON array".to_string())),
            Err(err) => Err(corrupt(key, err.to_string())),
        }
    }

    fn save(&self, key: &str, records: &[Value]) -> StorageResult<()> {
        let payload = serde_json::to_string(records)?;
        self.conn.execute(
            "INSERT INTO collections (key, records, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(key) DO UPDATE SET
                records = excluded.records,
                updated_at = excluded.updated_at;",
            params![key, payload],
        )?;
        Ok(())
    }
}

fn corrupt(key: &str, message: String) -> StorageError {
    error!(
        "event=storage_load module=storage status=error key={key} error_code=corrupt_collection"
    );
    StorageError::Corrupt {
        key: key.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStorage;
    use crate::storage::{Storage, StorageError};
    use serde_json::json;

    #[test]
    fn save_then_load_returns_records_in_order() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let records = vec![json!({"id": "a"}), json!({"id": "b"})];
        storage.save("tasks", &records).unwrap();
        storage.save("users", &[]).unwrap();

        assert_eq!(storage.load("tasks", Vec::new()).unwrap(), records);
        assert_eq!(storage.keys().unwrap(), vec!["tasks", "users"]);
    }

    #[test]
    fn load_unknown_key_returns_fallback() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.load("tasks", Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn load_rejects_non_array_payload() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .conn
            .execute(
                "INSERT INTO collections (key, records) VALUES ('tasks', '{\"id\":1}');",
                [],
            )
            .unwrap();
        let err = storage.load("tasks", Vec::new()).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
