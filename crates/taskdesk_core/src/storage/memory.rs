//! In-process storage backend.

use super::{Storage, StorageResult};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Map-backed storage with call counters for observing cache behavior.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: RefCell<HashMap<String, Vec<Value>>>,
    load_calls: Cell<usize>,
    save_calls: Cell<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `load` calls served so far.
    pub fn load_calls(&self) -> usize {
        self.load_calls.get()
    }

    /// Number of `save` calls served so far.
    pub fn save_calls(&self) -> usize {
        self.save_calls.get()
    }

    /// Snapshot of one collection without counting as a load.
    pub fn records(&self, key: &str) -> Vec<Value> {
        self.collections
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Overwrites one collection without counting as a save.
    ///
    /// Lets tests stage data "behind" a repository's cache.
    pub fn seed(&self, key: &str, records: Vec<Value>) {
        self.collections
            .borrow_mut()
            .insert(key.to_string(), records);
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str, fallback: Vec<Value>) -> StorageResult<Vec<Value>> {
        self.load_calls.set(self.load_calls.get() + 1);
        Ok(self
            .collections
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(fallback))
    }

    fn save(&self, key: &str, records: &[Value]) -> StorageResult<()> {
        self.save_calls.set(self.save_calls.get() + 1);
        self.collections
            .borrow_mut()
            .insert(key.to_string(), records.to_vec());
        Ok(())
    }
}
