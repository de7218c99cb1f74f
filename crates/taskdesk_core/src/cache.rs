//! Per-id time-bounded entity cache.
//!
//! # Responsibility
//! - Shadow recently written or read entities keyed by id.
//! - Treat entries older than the TTL as absent.
//!
//! # Invariants
//! - A stale entry is evicted on the read that observes it.
//! - The cache is private to one repository instance; writes made through
//!   another instance sharing the same storage are not observed.

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const TASK_CACHE_TTL_SECS: i64 = 5 * 60;
pub const USER_CACHE_TTL_SECS: i64 = 10 * 60;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// Cache of `(value, stored_at)` pairs with a fixed TTL.
pub struct TtlCache<V> {
    ttl: Duration,
    clock: Rc<dyn Clock>,
    entries: RefCell<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, clock: Rc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a fresh entry, evicting it instead when it has expired.
    pub fn get(&self, id: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.borrow_mut();
        let fresh = match entries.get(id) {
            Some(entry) => now - entry.stored_at < self.ttl,
            None => return None,
        };
        if fresh {
            entries.get(id).map(|entry| entry.value.clone())
        } else {
            entries.remove(id);
            None
        }
    }

    /// Stores `value` with a fresh timestamp.
    pub fn insert(&self, id: &str, value: V) {
        let stored_at = self.clock.now();
        self.entries
            .borrow_mut()
            .insert(id.to_string(), CacheEntry { value, stored_at });
    }

    /// Returns whether an entry was present.
    pub fn evict(&self, id: &str) -> bool {
        self.entries.borrow_mut().remove(id).is_some()
    }

    /// Presence check that ignores freshness and never evicts.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.borrow().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
