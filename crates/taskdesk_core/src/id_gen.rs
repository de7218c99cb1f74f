//! Injected entity id generation.
//!
//! Repositories and services never derive ids from wall-clock state; they ask
//! an `IdGenerator`, so creation is deterministic under test.

use std::cell::Cell;
use uuid::Uuid;

/// Produces fresh, collision-resistant entity ids.
pub trait IdGenerator {
    fn next_id(&self) -> String;
}

/// Random v4 UUID ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Monotonic `prefix-N` ids, starting at 1.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: Cell<u64>,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: Cell::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let value = self.next.get();
        self.next.set(value + 1);
        format!("{}-{value}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};

    #[test]
    fn sequential_ids_are_monotonic() {
        let ids = SequentialIdGenerator::new("task");
        assert_eq!(ids.next_id(), "task-1");
        assert_eq!(ids.next_id(), "task-2");
    }

    #[test]
    fn uuid_ids_do_not_repeat() {
        let ids = UuidIdGenerator;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
