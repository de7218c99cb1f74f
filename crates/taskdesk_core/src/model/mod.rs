//! Domain model for tasks and the users that own them.
//!
//! # Responsibility
//! - Define self-validating entity records and their persisted shape.
//! - Expose every mutation as a closed patch enum routed to a mutator.
//!
//! # Invariants
//! - Every entity is identified by a stable string id.
//! - Derived fields (`is_overdue`, `progress`) are computed, never stored.

pub mod task;
pub mod user;
pub mod validation;
