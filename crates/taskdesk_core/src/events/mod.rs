//! Typed observer bus and the domain events carried on it.
//!
//! # Responsibility
//! - Deliver events synchronously to subscribers in registration order.
//! - Isolate subscribers from each other's failures.

mod bus;
mod types;

pub use bus::{EventBus, ListenerError, ListenerResult, SubscriptionId};
pub use types::{ControllerEvent, ServiceEvent};
