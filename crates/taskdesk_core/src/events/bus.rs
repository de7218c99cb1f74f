//! Synchronous in-process event bus.
//!
//! # Invariants
//! - `emit` never fails and never panics on behalf of a listener.
//! - A listener returning `Err` or panicking is logged and skipped; later
//!   listeners still run.

use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};

pub type ListenerError = Box<dyn Error>;
pub type ListenerResult = Result<(), ListenerError>;

type Listener<T> = Box<dyn Fn(&T) -> ListenerResult>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Best-effort fan-out of `T` to registered listeners.
pub struct EventBus<T> {
    name: &'static str,
    listeners: RefCell<Vec<(SubscriptionId, Listener<T>)>>,
    next_id: Cell<u64>,
}

impl<T> EventBus<T> {
    /// `name` tags log lines emitted by this bus.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&T) -> ListenerResult + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Box::new(listener)));
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(current, _)| *current != id);
        listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Notifies every listener in registration order.
    ///
    /// Listeners must not subscribe or unsubscribe on this bus while being
    /// notified.
    pub fn emit(&self, event: &T) {
        let listeners = self.listeners.borrow();
        let mut failed = 0usize;
        for (id, listener) in listeners.iter() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failed += 1;
                    warn!(
                        "event=listener_failed module=events status=error bus={} \
                         subscription={} error={err}",
                        self.name, id.0
                    );
                }
                Err(_) => {
                    failed += 1;
                    warn!(
                        "event=listener_panicked module=events status=error bus={} subscription={}",
                        self.name, id.0
                    );
                }
            }
        }
        debug!(
            "event=bus_emit module=events status=ok bus={} listeners={} failed={failed}",
            self.name,
            listeners.len()
        );
    }
}
