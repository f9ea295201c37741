//! The subscriber set and update broadcasting.

use crate::types::Update;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

use super::types::{Callback, Delivery};

/// Insertion-ordered set of subscriber callbacks, deduplicated by identity.
pub struct SubscriberSet<S> {
    callbacks: Vec<Callback<S>>,
}

impl<S> SubscriberSet<S> {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Register a callback. Returns false if it was already present.
    pub fn insert(&mut self, callback: Callback<S>) -> bool {
        if self.contains(&callback) {
            return false;
        }
        self.callbacks.push(callback);
        true
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn remove(&mut self, callback: &Callback<S>) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|cb| !cb.same_as(callback));
        self.callbacks.len() != before
    }

    pub fn contains(&self, callback: &Callback<S>) -> bool {
        self.callbacks.iter().any(|cb| cb.same_as(callback))
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Copy of the current callbacks, in insertion order, for broadcasting
    /// outside the store lock.
    pub fn snapshot(&self) -> Vec<Callback<S>> {
        self.callbacks.clone()
    }
}

impl<S> Default for SubscriberSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver an update to every callback in order.
///
/// A panicking callback is logged and skipped; the remaining callbacks still
/// run. Returns the callbacks that asked to be removed.
pub(crate) fn broadcast<S>(callbacks: &[Callback<S>], update: &Update<S>) -> Vec<Callback<S>> {
    let mut to_remove = Vec::new();

    for callback in callbacks {
        match catch_unwind(AssertUnwindSafe(|| callback.deliver(update))) {
            Ok(Delivery::Keep) => {}
            Ok(Delivery::Drop) => to_remove.push(callback.clone()),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                error!(?callback, %message, "broadcast: subscriber panicked");
            }
        }
    }

    to_remove
}
