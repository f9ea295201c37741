//! Subscriber callback types.

use crate::types::Update;
use std::fmt;
use std::sync::Arc;

/// Whether a subscriber stays registered after a delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    Keep,
    Drop,
}

type Listener<S> = dyn Fn(&Update<S>) -> Delivery + Send + Sync;

/// A subscriber callback.
///
/// Identity is the shared allocation: clones of one `Callback` are the same
/// subscriber, and registering it twice is a no-op. Two callbacks built from
/// identical closures are different subscribers.
pub struct Callback<S>(Arc<Listener<S>>);

impl<S: 'static> Callback<S> {
    /// Wrap a closure receiving each committed update.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Update<S>) + Send + Sync + 'static,
    {
        Callback(Arc::new(move |update: &Update<S>| {
            f(update);
            Delivery::Keep
        }))
    }

    /// A callback that can ask to be removed after a delivery.
    pub(crate) fn with_delivery<F>(f: F) -> Self
    where
        F: Fn(&Update<S>) -> Delivery + Send + Sync + 'static,
    {
        Callback(Arc::new(f))
    }
}

impl<S> Callback<S> {
    pub(crate) fn deliver(&self, update: &Update<S>) -> Delivery {
        (self.0)(update)
    }

    /// True if both values are the same subscriber.
    pub fn same_as(&self, other: &Callback<S>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<S> Clone for Callback<S> {
    fn clone(&self) -> Self {
        Callback(Arc::clone(&self.0))
    }
}

impl<S> fmt::Debug for Callback<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}
