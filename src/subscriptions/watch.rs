//! Channel-backed subscriptions.

use crate::store::Store;
use crate::types::Update;
use crossbeam_channel::{bounded, Receiver, RecvError, RecvTimeoutError, TryRecvError, TrySendError};
use std::time::Duration;
use tracing::warn;

use super::types::{Callback, Delivery};

/// Build a callback forwarding updates into a bounded channel.
///
/// The callback asks to be removed once the buffer is full or the receiver
/// is gone.
pub(crate) fn channel_callback<S>(buffer: usize) -> (Callback<S>, Receiver<Update<S>>)
where
    S: Send + Sync + 'static,
{
    let (sender, receiver) = bounded(buffer.max(1));

    let callback = Callback::with_delivery(move |update: &Update<S>| {
        match sender.try_send(update.clone()) {
            Ok(()) => Delivery::Keep,
            Err(TrySendError::Full(_)) => {
                warn!(capacity = ?sender.capacity(), "watch: buffer full, dropping watcher");
                Delivery::Drop
            }
            Err(TrySendError::Disconnected(_)) => Delivery::Drop,
        }
    });

    (callback, receiver)
}

/// A subscription delivering updates through a channel instead of a
/// callback.
pub struct Watcher<S> {
    handle: Store<S>,
    receiver: Receiver<Update<S>>,
}

impl<S> Watcher<S> {
    pub(crate) fn new(handle: Store<S>, receiver: Receiver<Update<S>>) -> Self {
        Self { handle, receiver }
    }

    /// Receive the next update (blocking).
    pub fn recv(&self) -> Result<Update<S>, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an update (non-blocking).
    pub fn try_recv(&self) -> Result<Update<S>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Update<S>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<Update<S>> {
        self.receiver.try_iter().collect()
    }

    /// The subscription handle backing this watcher.
    pub fn handle(&self) -> &Store<S> {
        &self.handle
    }

    /// Whether the watcher is still registered with the store.
    pub fn is_active(&self) -> bool {
        self.handle.is_subscribed()
    }
}

impl<S: Send + Sync + 'static> Watcher<S> {
    /// Unsubscribe and return the parent handle.
    pub fn close(self) -> Store<S> {
        self.handle.unsubscribe(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Mutation, SetConfig, Store, StoreOptions};
    use std::time::Duration;

    #[test]
    fn test_watch_receives_updates() {
        let store = Store::create(StoreOptions::new(0).with_index(true));
        let watcher = store.watch(8);

        let _ = store.set(|x| Mutation::ready(x + 1), SetConfig::new());
        let _ = store.set(|x| Mutation::ready(x + 1), SetConfig::unindexed());

        let first = watcher.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(*first.state, 1);
        assert!(first.id.is_some());

        let second = watcher.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(*second.state, 2);
        assert!(second.id.is_none());
    }

    #[test]
    fn test_slow_watcher_is_dropped() {
        let store = Store::new(0);
        let watcher = store.watch(2);
        assert_eq!(store.subscriber_count(), 1);

        for _ in 0..5 {
            let _ = store.set(|x| Mutation::ready(x + 1), SetConfig::new());
        }

        assert!(!watcher.is_active());
        assert_eq!(store.subscriber_count(), 0);
        assert_eq!(watcher.drain().len(), 2);
    }

    #[test]
    fn test_close_unsubscribes() {
        let store = Store::new("a");
        let watcher = store.watch(4);

        let parent = watcher.close();
        assert!(parent.is_root());
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let store = Store::new(1);
        drop(store.watch(4));
        assert_eq!(store.subscriber_count(), 1);

        let _ = store.set(|x| Mutation::ready(x + 1), SetConfig::new());
        assert_eq!(store.subscriber_count(), 0);
    }
}
