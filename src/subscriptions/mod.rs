//! Subscriber callbacks and their delivery.
//!
//! Every committed mutation is broadcast to the store's subscriber set:
//! - Callbacks run in registration order, outside the store lock
//! - A panicking callback is logged and does not affect the others
//! - Registering the same [`Callback`] twice is a no-op
//!
//! Subscriptions can also be consumed as a bounded channel through
//! [`Watcher`], which is dropped when its buffer overflows.
//!
//! # Example
//!
//! ```ignore
//! let store = Store::new(0);
//!
//! let handle = store.subscribe_fn(|update| println!("now {}", update.state));
//! let watcher = store.watch(16);
//!
//! store.set(|x| Mutation::ready(x + 1), SetConfig::new()).await?;
//! let update = watcher.recv()?;
//!
//! handle.unsubscribe(false);
//! ```

mod manager;
mod types;
mod watch;

pub use manager::SubscriberSet;
pub use types::Callback;
pub use watch::Watcher;

pub(crate) use manager::broadcast;
pub(crate) use watch::channel_callback;
