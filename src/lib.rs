//! # State Cell
//!
//! An observable, versioned state cell: one value of application state,
//! replaced only by mutator functions, observable through callbacks, and
//! optionally indexed so earlier versions can be looked up by id.
//!
//! ## Core Concepts
//!
//! - **Mutators**: Functions from the current state to a [`Mutation`],
//!   either ready or pending (asynchronous)
//! - **Versions**: Every commit gets a fresh [`VersionId`]
//! - **History**: Indexed versions stay retrievable for the store's lifetime
//! - **Subscriptions**: Callbacks notified on every commit, with handles that
//!   chain and can unsubscribe up their parent chain
//!
//! ## Example
//!
//! ```ignore
//! use statecell::{Mutation, SetConfig, Store, StoreOptions};
//!
//! let store = Store::create(StoreOptions::new(0).with_index(true));
//!
//! let handle = store.subscribe_fn(|update| {
//!     println!("state {} at {:?}", update.state, update.id);
//! });
//!
//! let update = store.set(|x| Mutation::ready(x + 1), SetConfig::new()).await?;
//! let id = update.id.unwrap();
//!
//! // Later
//! let snapshot = store.get(Some(id.as_str()))?;
//! assert_eq!(*snapshot.state, 1);
//!
//! handle.unsubscribe(false);
//! ```

pub mod error;
pub mod state;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{BoxError, MutatorPanic, Result, StoreError};
pub use state::{HistoryIndex, Modes, Mutation, SetConfig};
pub use store::{Pending, Store, StoreOptions};
pub use subscriptions::{Callback, SubscriberSet, Watcher};
pub use types::*;
