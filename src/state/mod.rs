//! Mutation protocol, mode resolution and the version history.
//!
//! A mutator maps the current state to a [`Mutation`]. Per-call
//! [`SetConfig`] overrides are resolved against the store's [`Modes`] to
//! decide whether a ready or a pending mutation is expected and whether the
//! committed state goes into the [`HistoryIndex`].

mod history;
mod mode;
mod mutation;

pub use history::HistoryIndex;
pub use mode::{Modes, SetConfig};
pub use mutation::Mutation;
pub(crate) use mutation::invoke;
