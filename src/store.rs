//! Main Store struct tying state, history and subscribers together.

use crate::error::{MutatorPanic, Result, StoreError};
use crate::state::{invoke, HistoryIndex, Modes, Mutation, SetConfig};
use crate::subscriptions::{broadcast, channel_callback, Callback, SubscriberSet, Watcher};
use crate::types::{Cascade, Snapshot, StoreStats, Update, VersionId};
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::{ReentrantMutex, RwLock};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, warn};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreOptions<S> {
    /// Starting state.
    pub initial: S,

    /// Index every committed state unless a call says otherwise.
    pub index: bool,

    /// Expect pending mutations unless a call says otherwise.
    pub asynchronous: bool,
}

impl<S: Default> Default for StoreOptions<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> StoreOptions<S> {
    pub fn new(initial: S) -> Self {
        Self {
            initial,
            index: false,
            asynchronous: false,
        }
    }

    pub fn with_index(mut self, index: bool) -> Self {
        self.index = index;
        self
    }

    pub fn with_asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    /// Build options from a dynamic configuration value carrying the
    /// `index` and `asynchronous` flags.
    pub fn from_json(initial: S, value: &serde_json::Value) -> Result<Self> {
        let flags = SetConfig::from_json(value)?;
        Ok(Self {
            initial,
            index: flags.index.unwrap_or(false),
            asynchronous: flags.asynchronous.unwrap_or(false),
        })
    }

    fn modes(&self) -> Modes {
        Modes {
            index: self.index,
            asynchronous: self.asynchronous,
        }
    }
}

/// Awaitable result of [`Store::set`].
///
/// On the synchronous path the mutation is already committed (and
/// subscribers notified) when `set` returns, so this resolves immediately.
/// On the asynchronous path the commit happens when this is polled to
/// completion.
#[must_use = "an asynchronous mutation is only committed when awaited"]
pub struct Pending<S> {
    future: BoxFuture<'static, Result<Update<S>>>,
    ready: bool,
}

impl<S: Send + Sync + 'static> Pending<S> {
    fn resolved(result: Result<Update<S>>) -> Self {
        Self {
            future: future::ready(result).boxed(),
            ready: true,
        }
    }

    fn deferred(future: BoxFuture<'static, Result<Update<S>>>) -> Self {
        Self {
            future,
            ready: false,
        }
    }
}

impl<S> Pending<S> {
    /// True when the outcome was decided inside `set`.
    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

impl<S> Future for Pending<S> {
    type Output = Result<Update<S>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl<S> fmt::Debug for Pending<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").field("ready", &self.ready).finish()
    }
}

/// Mutable state guarded by the store lock.
struct Core<S> {
    state: Arc<S>,
    id: VersionId,
    history: HistoryIndex<S>,
    subscribers: SubscriberSet<S>,
}

/// Everything shared between a store and its subscription handles.
struct Shared<S> {
    modes: Modes,
    /// Held across read, mutate and commit of a synchronous `set`.
    /// Reentrant so mutators and subscribers may call back into the store.
    write_gate: ReentrantMutex<()>,
    core: RwLock<Core<S>>,
}

impl<S> Shared<S> {
    /// Install the next state, then notify subscribers outside the lock.
    fn commit(&self, next: S, index: bool) -> Update<S> {
        let state = Arc::new(next);

        let (update, callbacks) = {
            let mut core = self.core.write();
            let id = VersionId::generate();
            core.state = Arc::clone(&state);
            core.id = id.clone();
            if index {
                core.history.record(id.clone(), Arc::clone(&state));
            }
            debug!(%id, indexed = index, "Store::commit: committed");

            let update = Update {
                state,
                id: index.then_some(id),
            };
            (update, core.subscribers.snapshot())
        };

        let rejected = broadcast(&callbacks, &update);
        if !rejected.is_empty() {
            let mut core = self.core.write();
            for callback in &rejected {
                core.subscribers.remove(callback);
            }
        }

        update
    }
}

/// One link of a subscription chain.
struct Link<S> {
    callback: Callback<S>,
    parent: Option<Arc<Link<S>>>,
}

/// An observable, versioned state cell.
///
/// The value returned by [`Store::create`] is the root. Every
/// [`Store::subscribe`] returns another `Store` aliasing the same state,
/// history and subscribers, which additionally remembers its own callback
/// and the handle it was created from. Unsubscribing walks that parent
/// chain.
///
/// Synchronous `set` calls are serialized: concurrent callers on other
/// threads each see the state left by the previous commit.
///
/// Overlapping asynchronous `set` calls are not serialized: each mutator
/// sees the state current when its `set` was called, the last one to
/// resolve determines the final state, and each notifies subscribers with
/// its own result.
pub struct Store<S> {
    shared: Arc<Shared<S>>,
    link: Option<Arc<Link<S>>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            link: self.link.clone(),
        }
    }
}

impl<S: Send + Sync + 'static> Store<S> {
    /// Create a store with default modes.
    pub fn new(initial: S) -> Self {
        Self::create(StoreOptions::new(initial))
    }

    /// Create a store.
    ///
    /// With `index` on, the initial state is recorded under the initial id.
    pub fn create(options: StoreOptions<S>) -> Self {
        let modes = options.modes();
        let state = Arc::new(options.initial);
        let id = VersionId::generate();

        let mut history = HistoryIndex::new();
        if modes.index {
            history.record(id.clone(), Arc::clone(&state));
        }

        debug!(
            %id,
            index = modes.index,
            asynchronous = modes.asynchronous,
            "Store::create: called"
        );

        Self {
            shared: Arc::new(Shared {
                modes,
                write_gate: ReentrantMutex::new(()),
                core: RwLock::new(Core {
                    state,
                    id,
                    history,
                    subscribers: SubscriberSet::new(),
                }),
            }),
            link: None,
        }
    }

    /// Create a store whose modes come from a dynamic configuration value.
    pub fn from_json(initial: S, options: &serde_json::Value) -> Result<Self> {
        Ok(Self::create(StoreOptions::from_json(initial, options)?))
    }

    // --- Mutation ---

    /// Run a mutator against the current state and commit its result.
    ///
    /// The mutator is invoked before `set` returns. In synchronous mode it
    /// must return [`Mutation::Ready`]; the commit and subscriber
    /// notification also happen before `set` returns. In asynchronous mode
    /// it must return [`Mutation::Pending`], and the commit happens when the
    /// returned [`Pending`] is awaited. A failed or panicking mutator, or a
    /// mutation of the wrong shape, leaves state and id untouched.
    pub fn set<F>(&self, mutator: F, config: SetConfig) -> Pending<S>
    where
        F: FnOnce(&S) -> Mutation<S>,
    {
        let modes = self.shared.modes.resolve(config);
        let _gate = (!modes.asynchronous).then(|| self.shared.write_gate.lock());
        let current = Arc::clone(&self.shared.core.read().state);

        match (invoke(mutator, &*current), modes.asynchronous) {
            (Mutation::Failed(cause), _) => {
                debug!(%cause, "Store::set: mutator failed");
                Pending::resolved(Err(StoreError::Mutator(cause)))
            }
            (Mutation::Ready(next), false) => {
                Pending::resolved(Ok(self.shared.commit(next, modes.index)))
            }
            (Mutation::Pending(future), true) => {
                let shared = Arc::clone(&self.shared);
                let index = modes.index;
                Pending::deferred(
                    async move {
                        let next = match AssertUnwindSafe(future).catch_unwind().await {
                            Ok(Ok(next)) => next,
                            Ok(Err(cause)) => {
                                debug!(%cause, "Store::set: pending mutation rejected");
                                return Err(StoreError::Mutator(cause));
                            }
                            Err(payload) => {
                                return Err(StoreError::Mutator(Box::new(
                                    MutatorPanic::from_payload(payload.as_ref()),
                                )));
                            }
                        };
                        Ok(shared.commit(next, index))
                    }
                    .boxed(),
                )
            }
            (mutation, asynchronous) => {
                let (mode, expected) = if asynchronous {
                    ("asynchronous", "pending")
                } else {
                    ("synchronous", "ready")
                };
                warn!(mode, got = mutation.kind(), "Store::set: protocol violation");
                Pending::resolved(Err(StoreError::ProtocolViolation(format!(
                    "{} mutation expects a {} result, got {}",
                    mode,
                    expected,
                    mutation.kind()
                ))))
            }
        }
    }

    /// Same pipeline as [`Store::set`], returning this handle for chaining.
    ///
    /// Failures of the mutation itself are logged, not returned. An
    /// asynchronous mutation is spawned onto the current Tokio runtime;
    /// without one this fails with [`StoreError::NoRuntime`] before the
    /// mutator runs.
    pub fn s<F>(&self, mutator: F, config: SetConfig) -> Result<&Self>
    where
        F: FnOnce(&S) -> Mutation<S>,
    {
        let modes = self.shared.modes.resolve(config);

        if modes.asynchronous {
            let runtime =
                tokio::runtime::Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
            let pending = self.set(mutator, config);
            runtime.spawn(async move {
                if let Err(err) = pending.await {
                    warn!(%err, "Store::s: mutation rejected");
                }
            });
        } else if let Some(Err(err)) = self.set(mutator, config).now_or_never() {
            warn!(%err, "Store::s: mutation rejected");
        }

        Ok(self)
    }

    // --- Retrieval ---

    /// Current state (`None`) or the state indexed under `id`.
    pub fn get(&self, id: Option<&str>) -> Result<Snapshot<S>> {
        let core = self.shared.core.read();
        match id {
            None => Ok(Snapshot {
                state: Arc::clone(&core.state),
                id: core.id.clone(),
            }),
            Some("") => Err(StoreError::InvalidArgument(
                "version id must be a non-empty string".to_string(),
            )),
            Some(id) => core
                .history
                .get(id)
                .map(|state| Snapshot {
                    state,
                    id: VersionId::from(id),
                })
                .ok_or_else(|| StoreError::NotFound(id.to_string())),
        }
    }

    /// [`Store::get`] with a dynamically typed id: `null`/`false` for the
    /// current state, a non-empty string for a lookup.
    pub fn get_json(&self, id: &serde_json::Value) -> Result<Snapshot<S>> {
        match id {
            serde_json::Value::Null | serde_json::Value::Bool(false) => self.get(None),
            serde_json::Value::String(id) => self.get(Some(id)),
            other => Err(StoreError::InvalidArgument(format!(
                "version id must be a string or false, got {}",
                other
            ))),
        }
    }

    /// Current state.
    pub fn state(&self) -> Arc<S> {
        Arc::clone(&self.shared.core.read().state)
    }

    /// Current version id.
    pub fn id(&self) -> VersionId {
        self.shared.core.read().id.clone()
    }

    /// Index the current state under the current id, then return the id.
    pub fn index_current(&self) -> VersionId {
        let mut guard = self.shared.core.write();
        let core = &mut *guard;
        if core.history.record_if_absent(&core.id, &core.state) {
            debug!(id = %core.id, "Store::index_current: indexed");
        }
        core.id.clone()
    }

    // --- Subscriptions ---

    /// Register a callback and return a handle whose parent is `self`.
    ///
    /// Registering a callback that is already present changes nothing in
    /// the subscriber set, but still returns a new handle for it.
    pub fn subscribe(&self, callback: Callback<S>) -> Store<S> {
        let added = self.shared.core.write().subscribers.insert(callback.clone());
        debug!(?callback, added, depth = self.depth() + 1, "Store::subscribe: called");

        Store {
            shared: Arc::clone(&self.shared),
            link: Some(Arc::new(Link {
                callback,
                parent: self.link.clone(),
            })),
        }
    }

    /// Subscribe a fresh callback built from `f`.
    pub fn subscribe_fn<F>(&self, f: F) -> Store<S>
    where
        F: Fn(&Update<S>) + Send + Sync + 'static,
    {
        self.subscribe(Callback::new(f))
    }

    /// Remove this handle's callback, cascading up the parent chain as
    /// `levels` asks.
    ///
    /// Returns the parent of the last handle whose callback was removed.
    /// The walk stops quietly at the root, and unsubscribing the root itself
    /// is a no-op. Removing a callback twice is a no-op.
    pub fn unsubscribe(&self, levels: impl Into<Cascade>) -> Store<S> {
        let mut levels = levels.into();
        let mut handle = self.clone();

        loop {
            let Some(link) = handle.link.clone() else {
                return handle;
            };

            let removed = self.shared.core.write().subscribers.remove(&link.callback);
            debug!(callback = ?link.callback, removed, "Store::unsubscribe: called");

            let parent = Store {
                shared: Arc::clone(&self.shared),
                link: link.parent.clone(),
            };

            match levels.next() {
                Some(next) => {
                    levels = next;
                    handle = parent;
                }
                None => return parent,
            }
        }
    }

    /// [`Store::unsubscribe`] with a dynamically typed level.
    pub fn unsubscribe_json(&self, levels: &serde_json::Value) -> Result<Store<S>> {
        Ok(self.unsubscribe(Cascade::from_json(levels)?))
    }

    /// Subscribe a bounded channel that receives every committed update.
    ///
    /// A watcher whose buffer fills up is dropped from the subscriber set.
    pub fn watch(&self, buffer: usize) -> Watcher<S> {
        let (callback, receiver) = channel_callback(buffer);
        Watcher::new(self.subscribe(callback), receiver)
    }
}

impl<S> Store<S> {
    /// True for the store returned by `create`, false for subscription
    /// handles.
    pub fn is_root(&self) -> bool {
        self.link.is_none()
    }

    /// The handle this one was subscribed from; `None` for the root.
    pub fn parent(&self) -> Option<Store<S>> {
        self.link.as_ref().map(|link| Store {
            shared: Arc::clone(&self.shared),
            link: link.parent.clone(),
        })
    }

    /// Number of subscriptions between this handle and the root.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut link = self.link.as_deref();
        while let Some(current) = link {
            depth += 1;
            link = current.parent.as_deref();
        }
        depth
    }

    /// The callback this handle is responsible for.
    pub fn callback(&self) -> Option<&Callback<S>> {
        self.link.as_ref().map(|link| &link.callback)
    }

    /// Whether this handle's callback is still registered.
    pub fn is_subscribed(&self) -> bool {
        match &self.link {
            Some(link) => self.shared.core.read().subscribers.contains(&link.callback),
            None => false,
        }
    }

    /// True if both handles alias the same underlying store.
    pub fn same_store(&self, other: &Store<S>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn modes(&self) -> Modes {
        self.shared.modes
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.core.read().subscribers.len()
    }

    pub fn history_len(&self) -> usize {
        self.shared.core.read().history.len()
    }

    pub fn is_indexed(&self, id: &str) -> bool {
        self.shared.core.read().history.contains(id)
    }

    pub fn stats(&self) -> StoreStats {
        let core = self.shared.core.read();
        StoreStats {
            version: core.id.clone(),
            indexed_versions: core.history.len(),
            subscribers: core.subscribers.len(),
        }
    }
}

impl<S> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.core.read();
        f.debug_struct("Store")
            .field("id", &core.id)
            .field("depth", &self.depth())
            .field("subscribers", &core.subscribers.len())
            .field("indexed_versions", &core.history.len())
            .finish()
    }
}
