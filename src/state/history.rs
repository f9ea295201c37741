//! Version history index.

use crate::types::VersionId;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps version ids to the state committed under them.
///
/// Entries are never evicted.
#[derive(Debug)]
pub struct HistoryIndex<S> {
    entries: HashMap<VersionId, Arc<S>>,
}

impl<S> Default for HistoryIndex<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> HistoryIndex<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Record a state, replacing any entry under the same id.
    pub fn record(&mut self, id: VersionId, state: Arc<S>) {
        self.entries.insert(id, state);
    }

    /// Record a state unless the id is already present. Returns whether an
    /// entry was added.
    pub fn record_if_absent(&mut self, id: &VersionId, state: &Arc<S>) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }
        self.entries.insert(id.clone(), Arc::clone(state));
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<S>> {
        self.entries.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
