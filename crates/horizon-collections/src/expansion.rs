//! Expanded-key state for hierarchical collections.

use horizon_collections_core::{ControlledState, Ownership, Signal};

use crate::collection::Collection;
use crate::key::{Key, KeySet};

/// The set of expanded item keys, with controlled or uncontrolled ownership.
///
/// Expansion is independent of the disabled set: a disabled item can still
/// be expanded to reveal its children.
#[derive(Debug, Default)]
pub struct ExpansionManager {
    state: ControlledState<KeySet>,
}

impl ExpansionManager {
    /// Creates a model-owned expansion state seeded with `keys`.
    pub fn new(keys: KeySet) -> Self {
        Self::with_ownership(keys, Ownership::Uncontrolled)
    }

    /// Creates an expansion state mirroring a caller-owned value.
    pub fn controlled(keys: KeySet) -> Self {
        Self::with_ownership(keys, Ownership::Controlled)
    }

    /// Creates an expansion state with explicit ownership.
    pub fn with_ownership(keys: KeySet, ownership: Ownership) -> Self {
        Self {
            state: ControlledState::with_ownership(keys, ownership),
        }
    }

    /// Who owns the expanded keys.
    pub fn ownership(&self) -> Ownership {
        self.state.ownership()
    }

    /// Emitted with the requested keys whenever a change is requested.
    pub fn changed(&self) -> &Signal<KeySet> {
        &self.state.changed
    }

    /// The stored keys, unfiltered.
    pub fn raw_keys(&self) -> KeySet {
        self.state.get()
    }

    /// The expanded keys that exist as items in `collection`.
    pub fn expanded_keys<T>(&self, collection: &Collection<T>) -> KeySet {
        self.state
            .with(|keys| keys.filtered(|key| collection.contains_item(key)))
    }

    /// Whether a key is expanded.
    pub fn is_expanded(&self, key: &Key) -> bool {
        self.state.with(|keys| keys.contains(key))
    }

    /// Expands an item. Returns `true` if a change was requested.
    pub fn expand<T>(&self, collection: &Collection<T>, key: &Key) -> bool {
        if !collection.contains_item(key) || self.is_expanded(key) {
            return false;
        }
        let mut keys = self.expanded_keys(collection);
        keys.insert(key);
        self.state.request(keys);
        true
    }

    /// Collapses an item. Returns `true` if a change was requested.
    pub fn collapse<T>(&self, collection: &Collection<T>, key: &Key) -> bool {
        if !self.is_expanded(key) {
            return false;
        }
        let mut keys = self.expanded_keys(collection);
        keys.remove(key);
        self.state.request(keys);
        true
    }

    /// Expands a collapsed item or collapses an expanded one.
    pub fn toggle<T>(&self, collection: &Collection<T>, key: &Key) -> bool {
        if self.is_expanded(key) {
            self.collapse(collection, key)
        } else {
            self.expand(collection, key)
        }
    }

    /// Replaces the expanded keys, dropping keys that are not items.
    pub fn set_expanded_keys<T, I>(&self, collection: &Collection<T>, keys: I) -> bool
    where
        I: IntoIterator<Item = Key>,
    {
        let keys: KeySet = keys
            .into_iter()
            .filter(|key| collection.contains_item(key))
            .collect();
        if self.state.with(|current| *current == keys) {
            return false;
        }
        self.state.request(keys);
        true
    }

    /// Replaces the stored keys without notifying.
    pub fn sync(&self, keys: KeySet) -> bool {
        self.state.sync(keys)
    }

    /// Drops keys that are no longer items in `collection`. Controlled
    /// values are left as set and filtered on read.
    pub fn prune<T>(&self, collection: &Collection<T>) -> bool {
        if self.state.is_controlled() {
            return false;
        }
        let pruned = self.expanded_keys(collection);
        self.state.sync(pruned)
    }
}

static_assertions::assert_impl_all!(ExpansionManager: Send, Sync);
