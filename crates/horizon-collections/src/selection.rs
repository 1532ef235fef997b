//! Selection state for collections.
//!
//! [`SelectionManager`] holds the selected keys of a collection, either as
//! model-owned (uncontrolled) state or as a mirror of a caller-owned
//! (controlled) value. Every operation validates keys against a
//! [`Collection`] snapshot: unknown keys, section keys and disabled keys are
//! ignored rather than rejected.
//!
//! # Example
//!
//! ```
//! use horizon_collections::{Collection, Item, Key, KeyRule, SelectionManager, SelectionMode};
//!
//! let collection = Collection::build(
//!     vec![Item::new("a").with_key(1).into(), Item::new("b").with_key(2).into()],
//!     &KeyRule::explicit(),
//! )
//! .unwrap();
//!
//! let selection = SelectionManager::new(SelectionMode::Single);
//! selection.select(&collection, &Key::Int(1));
//! selection.select(&collection, &Key::Int(2));
//! assert_eq!(selection.selected_key(&collection), Some(Key::Int(2)));
//! ```

use horizon_collections_core::logging::targets;
use horizon_collections_core::{ControlledState, Ownership, Signal};
use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::config::CollectionConfig;
use crate::key::{Key, KeySet};

/// The kind of selection a collection allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Nothing can be selected.
    None,
    /// At most one key is selected.
    #[default]
    Single,
    /// Any number of keys can be selected.
    Multiple,
}

/// Resolves the `selected_key` / `selected_keys` pair supplied together.
///
/// In single mode `selected_key` wins, falling back to the last of
/// `selected_keys`. In multiple mode `selected_keys` wins, falling back to
/// `selected_key`. Returns `None` if neither is supplied or the mode is
/// [`SelectionMode::None`].
pub fn resolve_selection(
    mode: SelectionMode,
    selected_key: Option<Key>,
    selected_keys: Option<KeySet>,
) -> Option<KeySet> {
    match mode {
        SelectionMode::None => None,
        SelectionMode::Single => selected_key
            .or_else(|| selected_keys.and_then(|keys| keys.last().cloned()))
            .map(KeySet::single),
        SelectionMode::Multiple => selected_keys.or_else(|| selected_key.map(KeySet::single)),
    }
}

/// Selection state with controlled or uncontrolled ownership.
#[derive(Debug)]
pub struct SelectionManager {
    mode: SelectionMode,
    disallow_empty: bool,
    state: ControlledState<KeySet>,
}

impl SelectionManager {
    /// Creates an empty, model-owned selection.
    pub fn new(mode: SelectionMode) -> Self {
        Self::with_ownership(mode, KeySet::new(), Ownership::Uncontrolled)
    }

    /// Creates a selection mirroring a caller-owned value.
    pub fn controlled(mode: SelectionMode, keys: KeySet) -> Self {
        Self::with_ownership(mode, keys, Ownership::Controlled)
    }

    /// Creates a selection with explicit ownership.
    ///
    /// The initial keys are normalized for the mode: single mode keeps only
    /// the last key and [`SelectionMode::None`] keeps nothing.
    pub fn with_ownership(mode: SelectionMode, keys: KeySet, ownership: Ownership) -> Self {
        Self {
            mode,
            disallow_empty: false,
            state: ControlledState::with_ownership(normalize(mode, keys), ownership),
        }
    }

    /// Creates a model-owned selection from configuration.
    pub fn from_config(config: &CollectionConfig) -> Self {
        Self::new(config.selection_mode).with_disallow_empty_selection(config.disallow_empty_selection)
    }

    /// Sets whether clearing the selection is rejected.
    pub fn with_disallow_empty_selection(mut self, disallow: bool) -> Self {
        self.disallow_empty = disallow;
        self
    }

    /// The selection mode.
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Whether clearing the selection is rejected.
    pub fn disallow_empty_selection(&self) -> bool {
        self.disallow_empty
    }

    /// Who owns the selected keys.
    pub fn ownership(&self) -> Ownership {
        self.state.ownership()
    }

    /// Emitted with the requested keys whenever a change is requested.
    ///
    /// Controlled owners connect here and answer with [`sync`](Self::sync).
    pub fn changed(&self) -> &Signal<KeySet> {
        &self.state.changed
    }

    /// The stored keys, unfiltered.
    pub fn raw_keys(&self) -> KeySet {
        self.state.get()
    }

    /// The selected keys that exist as items in `collection`.
    pub fn selected_keys<T>(&self, collection: &Collection<T>) -> KeySet {
        self.state
            .with(|keys| keys.filtered(|key| collection.contains_item(key)))
    }

    /// The most recently selected key that exists in `collection`.
    pub fn selected_key<T>(&self, collection: &Collection<T>) -> Option<Key> {
        self.selected_keys(collection).last().cloned()
    }

    /// Whether a key is selected.
    pub fn is_selected(&self, key: &Key) -> bool {
        self.state.with(|keys| keys.contains(key))
    }

    /// Whether a key may be selected in `collection`.
    pub fn can_select<T>(&self, collection: &Collection<T>, key: &Key) -> bool {
        self.mode != SelectionMode::None
            && collection.contains_item(key)
            && !collection.is_disabled(key)
    }

    /// Selects a key. Single mode replaces the current selection.
    ///
    /// Returns `true` if a change was requested.
    pub fn select<T>(&self, collection: &Collection<T>, key: &Key) -> bool {
        if !self.can_select(collection, key) {
            tracing::trace!(target: targets::SELECTION, %key, "ignoring unselectable key");
            return false;
        }
        let mut keys = self.selected_keys(collection);
        match self.mode {
            SelectionMode::Single => keys = KeySet::single(key),
            _ => {
                keys.insert(key);
            }
        }
        self.request(keys)
    }

    /// Deselects a key. Rejected if it would empty a non-empty selection
    /// while empty selection is disallowed.
    pub fn deselect<T>(&self, collection: &Collection<T>, key: &Key) -> bool {
        let mut keys = self.selected_keys(collection);
        if !keys.remove(key) {
            return false;
        }
        self.request(keys)
    }

    /// Selects the key if unselected, deselects it otherwise.
    pub fn toggle<T>(&self, collection: &Collection<T>, key: &Key) -> bool {
        if self.is_selected(key) {
            self.deselect(collection, key)
        } else {
            self.select(collection, key)
        }
    }

    /// Replaces the selection. Unselectable keys are dropped and single mode
    /// keeps only the last key.
    pub fn replace_selection<T, I>(&self, collection: &Collection<T>, keys: I) -> bool
    where
        I: IntoIterator<Item = Key>,
    {
        let keys: KeySet = keys
            .into_iter()
            .filter(|key| self.can_select(collection, key))
            .collect();
        self.request(normalize(self.mode, keys))
    }

    /// Selects every selectable item in traversal order. Multiple mode only.
    pub fn select_all<T>(&self, collection: &Collection<T>) -> bool {
        if self.mode != SelectionMode::Multiple {
            return false;
        }
        let keys: KeySet = collection
            .item_keys()
            .filter(|key| !collection.is_disabled(key))
            .cloned()
            .collect();
        self.request(keys)
    }

    /// Clears the selection.
    ///
    /// Returns `false` and keeps the selection when empty selection is
    /// disallowed.
    pub fn clear_selection(&self) -> bool {
        self.request(KeySet::new())
    }

    /// Replaces the stored keys without notifying.
    ///
    /// Controlled owners push their authoritative value through this.
    pub fn sync(&self, keys: KeySet) -> bool {
        self.state.sync(normalize(self.mode, keys))
    }

    /// Drops keys that are no longer items in `collection`.
    ///
    /// Only model-owned state is rewritten; a controlled value stays as the
    /// caller set it and is filtered on read instead.
    pub fn prune<T>(&self, collection: &Collection<T>) -> bool {
        if self.state.is_controlled() {
            return false;
        }
        let pruned = self.selected_keys(collection);
        self.state.sync(pruned)
    }

    fn request(&self, keys: KeySet) -> bool {
        if keys.is_empty() && self.disallow_empty && !self.state.with(KeySet::is_empty) {
            tracing::debug!(
                target: targets::SELECTION,
                "rejecting empty selection"
            );
            return false;
        }
        if self.state.with(|current| *current == keys) {
            return false;
        }
        self.state.request(keys);
        true
    }
}

impl Default for SelectionManager {
    fn default() -> Self {
        Self::new(SelectionMode::default())
    }
}

fn normalize(mode: SelectionMode, keys: KeySet) -> KeySet {
    match mode {
        SelectionMode::None => KeySet::new(),
        SelectionMode::Single => keys.last().cloned().map(KeySet::single).unwrap_or_default(),
        SelectionMode::Multiple => keys,
    }
}

static_assertions::assert_impl_all!(SelectionManager: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Entry, Item};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collection() -> Collection<&'static str> {
        let entries: Vec<Entry<&'static str>> = vec![
            Item::new("one").with_key(1).into(),
            Item::new("two").with_key(2).into(),
            Item::new("three").with_key(3).into(),
        ];
        Collection::build(entries, &crate::KeyRule::explicit())
            .unwrap()
            .with_disabled_keys([3])
    }

    #[test]
    fn test_single_mode_keeps_most_recent() {
        let collection = collection();
        let selection = SelectionManager::new(SelectionMode::Single);
        assert!(selection.select(&collection, &Key::Int(1)));
        assert!(selection.select(&collection, &Key::Int(2)));
        assert_eq!(selection.selected_keys(&collection).len(), 1);
        assert_eq!(selection.selected_key(&collection), Some(Key::Int(2)));

        selection.replace_selection(&collection, [Key::Int(1), Key::Int(2)]);
        assert_eq!(selection.raw_keys(), KeySet::single(2));
    }

    #[test]
    fn test_disallow_empty_rejects_clear() {
        let collection = collection();
        let selection =
            SelectionManager::new(SelectionMode::Single).with_disallow_empty_selection(true);
        selection.select(&collection, &Key::Int(1));

        assert!(!selection.clear_selection());
        assert!(!selection.deselect(&collection, &Key::Int(1)));
        assert_eq!(selection.raw_keys(), KeySet::single(1));
    }

    #[test]
    fn test_disabled_and_unknown_keys_ignored() {
        let collection = collection();
        let selection = SelectionManager::new(SelectionMode::Multiple);
        assert!(!selection.select(&collection, &Key::Int(3)));
        assert!(!selection.select(&collection, &Key::Int(9)));

        assert!(selection.select_all(&collection));
        assert_eq!(selection.raw_keys(), [1, 2].into_iter().collect::<KeySet>());
    }

    #[test]
    fn test_none_mode_selects_nothing() {
        let collection = collection();
        let selection = SelectionManager::new(SelectionMode::None);
        assert!(!selection.select(&collection, &Key::Int(1)));
        assert!(!selection.select_all(&collection));
        assert!(selection.raw_keys().is_empty());
    }

    #[test]
    fn test_toggle() {
        let collection = collection();
        let selection = SelectionManager::new(SelectionMode::Multiple);
        selection.toggle(&collection, &Key::Int(1));
        selection.toggle(&collection, &Key::Int(2));
        selection.toggle(&collection, &Key::Int(1));
        assert_eq!(selection.raw_keys(), KeySet::single(2));
    }

    #[test]
    fn test_controlled_selection_only_notifies() {
        let collection = collection();
        let selection = SelectionManager::controlled(SelectionMode::Multiple, KeySet::single(1));
        let requests = Arc::new(AtomicUsize::new(0));
        let requests_clone = requests.clone();
        selection.changed().connect(move |_| {
            requests_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(selection.select(&collection, &Key::Int(2)));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
        assert_eq!(selection.raw_keys(), KeySet::single(1));

        selection.sync([1, 2].into_iter().collect::<KeySet>());
        assert!(selection.is_selected(&Key::Int(2)));
    }

    #[test]
    fn test_prune_drops_missing_keys() {
        let selection = SelectionManager::new(SelectionMode::Multiple);
        selection.sync([1, 2, 7].into_iter().collect());
        assert!(selection.prune(&collection()));
        assert_eq!(selection.raw_keys(), [1, 2].into_iter().collect::<KeySet>());

        let controlled = SelectionManager::controlled(SelectionMode::Multiple, KeySet::single(7));
        assert!(!controlled.prune(&collection()));
        assert!(controlled.selected_keys(&collection()).is_empty());
    }

    #[test]
    fn test_resolve_selection() {
        let keys: KeySet = [1, 2].into_iter().collect();
        assert_eq!(
            resolve_selection(SelectionMode::Single, Some(Key::Int(5)), Some(keys.clone())),
            Some(KeySet::single(5))
        );
        assert_eq!(
            resolve_selection(SelectionMode::Single, None, Some(keys.clone())),
            Some(KeySet::single(2))
        );
        assert_eq!(
            resolve_selection(SelectionMode::Multiple, Some(Key::Int(5)), Some(keys.clone())),
            Some(keys)
        );
        assert_eq!(
            resolve_selection(SelectionMode::Multiple, Some(Key::Int(5)), None),
            Some(KeySet::single(5))
        );
        assert_eq!(resolve_selection(SelectionMode::None, Some(Key::Int(5)), None), None);
    }
}
