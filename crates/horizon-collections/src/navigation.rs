//! Keyboard navigation over collections.
//!
//! A [`KeyboardDelegate`] answers adjacency questions ("which key is below
//! this one?"). Every operation is optional; a delegate advertises the ones
//! it implements through [`DelegateCapabilities`]. The [`Navigator`] asks a
//! custom delegate first when it supports the operation and otherwise falls
//! back to [`CollectionKeyboardDelegate`], the default traversal over a
//! collection snapshot.
//!
//! # Visible Order
//!
//! The default traversal walks top-level entries depth-first. Items inside a
//! section are always visible; children of an item are visible only while
//! the item is expanded. Sections themselves and disabled items are never
//! returned.
//!
//! # Example
//!
//! ```
//! use horizon_collections::{Collection, Item, Key, KeyRule, KeySet, KeyboardDelegate, Navigator};
//!
//! let collection = Collection::build(
//!     vec![
//!         Item::new("Apple").with_key(1).with_text_value("Apple").into(),
//!         Item::new("Banana").with_key(2).with_text_value("Banana").into(),
//!         Item::new("Bread").with_key(3).with_text_value("Bread").into(),
//!     ],
//!     &KeyRule::explicit(),
//! )
//! .unwrap();
//!
//! let expanded = KeySet::new();
//! let navigator = Navigator::new(&collection, &expanded);
//! assert_eq!(navigator.key_below(&Key::Int(1)), Some(Key::Int(2)));
//! assert_eq!(navigator.key_for_search("br", Some(&Key::Int(2))), Some(Key::Int(3)));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use horizon_collections_core::logging::targets;

use crate::collection::{Collection, Node};
use crate::config::{CollectionConfig, DEFAULT_PAGE_SIZE};
use crate::key::{Key, KeySet};

/// The operations a [`KeyboardDelegate`] implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelegateCapabilities {
    /// `key_below` is implemented.
    pub key_below: bool,
    /// `key_above` is implemented.
    pub key_above: bool,
    /// `key_left_of` is implemented.
    pub key_left_of: bool,
    /// `key_right_of` is implemented.
    pub key_right_of: bool,
    /// `key_page_below` is implemented.
    pub key_page_below: bool,
    /// `key_page_above` is implemented.
    pub key_page_above: bool,
    /// `first_key` is implemented.
    pub first_key: bool,
    /// `last_key` is implemented.
    pub last_key: bool,
    /// `key_for_search` is implemented.
    pub key_for_search: bool,
}

impl DelegateCapabilities {
    /// No operation is implemented.
    pub const NONE: Self = Self {
        key_below: false,
        key_above: false,
        key_left_of: false,
        key_right_of: false,
        key_page_below: false,
        key_page_above: false,
        first_key: false,
        last_key: false,
        key_for_search: false,
    };

    /// Every operation is implemented.
    pub const ALL: Self = Self {
        key_below: true,
        key_above: true,
        key_left_of: true,
        key_right_of: true,
        key_page_below: true,
        key_page_above: true,
        first_key: true,
        last_key: true,
        key_for_search: true,
    };
}

/// Answers keyboard navigation queries.
///
/// Methods that are not listed in [`capabilities`](Self::capabilities) are
/// never called by the [`Navigator`]; their default bodies return `None`.
pub trait KeyboardDelegate {
    /// The implemented operations.
    fn capabilities(&self) -> DelegateCapabilities;

    /// The key below `key`.
    fn key_below(&self, _key: &Key) -> Option<Key> {
        None
    }

    /// The key above `key`.
    fn key_above(&self, _key: &Key) -> Option<Key> {
        None
    }

    /// The key to the left of `key`.
    fn key_left_of(&self, _key: &Key) -> Option<Key> {
        None
    }

    /// The key to the right of `key`.
    fn key_right_of(&self, _key: &Key) -> Option<Key> {
        None
    }

    /// The key one page below `key`.
    fn key_page_below(&self, _key: &Key) -> Option<Key> {
        None
    }

    /// The key one page above `key`.
    fn key_page_above(&self, _key: &Key) -> Option<Key> {
        None
    }

    /// The first key, of the whole collection when `global` is set or no
    /// `from_key` is given, otherwise of the section or subtree containing
    /// `from_key`.
    fn first_key(&self, _from_key: Option<&Key>, _global: bool) -> Option<Key> {
        None
    }

    /// The last key, scoped like [`first_key`](Self::first_key).
    fn last_key(&self, _from_key: Option<&Key>, _global: bool) -> Option<Key> {
        None
    }

    /// The next key after `from_key` whose text prefix-matches `search`.
    fn key_for_search(&self, _search: &str, _from_key: Option<&Key>) -> Option<Key> {
        None
    }
}

type StepFn = Arc<dyn Fn(&Key) -> Option<Key> + Send + Sync>;
type EdgeFn = Arc<dyn Fn(Option<&Key>, bool) -> Option<Key> + Send + Sync>;
type SearchFn = Arc<dyn Fn(&str, Option<&Key>) -> Option<Key> + Send + Sync>;

/// A delegate assembled from optional closures.
///
/// Capabilities are derived from which closures are set.
#[derive(Clone, Default)]
pub struct FnKeyboardDelegate {
    key_below: Option<StepFn>,
    key_above: Option<StepFn>,
    key_left_of: Option<StepFn>,
    key_right_of: Option<StepFn>,
    key_page_below: Option<StepFn>,
    key_page_above: Option<StepFn>,
    first_key: Option<EdgeFn>,
    last_key: Option<EdgeFn>,
    key_for_search: Option<SearchFn>,
}

impl FnKeyboardDelegate {
    /// Creates a delegate implementing nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key_below`.
    pub fn with_key_below(mut self, f: impl Fn(&Key) -> Option<Key> + Send + Sync + 'static) -> Self {
        self.key_below = Some(Arc::new(f));
        self
    }

    /// Sets `key_above`.
    pub fn with_key_above(mut self, f: impl Fn(&Key) -> Option<Key> + Send + Sync + 'static) -> Self {
        self.key_above = Some(Arc::new(f));
        self
    }

    /// Sets `key_left_of`.
    pub fn with_key_left_of(
        mut self,
        f: impl Fn(&Key) -> Option<Key> + Send + Sync + 'static,
    ) -> Self {
        self.key_left_of = Some(Arc::new(f));
        self
    }

    /// Sets `key_right_of`.
    pub fn with_key_right_of(
        mut self,
        f: impl Fn(&Key) -> Option<Key> + Send + Sync + 'static,
    ) -> Self {
        self.key_right_of = Some(Arc::new(f));
        self
    }

    /// Sets `key_page_below`.
    pub fn with_key_page_below(
        mut self,
        f: impl Fn(&Key) -> Option<Key> + Send + Sync + 'static,
    ) -> Self {
        self.key_page_below = Some(Arc::new(f));
        self
    }

    /// Sets `key_page_above`.
    pub fn with_key_page_above(
        mut self,
        f: impl Fn(&Key) -> Option<Key> + Send + Sync + 'static,
    ) -> Self {
        self.key_page_above = Some(Arc::new(f));
        self
    }

    /// Sets `first_key`.
    pub fn with_first_key(
        mut self,
        f: impl Fn(Option<&Key>, bool) -> Option<Key> + Send + Sync + 'static,
    ) -> Self {
        self.first_key = Some(Arc::new(f));
        self
    }

    /// Sets `last_key`.
    pub fn with_last_key(
        mut self,
        f: impl Fn(Option<&Key>, bool) -> Option<Key> + Send + Sync + 'static,
    ) -> Self {
        self.last_key = Some(Arc::new(f));
        self
    }

    /// Sets `key_for_search`.
    pub fn with_key_for_search(
        mut self,
        f: impl Fn(&str, Option<&Key>) -> Option<Key> + Send + Sync + 'static,
    ) -> Self {
        self.key_for_search = Some(Arc::new(f));
        self
    }
}

impl KeyboardDelegate for FnKeyboardDelegate {
    fn capabilities(&self) -> DelegateCapabilities {
        DelegateCapabilities {
            key_below: self.key_below.is_some(),
            key_above: self.key_above.is_some(),
            key_left_of: self.key_left_of.is_some(),
            key_right_of: self.key_right_of.is_some(),
            key_page_below: self.key_page_below.is_some(),
            key_page_above: self.key_page_above.is_some(),
            first_key: self.first_key.is_some(),
            last_key: self.last_key.is_some(),
            key_for_search: self.key_for_search.is_some(),
        }
    }

    fn key_below(&self, key: &Key) -> Option<Key> {
        self.key_below.as_ref().and_then(|f| f(key))
    }

    fn key_above(&self, key: &Key) -> Option<Key> {
        self.key_above.as_ref().and_then(|f| f(key))
    }

    fn key_left_of(&self, key: &Key) -> Option<Key> {
        self.key_left_of.as_ref().and_then(|f| f(key))
    }

    fn key_right_of(&self, key: &Key) -> Option<Key> {
        self.key_right_of.as_ref().and_then(|f| f(key))
    }

    fn key_page_below(&self, key: &Key) -> Option<Key> {
        self.key_page_below.as_ref().and_then(|f| f(key))
    }

    fn key_page_above(&self, key: &Key) -> Option<Key> {
        self.key_page_above.as_ref().and_then(|f| f(key))
    }

    fn first_key(&self, from_key: Option<&Key>, global: bool) -> Option<Key> {
        self.first_key.as_ref().and_then(|f| f(from_key, global))
    }

    fn last_key(&self, from_key: Option<&Key>, global: bool) -> Option<Key> {
        self.last_key.as_ref().and_then(|f| f(from_key, global))
    }

    fn key_for_search(&self, search: &str, from_key: Option<&Key>) -> Option<Key> {
        self.key_for_search.as_ref().and_then(|f| f(search, from_key))
    }
}

impl fmt::Debug for FnKeyboardDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnKeyboardDelegate")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// Default traversal over a collection snapshot.
///
/// The visible order is computed once at construction, so queries are O(1)
/// apart from the skipping of disabled keys.
pub struct CollectionKeyboardDelegate<'a, T> {
    collection: &'a Collection<T>,
    visible: Vec<Key>,
    positions: HashMap<Key, usize>,
    page_size: usize,
}

impl<'a, T> CollectionKeyboardDelegate<'a, T> {
    /// Creates a delegate for a collection and its expanded keys.
    pub fn new(collection: &'a Collection<T>, expanded: &KeySet) -> Self {
        let mut visible = Vec::with_capacity(collection.len());
        for node in collection.root_nodes() {
            collect_visible(collection, expanded, node, &mut visible);
        }
        let positions = visible
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), i))
            .collect();

        Self {
            collection,
            visible,
            positions,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets how many items a page step moves; at least 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Applies the page size of a configuration.
    pub fn with_config(self, config: &CollectionConfig) -> Self {
        self.with_page_size(config.page_size)
    }

    /// The page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Item keys in visible order, disabled items included.
    pub fn visible_keys(&self) -> &[Key] {
        &self.visible
    }

    fn focusable(&self, key: &Key) -> bool {
        !self.collection.is_disabled(key)
    }

    fn after(&self, key: &Key) -> impl Iterator<Item = &Key> {
        let start = self.positions.get(key).map_or(self.visible.len(), |&i| i + 1);
        self.visible[start..].iter().filter(|k| self.focusable(k))
    }

    fn before(&self, key: &Key) -> impl Iterator<Item = &Key> {
        let end = self.positions.get(key).copied().unwrap_or(0);
        self.visible[..end].iter().rev().filter(|k| self.focusable(k))
    }

    fn in_scope(&self, from_key: Option<&Key>, global: bool) -> impl Iterator<Item = &Key> {
        let scope = match from_key {
            Some(key) if !global => self
                .collection
                .section_of(key)
                .or_else(|| self.collection.parent_of(key)),
            _ => None,
        };
        self.visible.iter().filter(move |k| {
            self.focusable(k)
                && scope.is_none_or(|root| self.collection.is_descendant_of(k, root))
        })
    }
}

impl<T> KeyboardDelegate for CollectionKeyboardDelegate<'_, T> {
    fn capabilities(&self) -> DelegateCapabilities {
        DelegateCapabilities::ALL
    }

    fn key_below(&self, key: &Key) -> Option<Key> {
        self.after(key).next().cloned()
    }

    fn key_above(&self, key: &Key) -> Option<Key> {
        self.before(key).next().cloned()
    }

    fn key_left_of(&self, key: &Key) -> Option<Key> {
        self.collection
            .ancestors(key)
            .find(|candidate| self.focusable(candidate))
            .cloned()
    }

    fn key_right_of(&self, key: &Key) -> Option<Key> {
        // Children are only in the visible order while the item is expanded.
        self.collection
            .children_of(Some(key))
            .iter()
            .find(|child| self.positions.contains_key(*child) && self.focusable(child))
            .cloned()
    }

    fn key_page_below(&self, key: &Key) -> Option<Key> {
        self.after(key).take(self.page_size).last().cloned()
    }

    fn key_page_above(&self, key: &Key) -> Option<Key> {
        self.before(key).take(self.page_size).last().cloned()
    }

    fn first_key(&self, from_key: Option<&Key>, global: bool) -> Option<Key> {
        self.in_scope(from_key, global).next().cloned()
    }

    fn last_key(&self, from_key: Option<&Key>, global: bool) -> Option<Key> {
        self.in_scope(from_key, global).last().cloned()
    }

    fn key_for_search(&self, search: &str, from_key: Option<&Key>) -> Option<Key> {
        if search.is_empty() || self.visible.is_empty() {
            return None;
        }
        let needle = search.to_lowercase();
        let start = from_key
            .and_then(|key| self.positions.get(key))
            .map_or(0, |&i| i + 1);

        // Wrap around; `from_key` itself is checked last.
        let len = self.visible.len();
        (0..len)
            .map(|offset| &self.visible[(start + offset) % len])
            .filter(|key| self.focusable(key))
            .find(|key| {
                self.collection.get(key).is_some_and(|node| {
                    let matches = |text: &str| text.to_lowercase().starts_with(&needle);
                    node.text_value().is_some_and(matches) || node.title().is_some_and(matches)
                })
            })
            .cloned()
    }
}

impl<T> fmt::Debug for CollectionKeyboardDelegate<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionKeyboardDelegate")
            .field("visible", &self.visible)
            .field("page_size", &self.page_size)
            .finish()
    }
}

fn collect_visible<T>(collection: &Collection<T>, expanded: &KeySet, node: &Node<T>, out: &mut Vec<Key>) {
    if node.is_item() {
        out.push(node.key().clone());
        if !expanded.contains(node.key()) {
            return;
        }
    }
    for child in collection.child_nodes(node) {
        collect_visible(collection, expanded, child, out);
    }
}

/// A navigation key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationKey {
    /// Up arrow.
    ArrowUp,
    /// Down arrow.
    ArrowDown,
    /// Left arrow.
    ArrowLeft,
    /// Right arrow.
    ArrowRight,
    /// Page up.
    PageUp,
    /// Page down.
    PageDown,
    /// Home.
    Home,
    /// End.
    End,
}

/// Resolves navigation through an optional custom delegate, falling back to
/// the default traversal for unsupported operations.
pub struct Navigator<'a, T> {
    fallback: CollectionKeyboardDelegate<'a, T>,
    delegate: Option<&'a dyn KeyboardDelegate>,
}

impl<'a, T> Navigator<'a, T> {
    /// Creates a navigator using only the default traversal.
    pub fn new(collection: &'a Collection<T>, expanded: &KeySet) -> Self {
        Self {
            fallback: CollectionKeyboardDelegate::new(collection, expanded),
            delegate: None,
        }
    }

    /// Consults `delegate` first for the operations it supports.
    pub fn with_delegate(mut self, delegate: &'a dyn KeyboardDelegate) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Sets the page size of the default traversal.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.fallback = self.fallback.with_page_size(page_size);
        self
    }

    /// The default traversal.
    pub fn fallback(&self) -> &CollectionKeyboardDelegate<'a, T> {
        &self.fallback
    }

    fn pick(&self, supported: impl Fn(DelegateCapabilities) -> bool) -> &dyn KeyboardDelegate {
        match self.delegate {
            Some(delegate) if supported(delegate.capabilities()) => delegate,
            _ => &self.fallback,
        }
    }

    /// Maps a key press to the key that should receive focus.
    ///
    /// Without a focused key, vertical and page moves start at the edges.
    pub fn navigate(&self, nav: NavigationKey, from_key: Option<&Key>) -> Option<Key> {
        let Some(key) = from_key else {
            return match nav {
                NavigationKey::ArrowUp | NavigationKey::PageUp | NavigationKey::End => {
                    self.last_key(None, true)
                }
                NavigationKey::ArrowDown | NavigationKey::PageDown | NavigationKey::Home => {
                    self.first_key(None, true)
                }
                NavigationKey::ArrowLeft | NavigationKey::ArrowRight => None,
            };
        };
        let target = match nav {
            NavigationKey::ArrowUp => self.key_above(key),
            NavigationKey::ArrowDown => self.key_below(key),
            NavigationKey::ArrowLeft => self.key_left_of(key),
            NavigationKey::ArrowRight => self.key_right_of(key),
            NavigationKey::PageUp => self.key_page_above(key),
            NavigationKey::PageDown => self.key_page_below(key),
            NavigationKey::Home => self.first_key(Some(key), true),
            NavigationKey::End => self.last_key(Some(key), true),
        };
        tracing::trace!(
            target: targets::NAVIGATION,
            ?nav,
            from = %key,
            to = ?target,
            "navigate"
        );
        target
    }
}

impl<T> KeyboardDelegate for Navigator<'_, T> {
    fn capabilities(&self) -> DelegateCapabilities {
        DelegateCapabilities::ALL
    }

    fn key_below(&self, key: &Key) -> Option<Key> {
        self.pick(|c| c.key_below).key_below(key)
    }

    fn key_above(&self, key: &Key) -> Option<Key> {
        self.pick(|c| c.key_above).key_above(key)
    }

    fn key_left_of(&self, key: &Key) -> Option<Key> {
        self.pick(|c| c.key_left_of).key_left_of(key)
    }

    fn key_right_of(&self, key: &Key) -> Option<Key> {
        self.pick(|c| c.key_right_of).key_right_of(key)
    }

    fn key_page_below(&self, key: &Key) -> Option<Key> {
        self.pick(|c| c.key_page_below).key_page_below(key)
    }

    fn key_page_above(&self, key: &Key) -> Option<Key> {
        self.pick(|c| c.key_page_above).key_page_above(key)
    }

    fn first_key(&self, from_key: Option<&Key>, global: bool) -> Option<Key> {
        self.pick(|c| c.first_key).first_key(from_key, global)
    }

    fn last_key(&self, from_key: Option<&Key>, global: bool) -> Option<Key> {
        self.pick(|c| c.last_key).last_key(from_key, global)
    }

    fn key_for_search(&self, search: &str, from_key: Option<&Key>) -> Option<Key> {
        self.pick(|c| c.key_for_search).key_for_search(search, from_key)
    }
}
