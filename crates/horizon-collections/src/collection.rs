//! Immutable, keyed collection snapshots.
//!
//! [`Collection`] normalizes an ordered sequence of [`Entry`] values (items
//! and sections, with items possibly nested) into a flat index. Every node is
//! addressed by its [`Key`]; parent, children, siblings and section
//! membership are all available in O(1) after an O(n) build.
//!
//! Collections are never mutated in place. Changing items, sort order or
//! filtering produces a new snapshot; key sets such as the disabled keys are
//! carried forward by key and pruned of keys that no longer exist.
//!
//! # Example
//!
//! ```
//! use horizon_collections::{Collection, Entry, Item, KeyRule, Section, Key};
//!
//! let entries: Vec<Entry<&str>> = vec![
//!     Item::new("Inbox").with_key("inbox").into(),
//!     Section::new("labels")
//!         .with_title("Labels")
//!         .with_items(vec![
//!             Item::new("Work").with_key("work"),
//!             Item::new("Home").with_key("home"),
//!         ])
//!         .into(),
//! ];
//!
//! let collection = Collection::build(entries, &KeyRule::explicit()).unwrap();
//! assert_eq!(collection.section_of(&Key::from("work")), Some(&Key::from("labels")));
//! assert_eq!(collection.next_sibling(&Key::from("work")), Some(&Key::from("home")));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use horizon_collections_core::logging::targets;
use horizon_collections_core::{DebugTree, PerfSpan, TreeDebug};
use serde::Serialize;

use crate::config::CollectionConfig;
use crate::error::{CollectionError, Result};
use crate::key::{Key, KeySet};
use crate::node::{Entry, Item, LoadMoreFn};

/// Default payload fields consulted for a key, in order.
pub const DEFAULT_KEY_FIELDS: [&str; 2] = ["id", "key"];

type KeyFn<T> = Arc<dyn Fn(&T) -> Option<Key> + Send + Sync>;

/// How a key is derived for items that do not carry an explicit key.
///
/// An explicit key set with [`Item::with_key`] always wins over the rule.
pub struct KeyRule<T> {
    extract: Option<KeyFn<T>>,
    description: String,
}

impl<T> KeyRule<T> {
    /// Only explicit keys are accepted.
    pub fn explicit() -> Self {
        Self {
            extract: None,
            description: "no explicit key and no key rule".to_string(),
        }
    }

    /// Derives keys with a custom function.
    pub fn from_fn<F>(extract: F) -> Self
    where
        F: Fn(&T) -> Option<Key> + Send + Sync + 'static,
    {
        Self {
            extract: Some(Arc::new(extract)),
            description: "key function returned no key".to_string(),
        }
    }

    /// Resolves the key for a payload.
    pub fn key_for(&self, value: &T) -> Option<Key> {
        self.extract.as_ref().and_then(|extract| extract(value))
    }

    fn describe_failure(&self) -> &str {
        &self.description
    }
}

impl<T: Serialize + 'static> KeyRule<T> {
    /// Reads the key from a named field of the serialized payload.
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        let description = format!("payload has no integer or string field '{name}'");
        Self {
            extract: Some(Arc::new(move |value: &T| {
                let json = serde_json::to_value(value).ok()?;
                json.get(&name).and_then(Key::from_json)
            })),
            description,
        }
    }

    /// Reads the key from the `id` field, falling back to `key`.
    pub fn default_fields() -> Self {
        Self {
            extract: Some(Arc::new(|value: &T| {
                let json = serde_json::to_value(value).ok()?;
                DEFAULT_KEY_FIELDS
                    .iter()
                    .find_map(|field| json.get(*field).and_then(Key::from_json))
            })),
            description: "payload has no 'id' or 'key' field".to_string(),
        }
    }

    /// Builds the rule named by a configuration's `item_key`.
    pub fn from_config(config: &CollectionConfig) -> Self {
        match &config.item_key {
            Some(field) => Self::field(field.clone()),
            None => Self::default_fields(),
        }
    }
}

impl<T> Clone for KeyRule<T> {
    fn clone(&self) -> Self {
        Self {
            extract: self.extract.clone(),
            description: self.description.clone(),
        }
    }
}

impl<T> Default for KeyRule<T> {
    fn default() -> Self {
        Self::explicit()
    }
}

impl<T> fmt::Debug for KeyRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRule")
            .field("has_extractor", &self.extract.is_some())
            .finish()
    }
}

/// What to do when two nodes resolve to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Fail the whole build.
    #[default]
    Reject,
    /// The later node takes over the lookup entry; ordering is preserved.
    LastWins,
}

/// The kind of a collection node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A selectable item.
    Item,
    /// A section header grouping items.
    Section,
}

/// A normalized node of a [`Collection`].
///
/// Depth counts item nesting only: sections and the items directly inside a
/// section or at the top level have depth 0.
pub struct Node<T> {
    key: Key,
    kind: NodeKind,
    value: Option<T>,
    title: Option<String>,
    text_value: Option<String>,
    aria_label: Option<String>,
    has_child_items: bool,
    parent: Option<Key>,
    section: Option<Key>,
    depth: usize,
    index: usize,
    children: Vec<Key>,
    // Structural links are node positions so repeated keys cannot alias
    // one another during traversal.
    parent_index: Option<usize>,
    child_indices: Vec<usize>,
    previous: Option<usize>,
    next: Option<usize>,
    is_loading: bool,
    on_load_more: Option<LoadMoreFn>,
}

impl<T> Node<T> {
    /// The node key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Whether this is an item or a section.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns `true` for items.
    pub fn is_item(&self) -> bool {
        self.kind == NodeKind::Item
    }

    /// The item payload; `None` for sections.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The typeahead text, falling back to the title.
    pub fn text_value(&self) -> Option<&str> {
        self.text_value.as_deref().or(self.title.as_deref())
    }

    /// The accessibility label.
    pub fn aria_label(&self) -> Option<&str> {
        self.aria_label.as_deref()
    }

    /// Whether the node has children, loaded or not.
    pub fn has_child_items(&self) -> bool {
        self.has_child_items || !self.children.is_empty()
    }

    /// Key of the parent item, if nested.
    pub fn parent_key(&self) -> Option<&Key> {
        self.parent.as_ref()
    }

    /// Key of the containing section.
    pub fn section_key(&self) -> Option<&Key> {
        self.section.as_ref()
    }

    /// Nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Position among siblings.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Keys of children (section items or nested items) in order.
    pub fn child_keys(&self) -> &[Key] {
        &self.children
    }

    /// Whether a section is still loading.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Invokes the section's load-more callback. Returns `false` if none.
    pub fn request_load_more(&self) -> bool {
        match &self.on_load_more {
            Some(load_more) => {
                load_more();
                true
            }
            None => false,
        }
    }
}

impl<T: Clone> Clone for Node<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            kind: self.kind,
            value: self.value.clone(),
            title: self.title.clone(),
            text_value: self.text_value.clone(),
            aria_label: self.aria_label.clone(),
            has_child_items: self.has_child_items,
            parent: self.parent.clone(),
            section: self.section.clone(),
            depth: self.depth,
            index: self.index,
            children: self.children.clone(),
            parent_index: self.parent_index,
            child_indices: self.child_indices.clone(),
            previous: self.previous,
            next: self.next,
            is_loading: self.is_loading,
            on_load_more: self.on_load_more.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("parent", &self.parent)
            .field("section", &self.section)
            .field("depth", &self.depth)
            .field("index", &self.index)
            .finish()
    }
}

/// An immutable, keyed snapshot of items and sections.
pub struct Collection<T> {
    nodes: Vec<Node<T>>,
    lookup: HashMap<Key, usize>,
    top_level: Vec<Key>,
    roots: Vec<usize>,
    disabled: KeySet,
    is_loading: bool,
    on_load_more: Option<LoadMoreFn>,
}

impl<T> Collection<T> {
    /// Creates an empty collection.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            lookup: HashMap::new(),
            top_level: Vec::new(),
            roots: Vec::new(),
            disabled: KeySet::new(),
            is_loading: false,
            on_load_more: None,
        }
    }

    /// Builds a collection, failing on the first duplicate key.
    ///
    /// The build is atomic: on error no partial collection is produced.
    pub fn build<I>(entries: I, rule: &KeyRule<T>) -> Result<Self>
    where
        I: IntoIterator<Item = Entry<T>>,
    {
        Self::build_with_policy(entries, rule, DuplicatePolicy::Reject)
    }

    /// Builds a collection where a later duplicate overrides the lookup entry.
    ///
    /// Both nodes keep their place in traversal order. Duplicates are a
    /// caller error and are logged as warnings.
    pub fn build_lenient<I>(entries: I, rule: &KeyRule<T>) -> Result<Self>
    where
        I: IntoIterator<Item = Entry<T>>,
    {
        Self::build_with_policy(entries, rule, DuplicatePolicy::LastWins)
    }

    /// Builds a flat collection from bare payloads using the key rule.
    pub fn from_values<I>(values: I, rule: &KeyRule<T>) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        Self::build(values.into_iter().map(|v| Entry::Item(Item::new(v))), rule)
    }

    /// Builds a collection with an explicit duplicate policy.
    pub fn build_with_policy<I>(
        entries: I,
        rule: &KeyRule<T>,
        policy: DuplicatePolicy,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Entry<T>>,
    {
        let _perf = PerfSpan::new("collection_build");
        let mut builder = Builder {
            rule,
            policy,
            nodes: Vec::new(),
            lookup: HashMap::new(),
        };

        let mut roots = Vec::new();
        for entry in entries {
            let index = roots.len();
            let position = match entry {
                Entry::Item(item) => builder.add_item(item, None, None, 0, index)?,
                Entry::Section(section) => builder.add_section(section, index)?,
            };
            roots.push(position);
        }

        let Builder { mut nodes, lookup, .. } = builder;
        link_siblings(&mut nodes, &roots);
        let top_level = roots.iter().map(|&i| nodes[i].key.clone()).collect();

        tracing::debug!(
            target: targets::COLLECTION,
            nodes = nodes.len(),
            top_level = roots.len(),
            "built collection"
        );

        Ok(Self {
            nodes,
            lookup,
            top_level,
            roots,
            disabled: KeySet::new(),
            is_loading: false,
            on_load_more: None,
        })
    }

    /// Sets the disabled keys, dropping keys that are not in the collection.
    pub fn with_disabled_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let mut disabled: KeySet = keys.into_iter().collect();
        disabled.retain(|key| self.lookup.contains_key(key));
        self.disabled = disabled;
        self
    }

    /// Sets the loading flag.
    pub fn with_loading(mut self, is_loading: bool) -> Self {
        self.is_loading = is_loading;
        self
    }

    /// Sets the callback used to load more items.
    pub fn with_load_more<F>(mut self, load_more: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_load_more = Some(Arc::new(load_more));
        self
    }

    pub(crate) fn with_load_more_fn(mut self, load_more: Option<LoadMoreFn>) -> Self {
        self.on_load_more = load_more;
        self
    }

    /// Number of nodes, sections included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the collection has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node by key.
    pub fn get(&self, key: &Key) -> Option<&Node<T>> {
        self.lookup.get(key).map(|&i| &self.nodes[i])
    }

    /// Checks whether a key exists.
    pub fn contains(&self, key: &Key) -> bool {
        self.lookup.contains_key(key)
    }

    /// Checks whether a key exists and names an item (not a section).
    pub fn contains_item(&self, key: &Key) -> bool {
        self.get(key).is_some_and(Node::is_item)
    }

    /// All nodes in traversal order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> {
        self.nodes.iter()
    }

    /// All keys in traversal order, sections included.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.nodes.iter().map(|n| &n.key)
    }

    /// Item keys in traversal order.
    pub fn item_keys(&self) -> impl Iterator<Item = &Key> {
        self.nodes.iter().filter(|n| n.is_item()).map(|n| &n.key)
    }

    /// Keys of top-level entries in order.
    pub fn top_level(&self) -> &[Key] {
        &self.top_level
    }

    /// Payloads of top-level items in order.
    pub fn item_values(&self) -> impl Iterator<Item = &T> {
        self.root_nodes().filter_map(Node::value)
    }

    /// Top-level nodes in order.
    ///
    /// Node-based traversal reaches every node, including ones whose key was
    /// taken over by a later duplicate in a lenient build.
    pub fn root_nodes(&self) -> impl Iterator<Item = &Node<T>> {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    /// Children of `node` in order.
    pub fn child_nodes<'a>(&'a self, node: &'a Node<T>) -> impl Iterator<Item = &'a Node<T>> {
        node.child_indices.iter().map(|&i| &self.nodes[i])
    }

    /// Parent items of `key`, nearest first.
    pub fn ancestors(&self, key: &Key) -> impl Iterator<Item = &Key> {
        let mut current = self.lookup.get(key).copied();
        std::iter::from_fn(move || {
            let parent = self.nodes[current?].parent_index?;
            current = Some(parent);
            Some(&self.nodes[parent].key)
        })
    }

    /// Children of a node, or the top-level keys for `None`.
    pub fn children_of(&self, key: Option<&Key>) -> &[Key] {
        match key {
            None => &self.top_level,
            Some(key) => self.get(key).map(|n| n.children.as_slice()).unwrap_or(&[]),
        }
    }

    /// Parent item of a nested item.
    pub fn parent_of(&self, key: &Key) -> Option<&Key> {
        self.get(key).and_then(|n| n.parent.as_ref())
    }

    /// Section containing an item.
    pub fn section_of(&self, key: &Key) -> Option<&Key> {
        self.get(key).and_then(|n| n.section.as_ref())
    }

    /// The following sibling.
    pub fn next_sibling(&self, key: &Key) -> Option<&Key> {
        self.get(key).and_then(|n| n.next).map(|i| &self.nodes[i].key)
    }

    /// The preceding sibling.
    pub fn previous_sibling(&self, key: &Key) -> Option<&Key> {
        self.get(key).and_then(|n| n.previous).map(|i| &self.nodes[i].key)
    }

    /// Nesting depth of a node.
    pub fn depth_of(&self, key: &Key) -> Option<usize> {
        self.get(key).map(|n| n.depth)
    }

    /// Typeahead text of a node (text value, else title).
    pub fn text_value(&self, key: &Key) -> Option<&str> {
        self.get(key).and_then(Node::text_value)
    }

    /// Returns `true` if `key` is inside the subtree rooted at `ancestor`.
    ///
    /// A section counts as the ancestor of its items and their descendants.
    pub fn is_descendant_of(&self, key: &Key, ancestor: &Key) -> bool {
        let Some(node) = self.get(key) else {
            return false;
        };
        // Items share the section of their top-level ancestor.
        node.section.as_ref() == Some(ancestor) || self.ancestors(key).any(|k| k == ancestor)
    }

    /// Whether the key is disabled.
    pub fn is_disabled(&self, key: &Key) -> bool {
        self.disabled.contains(key)
    }

    /// The disabled keys.
    pub fn disabled_keys(&self) -> &KeySet {
        &self.disabled
    }

    /// Whether items are currently loading.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Whether a load-more callback is attached.
    pub fn can_load_more(&self) -> bool {
        self.on_load_more.is_some()
    }

    /// Invokes the load-more callback. Returns `false` if none is attached.
    pub fn request_load_more(&self) -> bool {
        match &self.on_load_more {
            Some(load_more) => {
                load_more();
                true
            }
            None => false,
        }
    }

    /// Keeps only the keys of `keys` that exist in this collection.
    pub fn retain_existing(&self, keys: &KeySet) -> KeySet {
        keys.filtered(|key| self.contains(key))
    }

    /// Renders the collection as an indented tree for debugging.
    pub fn debug_tree(&self) -> String {
        TreeDebug::new().format(self)
    }
}

impl<T: Clone> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            lookup: self.lookup.clone(),
            top_level: self.top_level.clone(),
            roots: self.roots.clone(),
            disabled: self.disabled.clone(),
            is_loading: self.is_loading,
            on_load_more: self.on_load_more.clone(),
        }
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .field("disabled", &self.disabled)
            .field("is_loading", &self.is_loading)
            .field("can_load_more", &self.can_load_more())
            .finish()
    }
}

impl<T> DebugTree for Collection<T> {
    type Id = usize;

    fn heading(&self) -> String {
        format!("Collection ({} nodes):", self.len())
    }

    fn roots(&self) -> Vec<usize> {
        self.roots.clone()
    }

    fn children(&self, id: &usize) -> Vec<usize> {
        self.nodes[*id].child_indices.clone()
    }

    fn label(&self, id: &usize) -> String {
        let node = &self.nodes[*id];
        let id = &node.key;
        let mut label = match node.kind {
            NodeKind::Section => format!("[{id}]"),
            NodeKind::Item => id.to_string(),
        };
        if let Some(text) = node.text_value() {
            label.push_str(": ");
            label.push_str(text);
        }
        if self.is_disabled(id) {
            label.push_str(" (disabled)");
        }
        if node.has_child_items && node.children.is_empty() {
            label.push_str(" (+)");
        }
        label
    }
}

struct Builder<'a, T> {
    rule: &'a KeyRule<T>,
    policy: DuplicatePolicy,
    nodes: Vec<Node<T>>,
    lookup: HashMap<Key, usize>,
}

impl<T> Builder<'_, T> {
    fn register(&mut self, node: Node<T>) -> Result<usize> {
        let key = node.key.clone();
        let position = self.nodes.len();
        if self.lookup.contains_key(&key) {
            match self.policy {
                DuplicatePolicy::Reject => {
                    return Err(CollectionError::DuplicateKey { key });
                }
                DuplicatePolicy::LastWins => {
                    tracing::warn!(
                        target: targets::COLLECTION,
                        %key,
                        "duplicate key, later node overrides lookup"
                    );
                }
            }
        }
        self.lookup.insert(key, position);
        self.nodes.push(node);
        Ok(position)
    }

    fn key_at(&self, position: Option<usize>) -> Option<Key> {
        position.map(|i| self.nodes[i].key.clone())
    }

    fn add_item(
        &mut self,
        item: Item<T>,
        parent: Option<usize>,
        section: Option<usize>,
        depth: usize,
        index: usize,
    ) -> Result<usize> {
        let parts = item.into_parts();
        let key = match parts.key {
            Some(key) => key,
            None => self.rule.key_for(&parts.value).ok_or_else(|| {
                CollectionError::missing_key("item", self.nodes.len(), self.rule.describe_failure())
            })?,
        };

        let node = Node {
            key,
            kind: NodeKind::Item,
            value: Some(parts.value),
            title: parts.title,
            text_value: parts.text_value,
            aria_label: parts.aria_label,
            has_child_items: parts.has_child_items,
            parent: self.key_at(parent),
            section: self.key_at(section),
            depth,
            index,
            children: Vec::new(),
            parent_index: parent,
            child_indices: Vec::new(),
            previous: None,
            next: None,
            is_loading: false,
            on_load_more: None,
        };
        let position = self.register(node)?;

        let mut children = Vec::with_capacity(parts.children.len());
        for (child_index, child) in parts.children.into_iter().enumerate() {
            children.push(self.add_item(child, Some(position), section, depth + 1, child_index)?);
        }
        self.adopt(position, children);
        Ok(position)
    }

    fn add_section(&mut self, section: crate::node::Section<T>, index: usize) -> Result<usize> {
        let parts = section.into_parts();
        let node = Node {
            key: parts.key,
            kind: NodeKind::Section,
            value: None,
            title: parts.title,
            text_value: None,
            aria_label: parts.aria_label,
            has_child_items: !parts.items.is_empty(),
            parent: None,
            section: None,
            depth: 0,
            index,
            children: Vec::new(),
            parent_index: None,
            child_indices: Vec::new(),
            previous: None,
            next: None,
            is_loading: parts.is_loading,
            on_load_more: parts.on_load_more,
        };
        let position = self.register(node)?;

        let mut children = Vec::with_capacity(parts.items.len());
        for (child_index, item) in parts.items.into_iter().enumerate() {
            children.push(self.add_item(item, None, Some(position), 0, child_index)?);
        }
        self.adopt(position, children);
        Ok(position)
    }

    fn adopt(&mut self, position: usize, children: Vec<usize>) {
        self.nodes[position].children = children.iter().map(|&i| self.nodes[i].key.clone()).collect();
        self.nodes[position].child_indices = children;
    }
}

fn link_siblings<T>(nodes: &mut [Node<T>], roots: &[usize]) {
    let mut groups = vec![roots.to_vec()];
    groups.extend(nodes.iter().map(|n| n.child_indices.clone()));

    for group in groups {
        for pair in group.windows(2) {
            nodes[pair[0]].next = Some(pair[1]);
            nodes[pair[1]].previous = Some(pair[0]);
        }
    }
}

static_assertions::assert_impl_all!(Collection<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Section;
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize)]
    struct Fruit {
        id: u32,
        name: &'static str,
    }

    fn fruit(id: u32, name: &'static str) -> Fruit {
        Fruit { id, name }
    }

    fn tree() -> Collection<&'static str> {
        let entries: Vec<Entry<&'static str>> = vec![
            Item::new("Fruit")
                .with_key("fruit")
                .with_title("Fruit")
                .with_child_items(vec![
                    Item::new("Apple").with_key("apple").with_text_value("Apple"),
                    Item::new("Banana").with_key("banana").with_text_value("Banana"),
                ])
                .into(),
            Section::new("bakery")
                .with_title("Bakery")
                .with_items(vec![Item::new("Bread").with_key("bread")])
                .into(),
            Item::new("Lazy").with_key("lazy").with_has_child_items(true).into(),
        ];
        Collection::build(entries, &KeyRule::explicit()).unwrap()
    }

    #[test]
    fn test_build_preserves_traversal_order() {
        let collection = tree();
        let keys: Vec<String> = collection.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["fruit", "apple", "banana", "bakery", "bread", "lazy"]);
        assert_eq!(collection.len(), 6);
        assert_eq!(collection.item_keys().count(), 5);
    }

    #[test]
    fn test_node_metadata() {
        let collection = tree();
        let apple = collection.get(&Key::from("apple")).unwrap();
        assert_eq!(apple.parent_key(), Some(&Key::from("fruit")));
        assert_eq!(apple.depth(), 1);
        assert_eq!(apple.index(), 0);
        assert_eq!(apple.section_key(), None);

        let bread = collection.get(&Key::from("bread")).unwrap();
        assert_eq!(bread.section_key(), Some(&Key::from("bakery")));
        assert_eq!(bread.parent_key(), None);
        assert_eq!(bread.depth(), 0);

        let bakery = collection.get(&Key::from("bakery")).unwrap();
        assert_eq!(bakery.kind(), NodeKind::Section);
        assert!(bakery.value().is_none());
        assert!(!collection.contains_item(&Key::from("bakery")));

        let lazy = collection.get(&Key::from("lazy")).unwrap();
        assert!(lazy.has_child_items());
        assert!(lazy.child_keys().is_empty());
    }

    #[test]
    fn test_siblings() {
        let collection = tree();
        assert_eq!(
            collection.next_sibling(&Key::from("apple")),
            Some(&Key::from("banana"))
        );
        assert_eq!(collection.next_sibling(&Key::from("banana")), None);
        assert_eq!(
            collection.previous_sibling(&Key::from("lazy")),
            Some(&Key::from("bakery"))
        );
        assert_eq!(
            collection.next_sibling(&Key::from("fruit")),
            Some(&Key::from("bakery"))
        );
    }

    #[test]
    fn test_descendant_of() {
        let collection = tree();
        assert!(collection.is_descendant_of(&Key::from("apple"), &Key::from("fruit")));
        assert!(collection.is_descendant_of(&Key::from("bread"), &Key::from("bakery")));
        assert!(!collection.is_descendant_of(&Key::from("bread"), &Key::from("fruit")));
        assert!(!collection.is_descendant_of(&Key::from("fruit"), &Key::from("fruit")));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let entries = vec![
            Entry::Item(Item::new("A").with_key(1)),
            Entry::Item(Item::new("B").with_key(1)),
        ];
        let err = Collection::build(entries, &KeyRule::explicit()).unwrap_err();
        assert!(matches!(err, CollectionError::DuplicateKey { key } if key == Key::Int(1)));
    }

    #[test]
    fn test_duplicate_key_nested_rejected() {
        let entries = vec![
            Entry::Item(Item::new("A").with_key(1)),
            Entry::Section(Section::new(2).with_items(vec![Item::new("B").with_key(1)])),
        ];
        assert!(Collection::build(entries, &KeyRule::explicit()).is_err());
    }

    #[test]
    fn test_lenient_build_last_wins() {
        let entries = vec![
            Entry::Item(Item::new("A").with_key(1)),
            Entry::Item(Item::new("B").with_key(1)),
        ];
        let collection = Collection::build_lenient(entries, &KeyRule::explicit()).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(&Key::Int(1)).and_then(Node::value), Some(&"B"));
        let values: Vec<_> = collection.nodes().filter_map(Node::value).collect();
        assert_eq!(values, vec![&"A", &"B"]);

        // Traversal still reaches the overridden node in its original place.
        let values: Vec<_> = collection.item_values().collect();
        assert_eq!(values, vec![&"A", &"B"]);
        assert_eq!(collection.top_level(), &[Key::Int(1), Key::Int(1)]);
        assert_eq!(collection.next_sibling(&Key::Int(1)), None);
    }

    #[test]
    fn test_lenient_nested_duplicate_terminates() {
        let entries = vec![Entry::Item(Item::new("outer").with_key("y").with_child_items(vec![
            Item::new("x").with_key("x").with_child_items(vec![Item::new("inner").with_key("y")]),
        ]))];
        let collection = Collection::build_lenient(entries, &KeyRule::explicit()).unwrap();

        assert_eq!(collection.parent_of(&Key::from("y")), Some(&Key::from("x")));
        assert_eq!(collection.parent_of(&Key::from("x")), Some(&Key::from("y")));
        let ancestors: Vec<&Key> = collection.ancestors(&Key::from("y")).collect();
        assert_eq!(ancestors, vec![&Key::from("x"), &Key::from("y")]);
        assert!(collection.is_descendant_of(&Key::from("x"), &Key::from("y")));
        assert!(!collection.is_descendant_of(&Key::from("y"), &Key::from("z")));

        let output = collection.debug_tree();
        assert_eq!(output.lines().count(), 4);
    }

    #[test]
    fn test_default_key_fields() {
        let collection =
            Collection::from_values(vec![fruit(1, "Apple"), fruit(2, "Banana")], &KeyRule::default_fields())
                .unwrap();
        assert!(collection.contains(&Key::Int(1)));
        assert!(collection.contains(&Key::Int(2)));
    }

    #[test]
    fn test_named_key_field() {
        let collection =
            Collection::from_values(vec![fruit(1, "Apple")], &KeyRule::field("name")).unwrap();
        assert!(collection.contains(&Key::from("Apple")));
    }

    #[test]
    fn test_explicit_key_wins_over_rule() {
        let entries = vec![Entry::Item(Item::new(fruit(1, "Apple")).with_key("custom"))];
        let collection = Collection::build(entries, &KeyRule::default_fields()).unwrap();
        assert!(collection.contains(&Key::from("custom")));
        assert!(!collection.contains(&Key::Int(1)));
    }

    #[test]
    fn test_missing_key() {
        let err = Collection::from_values(vec!["x"], &KeyRule::explicit()).unwrap_err();
        assert!(matches!(err, CollectionError::MissingKey { position: 0, .. }));
    }

    #[test]
    fn test_disabled_keys_pruned() {
        let collection = tree().with_disabled_keys(["apple", "ghost"]);
        assert!(collection.is_disabled(&Key::from("apple")));
        assert!(!collection.disabled_keys().contains(&Key::from("ghost")));
        assert_eq!(collection.disabled_keys().len(), 1);
    }

    #[test]
    fn test_load_more_trigger() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let collection = tree().with_loading(true).with_load_more(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(collection.is_loading());
        assert!(collection.request_load_more());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!Collection::<&str>::empty().request_load_more());
    }

    #[test]
    fn test_debug_tree() {
        let output = tree().with_disabled_keys(["banana"]).debug_tree();
        assert!(output.starts_with("Collection (6 nodes):"));
        assert!(output.contains("apple: Apple"));
        assert!(output.contains("banana: Banana (disabled)"));
        assert!(output.contains("[bakery]: Bakery"));
        assert!(output.contains("lazy (+)"));
    }
}
