//! Raw collection entries: items and sections.
//!
//! These are the inputs of [`Collection::build`](crate::Collection::build).
//! Items carry an opaque payload `T`; the collection never inspects it except
//! through the key rule and the sort column accessor.

use std::fmt;
use std::sync::Arc;

use crate::key::Key;

/// Callback invoked when more items should be loaded.
pub type LoadMoreFn = Arc<dyn Fn() + Send + Sync>;

/// One selectable, focusable unit of a collection.
///
/// # Example
///
/// ```
/// use horizon_collections::Item;
///
/// let item = Item::new("Documents")
///     .with_key("docs")
///     .with_text_value("Documents")
///     .with_child_items(vec![Item::new("notes.txt").with_key("notes")]);
/// assert_eq!(item.child_items().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Item<T> {
    key: Option<Key>,
    value: T,
    title: Option<String>,
    text_value: Option<String>,
    aria_label: Option<String>,
    children: Vec<Item<T>>,
    has_child_items: bool,
}

impl<T> Item<T> {
    /// Creates an item around a payload.
    pub fn new(value: T) -> Self {
        Self {
            key: None,
            value,
            title: None,
            text_value: None,
            aria_label: None,
            children: Vec::new(),
            has_child_items: false,
        }
    }

    /// Sets an explicit unique key, overriding the collection's key rule.
    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the title shown when the item has child items.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the string used for typeahead.
    pub fn with_text_value(mut self, text: impl Into<String>) -> Self {
        self.text_value = Some(text.into());
        self
    }

    /// Sets the accessibility label.
    pub fn with_aria_label(mut self, label: impl Into<String>) -> Self {
        self.aria_label = Some(label.into());
        self
    }

    /// Sets the child items.
    pub fn with_child_items(mut self, children: Vec<Item<T>>) -> Self {
        self.children = children;
        self
    }

    /// Marks the item as having children that are not loaded yet.
    pub fn with_has_child_items(mut self, has_children: bool) -> Self {
        self.has_child_items = has_children;
        self
    }

    /// The explicit key, if one was set.
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// The payload.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The typeahead text.
    pub fn text_value(&self) -> Option<&str> {
        self.text_value.as_deref()
    }

    /// The accessibility label.
    pub fn aria_label(&self) -> Option<&str> {
        self.aria_label.as_deref()
    }

    /// Loaded child items.
    pub fn child_items(&self) -> &[Item<T>] {
        &self.children
    }

    /// Whether the item has children, loaded or not.
    pub fn has_child_items(&self) -> bool {
        self.has_child_items || !self.children.is_empty()
    }

    pub(crate) fn into_parts(self) -> ItemParts<T> {
        ItemParts {
            key: self.key,
            value: self.value,
            title: self.title,
            text_value: self.text_value,
            aria_label: self.aria_label,
            children: self.children,
            has_child_items: self.has_child_items,
        }
    }
}

pub(crate) struct ItemParts<T> {
    pub key: Option<Key>,
    pub value: T,
    pub title: Option<String>,
    pub text_value: Option<String>,
    pub aria_label: Option<String>,
    pub children: Vec<Item<T>>,
    pub has_child_items: bool,
}

/// A grouping container of items. Sections do not nest.
#[derive(Clone)]
pub struct Section<T> {
    key: Key,
    title: Option<String>,
    aria_label: Option<String>,
    items: Vec<Item<T>>,
    is_loading: bool,
    on_load_more: Option<LoadMoreFn>,
}

impl<T> Section<T> {
    /// Creates an empty section.
    pub fn new(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            title: None,
            aria_label: None,
            items: Vec::new(),
            is_loading: false,
            on_load_more: None,
        }
    }

    /// Sets the section header title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the accessibility label.
    pub fn with_aria_label(mut self, label: impl Into<String>) -> Self {
        self.aria_label = Some(label.into());
        self
    }

    /// Sets the section's items.
    pub fn with_items(mut self, items: Vec<Item<T>>) -> Self {
        self.items = items;
        self
    }

    /// Marks the section as loading.
    pub fn with_loading(mut self, is_loading: bool) -> Self {
        self.is_loading = is_loading;
        self
    }

    /// Sets the callback used to load more items into this section.
    pub fn with_load_more<F>(mut self, load_more: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_load_more = Some(Arc::new(load_more));
        self
    }

    /// The section key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The section title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The items of this section.
    pub fn items(&self) -> &[Item<T>] {
        &self.items
    }

    pub(crate) fn into_parts(self) -> SectionParts<T> {
        SectionParts {
            key: self.key,
            title: self.title,
            aria_label: self.aria_label,
            items: self.items,
            is_loading: self.is_loading,
            on_load_more: self.on_load_more,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Section<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("key", &self.key)
            .field("title", &self.title)
            .field("items", &self.items)
            .field("is_loading", &self.is_loading)
            .field("has_load_more", &self.on_load_more.is_some())
            .finish()
    }
}

pub(crate) struct SectionParts<T> {
    pub key: Key,
    pub title: Option<String>,
    pub aria_label: Option<String>,
    pub items: Vec<Item<T>>,
    pub is_loading: bool,
    pub on_load_more: Option<LoadMoreFn>,
}

/// A top-level collection entry.
#[derive(Debug, Clone)]
pub enum Entry<T> {
    /// A single item, possibly with children.
    Item(Item<T>),
    /// A section of items.
    Section(Section<T>),
}

impl<T> From<Item<T>> for Entry<T> {
    fn from(item: Item<T>) -> Self {
        Self::Item(item)
    }
}

impl<T> From<Section<T>> for Entry<T> {
    fn from(section: Section<T>) -> Self {
        Self::Section(section)
    }
}
