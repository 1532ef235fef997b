//! Asynchronously loaded lists.
//!
//! [`AsyncListController`] owns the items of a list together with its
//! selection, expansion and sort state, and drives the load life cycle:
//!
//! ```text
//!            load()            ok
//!   Idle ───────────► Loading ─────► Idle
//!    │  load_more()              err
//!    ├──────────────► LoadingMore ──► Error ──(load / load_more / sort)──► ...
//!    │  sort()
//!    └──────────────► Sorting
//! ```
//!
//! Only one of `load`, `load_more` and `sort` runs at a time. A call made
//! while another is in flight is rejected with [`CollectionError::Busy`]
//! instead of being queued, so results are applied in the order their calls
//! were accepted.
//!
//! Every transition publishes a new immutable [`AsyncListSnapshot`]. Readers
//! clone an `Arc` and never block writers; renderers can also connect to
//! [`AsyncListController::state_changed`], which delivers snapshots in
//! version order.
//!
//! Dropping an operation's future before it completes, or a loader that
//! panics, fails the operation with a "cancelled" error so the list accepts
//! the next call.
//!
//! Loader failures are not returned as errors. The controller moves to
//! [`LoadStatus::Error`], keeps the last good items and exposes the failure
//! through [`AsyncListSnapshot::error`].
//!
//! # Example
//!
//! ```
//! use horizon_collections::{AsyncListController, AsyncListOptions, ListState};
//! use serde::Serialize;
//!
//! #[derive(Clone, Serialize)]
//! struct Row {
//!     id: u32,
//!     name: String,
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let options = AsyncListOptions::new(|_state: ListState<Row>| async {
//!     Ok(ListState::new(vec![
//!         Row { id: 1, name: "Apple".into() },
//!         Row { id: 2, name: "Banana".into() },
//!     ]))
//! });
//!
//! let list = AsyncListController::new(options).unwrap();
//! let snapshot = list.load().await.unwrap();
//! assert_eq!(snapshot.items().count(), 2);
//! assert!(!snapshot.is_loading());
//! # });
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use horizon_collections_core::logging::targets;
use horizon_collections_core::{ControlledState, Ownership, Signal};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::collection::{Collection, KeyRule};
use crate::config::CollectionConfig;
use crate::error::{CollectionError, LoadError, Result};
use crate::expansion::ExpansionManager;
use crate::key::{Key, KeySet};
use crate::navigation::{CollectionKeyboardDelegate, Navigator};
use crate::node::{Entry, Item, LoadMoreFn};
use crate::selection::{SelectionManager, resolve_selection};
use crate::sort::{ColumnAccessor, SortDescriptor, json_column_accessor, sort_items};

/// A state-changing operation of an async list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListOperation {
    /// Full reload.
    Load,
    /// Incremental append.
    LoadMore,
    /// Reordering.
    Sort,
}

impl fmt::Display for ListOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => write!(f, "load"),
            Self::LoadMore => write!(f, "load more"),
            Self::Sort => write!(f, "sort"),
        }
    }
}

/// Life cycle state of an async list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadStatus {
    /// Nothing in flight.
    #[default]
    Idle,
    /// A full load is in flight.
    Loading,
    /// An incremental load is in flight.
    LoadingMore,
    /// A sort is in flight.
    Sorting,
    /// The last operation failed.
    Error,
}

impl LoadStatus {
    /// Returns `true` while an operation is in flight.
    pub fn is_loading(self) -> bool {
        self.in_flight().is_some()
    }

    /// The operation in flight, if any.
    pub fn in_flight(self) -> Option<ListOperation> {
        match self {
            Self::Loading => Some(ListOperation::Load),
            Self::LoadingMore => Some(ListOperation::LoadMore),
            Self::Sorting => Some(ListOperation::Sort),
            Self::Idle | Self::Error => None,
        }
    }

    fn running(operation: ListOperation) -> Self {
        match operation {
            ListOperation::Load => Self::Loading,
            ListOperation::LoadMore => Self::LoadingMore,
            ListOperation::Sort => Self::Sorting,
        }
    }
}

/// The state exchanged with loaders.
///
/// Loaders receive the current state and answer with a new one. Fields left
/// as `None` in an answer keep their current value.
#[derive(Debug, Clone)]
pub struct ListState<T> {
    /// The items. Replaces the list on load and sort, appended on load more.
    pub items: Vec<T>,
    /// Keys that cannot be selected or focused.
    pub disabled_keys: Option<KeySet>,
    /// Selected keys.
    pub selected_keys: Option<KeySet>,
    /// Selected key in single selection mode.
    pub selected_key: Option<Key>,
    /// Expanded keys.
    pub expanded_keys: Option<KeySet>,
    /// Sort descriptor.
    pub sort_descriptor: Option<SortDescriptor>,
}

impl<T> ListState<T> {
    /// Creates a state holding only items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            disabled_keys: None,
            selected_keys: None,
            selected_key: None,
            expanded_keys: None,
            sort_descriptor: None,
        }
    }

    /// Sets the disabled keys.
    pub fn with_disabled_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.disabled_keys = Some(keys.into_iter().collect());
        self
    }

    /// Sets the selected keys.
    pub fn with_selected_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.selected_keys = Some(keys.into_iter().collect());
        self
    }

    /// Sets the selected key.
    pub fn with_selected_key(mut self, key: impl Into<Key>) -> Self {
        self.selected_key = Some(key.into());
        self
    }

    /// Sets the expanded keys.
    pub fn with_expanded_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.expanded_keys = Some(keys.into_iter().collect());
        self
    }

    /// Sets the sort descriptor.
    pub fn with_sort_descriptor(mut self, descriptor: SortDescriptor) -> Self {
        self.sort_descriptor = Some(descriptor);
        self
    }
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> From<Vec<T>> for ListState<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

/// Outcome of a loader call.
pub type LoadResult<T> = std::result::Result<ListState<T>, LoadError>;

/// A caller-supplied loader.
pub type Loader<T> = Arc<dyn Fn(ListState<T>) -> BoxFuture<'static, LoadResult<T>> + Send + Sync>;

/// Maps a payload to the item it is shown as.
///
/// Lets hierarchical payloads supply child items, text values and the
/// has-children flag. Without a mapper every payload is a flat item.
pub type ItemMapper<T> = Arc<dyn Fn(&T) -> Item<T> + Send + Sync>;

fn boxed_loader<T, F, Fut>(loader: F) -> Loader<T>
where
    T: Send + 'static,
    F: Fn(ListState<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult<T>> + Send + 'static,
{
    Arc::new(move |state: ListState<T>| loader(state).boxed())
}

/// Construction options for an [`AsyncListController`].
pub struct AsyncListOptions<T> {
    load: Loader<T>,
    load_more: Option<Loader<T>>,
    sort: Option<Loader<T>>,
    item_mapper: Option<ItemMapper<T>>,
    config: CollectionConfig,
    initial: ListState<T>,
    selection_ownership: Ownership,
    expansion_ownership: Ownership,
    sort_ownership: Ownership,
}

impl<T: Send + 'static> AsyncListOptions<T> {
    /// Creates options around the full loader.
    pub fn new<F, Fut>(load: F) -> Self
    where
        F: Fn(ListState<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult<T>> + Send + 'static,
    {
        Self {
            load: boxed_loader(load),
            load_more: None,
            sort: None,
            item_mapper: None,
            config: CollectionConfig::default(),
            initial: ListState::default(),
            selection_ownership: Ownership::Uncontrolled,
            expansion_ownership: Ownership::Uncontrolled,
            sort_ownership: Ownership::Uncontrolled,
        }
    }

    /// Registers the incremental loader used by `load_more`.
    pub fn with_load_more<F, Fut>(mut self, load_more: F) -> Self
    where
        F: Fn(ListState<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult<T>> + Send + 'static,
    {
        self.load_more = Some(boxed_loader(load_more));
        self
    }

    /// Registers a custom sort, replacing the default column sort.
    ///
    /// The function receives the current state with the requested
    /// descriptor and answers with the sorted items.
    pub fn with_sort<F, Fut>(mut self, sort: F) -> Self
    where
        F: Fn(ListState<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult<T>> + Send + 'static,
    {
        self.sort = Some(boxed_loader(sort));
        self
    }

    /// Registers the mapping from payloads to items.
    pub fn with_item_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&T) -> Item<T> + Send + Sync + 'static,
    {
        self.item_mapper = Some(Arc::new(mapper));
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: CollectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Seeds the items and uncontrolled state.
    pub fn with_initial_state(mut self, state: ListState<T>) -> Self {
        self.initial = state;
        self
    }

    /// Makes the selection caller-owned, starting at `keys`.
    pub fn controlled_selection<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.selection_ownership = Ownership::Controlled;
        self.initial.selected_keys = Some(keys.into_iter().collect());
        self.initial.selected_key = None;
        self
    }

    /// Makes the expanded keys caller-owned, starting at `keys`.
    pub fn controlled_expansion<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.expansion_ownership = Ownership::Controlled;
        self.initial.expanded_keys = Some(keys.into_iter().collect());
        self
    }

    /// Makes the sort descriptor caller-owned, starting at `descriptor`.
    pub fn controlled_sort(mut self, descriptor: Option<SortDescriptor>) -> Self {
        self.sort_ownership = Ownership::Controlled;
        self.initial.sort_descriptor = descriptor;
        self
    }
}

impl<T> fmt::Debug for AsyncListOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncListOptions")
            .field("has_load_more", &self.load_more.is_some())
            .field("has_sort", &self.sort.is_some())
            .field("has_item_mapper", &self.item_mapper.is_some())
            .field("config", &self.config)
            .field("initial_items", &self.initial.items.len())
            .field("selection_ownership", &self.selection_ownership)
            .field("expansion_ownership", &self.expansion_ownership)
            .field("sort_ownership", &self.sort_ownership)
            .finish()
    }
}

/// An immutable view of an async list at one point in time.
pub struct AsyncListSnapshot<T> {
    collection: Arc<Collection<T>>,
    status: LoadStatus,
    error: Option<LoadError>,
    sort_descriptor: Option<SortDescriptor>,
    selected_keys: KeySet,
    expanded_keys: KeySet,
    page_size: usize,
    version: u64,
}

impl<T> AsyncListSnapshot<T> {
    /// The collection built from the items.
    pub fn collection(&self) -> &Arc<Collection<T>> {
        &self.collection
    }

    /// The items in order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.collection.item_values()
    }

    /// The life cycle state.
    pub fn status(&self) -> LoadStatus {
        self.status
    }

    /// Returns `true` while an operation is in flight.
    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    /// The failure of the last operation, if it failed.
    pub fn error(&self) -> Option<&LoadError> {
        self.error.as_ref()
    }

    /// The current sort descriptor.
    pub fn sort_descriptor(&self) -> Option<&SortDescriptor> {
        self.sort_descriptor.as_ref()
    }

    /// Keys that cannot be selected or focused.
    pub fn disabled_keys(&self) -> &KeySet {
        self.collection.disabled_keys()
    }

    /// Selected keys present in the collection.
    pub fn selected_keys(&self) -> &KeySet {
        &self.selected_keys
    }

    /// The most recently selected key.
    pub fn selected_key(&self) -> Option<&Key> {
        self.selected_keys.last()
    }

    /// Expanded keys present in the collection.
    pub fn expanded_keys(&self) -> &KeySet {
        &self.expanded_keys
    }

    /// Monotonic publication counter.
    ///
    /// [`AsyncListController::state_changed`] delivers snapshots in
    /// increasing version order.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The default keyboard traversal for this snapshot.
    pub fn keyboard_delegate(&self) -> CollectionKeyboardDelegate<'_, T> {
        CollectionKeyboardDelegate::new(&self.collection, &self.expanded_keys)
            .with_page_size(self.page_size)
    }

    /// A navigator over this snapshot without a custom delegate.
    pub fn navigator(&self) -> Navigator<'_, T> {
        Navigator::new(&self.collection, &self.expanded_keys).with_page_size(self.page_size)
    }
}

impl<T> fmt::Debug for AsyncListSnapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncListSnapshot")
            .field("version", &self.version)
            .field("status", &self.status)
            .field("error", &self.error)
            .field("collection", &self.collection)
            .field("sort_descriptor", &self.sort_descriptor)
            .field("selected_keys", &self.selected_keys)
            .field("expanded_keys", &self.expanded_keys)
            .finish()
    }
}

struct ListInner<T> {
    items: Vec<T>,
    status: LoadStatus,
    error: Option<LoadError>,
    collection: Arc<Collection<T>>,
    version: u64,
    pending: VecDeque<Arc<AsyncListSnapshot<T>>>,
}

/// Owns the state of an asynchronously loaded list.
pub struct AsyncListController<T> {
    load: Loader<T>,
    load_more: Option<Loader<T>>,
    sort: Option<Loader<T>>,
    key_rule: KeyRule<T>,
    item_mapper: Option<ItemMapper<T>>,
    column_accessor: ColumnAccessor<T>,
    config: CollectionConfig,
    inner: Mutex<ListInner<T>>,
    snapshot: RwLock<Arc<AsyncListSnapshot<T>>>,
    emitting: AtomicBool,
    selection: SelectionManager,
    expansion: ExpansionManager,
    sort_descriptor: ControlledState<Option<SortDescriptor>>,
    runtime: Option<tokio::runtime::Handle>,
    this: Weak<Self>,
    /// Emitted with every published snapshot.
    pub state_changed: Signal<Arc<AsyncListSnapshot<T>>>,
}

impl<T: Clone + Serialize + Send + Sync + 'static> AsyncListController<T> {
    /// Creates a controller deriving keys from the payload fields named by
    /// the configuration and sorting by serialized field values.
    ///
    /// Fails if the seeded items contain duplicate or missing keys.
    pub fn new(options: AsyncListOptions<T>) -> Result<Arc<Self>> {
        let key_rule = KeyRule::from_config(&options.config);
        Self::with_rules(options, key_rule, json_column_accessor())
    }
}

impl<T: Clone + Send + Sync + 'static> AsyncListController<T> {
    /// Creates a controller with an explicit key rule and column accessor.
    pub fn with_rules(
        options: AsyncListOptions<T>,
        key_rule: KeyRule<T>,
        column_accessor: ColumnAccessor<T>,
    ) -> Result<Arc<Self>> {
        let AsyncListOptions {
            load,
            load_more,
            sort,
            item_mapper,
            config,
            initial,
            selection_ownership,
            expansion_ownership,
            sort_ownership,
        } = options;
        let ListState {
            items,
            disabled_keys,
            selected_keys,
            selected_key,
            expanded_keys,
            sort_descriptor,
        } = initial;

        let base = build_collection(&items, &key_rule, item_mapper.as_ref())?;
        let disabled = disabled_keys.unwrap_or_default();

        let selected = resolve_selection(config.selection_mode, selected_key, selected_keys);
        let selection =
            SelectionManager::with_ownership(config.selection_mode, selected.unwrap_or_default(), selection_ownership)
                .with_disallow_empty_selection(config.disallow_empty_selection);
        let expansion =
            ExpansionManager::with_ownership(expanded_keys.unwrap_or_default(), expansion_ownership);
        let sort_descriptor = ControlledState::with_ownership(
            sort_descriptor.or_else(|| config.default_sort_descriptor.clone()),
            sort_ownership,
        );
        let runtime = tokio::runtime::Handle::try_current().ok();
        if load_more.is_some() && runtime.is_none() {
            tracing::debug!(
                target: targets::ASYNC_LIST,
                "no tokio runtime, collection load-more trigger disabled"
            );
        }

        let list = Arc::new_cyclic(|this| Self {
            load,
            load_more,
            sort,
            key_rule,
            item_mapper,
            column_accessor,
            config,
            inner: Mutex::new(ListInner {
                items,
                status: LoadStatus::Idle,
                error: None,
                collection: Arc::new(Collection::empty()),
                version: 0,
                pending: VecDeque::new(),
            }),
            snapshot: RwLock::new(Arc::new(AsyncListSnapshot {
                collection: Arc::new(Collection::empty()),
                status: LoadStatus::Idle,
                error: None,
                sort_descriptor: None,
                selected_keys: KeySet::new(),
                expanded_keys: KeySet::new(),
                page_size: 1,
                version: 0,
            })),
            emitting: AtomicBool::new(false),
            selection,
            expansion,
            sort_descriptor,
            runtime,
            this: this.clone(),
            state_changed: Signal::new(),
        });

        {
            let mut inner = list.inner.lock();
            inner.collection = Arc::new(list.decorate(base, &disabled));
            list.selection.prune(&inner.collection);
            list.expansion.prune(&inner.collection);
        }
        list.publish();
        Ok(list)
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> Arc<AsyncListSnapshot<T>> {
        self.snapshot.read().clone()
    }

    /// The current life cycle state.
    pub fn status(&self) -> LoadStatus {
        self.inner.lock().status
    }

    /// The configuration the controller was created with.
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Emitted when a selection change is requested.
    pub fn selection_changed(&self) -> &Signal<KeySet> {
        self.selection.changed()
    }

    /// Emitted when an expansion change is requested.
    pub fn expansion_changed(&self) -> &Signal<KeySet> {
        self.expansion.changed()
    }

    /// Emitted when a sort descriptor change is requested.
    pub fn sort_changed(&self) -> &Signal<Option<SortDescriptor>> {
        &self.sort_descriptor.changed
    }

    /// Replaces the items with the result of the full loader.
    #[tracing::instrument(skip(self), target = "horizon_collections::async_list", level = "debug")]
    pub async fn load(&self) -> Result<Arc<AsyncListSnapshot<T>>> {
        let (request, in_flight) = self.begin(ListOperation::Load)?;
        let result = (self.load)(request).await;
        self.finish(in_flight, result, None)
    }

    /// Appends the result of the incremental loader.
    #[tracing::instrument(skip(self), target = "horizon_collections::async_list", level = "debug")]
    pub async fn load_more(&self) -> Result<Arc<AsyncListSnapshot<T>>> {
        let Some(load_more) = self.load_more.clone() else {
            return Err(CollectionError::NoLoader {
                operation: ListOperation::LoadMore,
            });
        };
        let (request, in_flight) = self.begin(ListOperation::LoadMore)?;
        let result = load_more(request).await;
        self.finish(in_flight, result, None)
    }

    /// Sorts the items by `descriptor`.
    ///
    /// Uses the custom sort if one is registered, otherwise a stable sort by
    /// the descriptor's column.
    #[tracing::instrument(skip(self), target = "horizon_collections::async_list", level = "debug")]
    pub async fn sort(&self, descriptor: SortDescriptor) -> Result<Arc<AsyncListSnapshot<T>>> {
        let (mut request, in_flight) = self.begin(ListOperation::Sort)?;
        request.sort_descriptor = Some(descriptor.clone());
        let result = match &self.sort {
            Some(sort) => sort(request).await,
            None => {
                let mut items = request.items;
                sort_items(&mut items, &descriptor, &self.column_accessor);
                Ok(ListState::new(items))
            }
        };
        self.finish(in_flight, result, Some(descriptor))
    }

    /// Selects a key. Returns `true` if a change was requested.
    pub fn select(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let collection = self.collection();
        let changed = self.selection.select(&collection, &key);
        self.publish_if(changed)
    }

    /// Deselects a key.
    pub fn deselect(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let collection = self.collection();
        let changed = self.selection.deselect(&collection, &key);
        self.publish_if(changed)
    }

    /// Toggles the selection of a key.
    pub fn toggle_selection(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let collection = self.collection();
        let changed = self.selection.toggle(&collection, &key);
        self.publish_if(changed)
    }

    /// Replaces the selection.
    pub fn set_selected_keys<I, K>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let collection = self.collection();
        let changed = self
            .selection
            .replace_selection(&collection, keys.into_iter().map(Into::into));
        self.publish_if(changed)
    }

    /// Clears the selection. Returns `false` when empty selection is
    /// disallowed.
    pub fn clear_selection(&self) -> bool {
        let changed = self.selection.clear_selection();
        self.publish_if(changed)
    }

    /// Selects every enabled item. Multiple selection mode only.
    pub fn select_all(&self) -> bool {
        let collection = self.collection();
        let changed = self.selection.select_all(&collection);
        self.publish_if(changed)
    }

    /// Expands or collapses an item.
    pub fn toggle_expanded(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let collection = self.collection();
        let changed = self.expansion.toggle(&collection, &key);
        self.publish_if(changed)
    }

    /// Replaces the expanded keys.
    pub fn set_expanded_keys<I, K>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let collection = self.collection();
        let changed = self
            .expansion
            .set_expanded_keys(&collection, keys.into_iter().map(Into::into));
        self.publish_if(changed)
    }

    /// Replaces the disabled keys, dropping keys that are not in the list.
    pub fn set_disabled_keys<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        {
            let mut inner = self.inner.lock();
            let collection = (*inner.collection).clone().with_disabled_keys(keys);
            inner.collection = Arc::new(collection);
        }
        self.publish();
    }

    /// Pushes a caller-owned selection.
    pub fn sync_selected_keys<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.selection.sync(keys.into_iter().collect());
        self.publish();
    }

    /// Pushes caller-owned expanded keys.
    pub fn sync_expanded_keys<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.expansion.sync(keys.into_iter().collect());
        self.publish();
    }

    /// Pushes a caller-owned sort descriptor.
    pub fn set_sort_descriptor(&self, descriptor: Option<SortDescriptor>) {
        self.sort_descriptor.sync(descriptor);
        self.publish();
    }

    fn collection(&self) -> Arc<Collection<T>> {
        self.inner.lock().collection.clone()
    }

    fn begin(&self, operation: ListOperation) -> Result<(ListState<T>, InFlight<'_, T>)> {
        let request = {
            let mut inner = self.inner.lock();
            if let Some(in_flight) = inner.status.in_flight() {
                tracing::debug!(
                    target: targets::ASYNC_LIST,
                    requested = %operation,
                    %in_flight,
                    "rejecting request while busy"
                );
                return Err(CollectionError::Busy {
                    requested: operation,
                    in_flight,
                });
            }
            inner.status = LoadStatus::running(operation);
            inner.collection = Arc::new((*inner.collection).clone().with_loading(true));

            ListState {
                items: inner.items.clone(),
                disabled_keys: Some(inner.collection.disabled_keys().clone()),
                selected_keys: Some(self.selection.selected_keys(&inner.collection)),
                selected_key: self.selection.selected_key(&inner.collection),
                expanded_keys: Some(self.expansion.expanded_keys(&inner.collection)),
                sort_descriptor: self.sort_descriptor.get(),
            }
        };
        self.publish();
        Ok((
            request,
            InFlight {
                list: self,
                operation,
                armed: true,
            },
        ))
    }

    fn finish(
        &self,
        in_flight: InFlight<'_, T>,
        result: LoadResult<T>,
        requested_sort: Option<SortDescriptor>,
    ) -> Result<Arc<AsyncListSnapshot<T>>> {
        let operation = in_flight.disarm();
        match result {
            Ok(state) => self.apply(operation, state, requested_sort),
            Err(error) => {
                tracing::warn!(
                    target: targets::ASYNC_LIST,
                    %operation,
                    %error,
                    "loader failed, keeping last items"
                );
                self.fail(error);
                Ok(self.publish())
            }
        }
    }

    fn abandon(&self, operation: ListOperation) {
        tracing::warn!(
            target: targets::ASYNC_LIST,
            %operation,
            "operation dropped before completion"
        );
        self.fail(LoadError::new(format!("{operation} was cancelled")));
        self.publish();
    }

    fn fail(&self, error: LoadError) {
        let mut inner = self.inner.lock();
        inner.status = LoadStatus::Error;
        inner.error = Some(error);
        inner.collection = Arc::new((*inner.collection).clone().with_loading(false));
    }

    fn apply(
        &self,
        operation: ListOperation,
        state: ListState<T>,
        requested_sort: Option<SortDescriptor>,
    ) -> Result<Arc<AsyncListSnapshot<T>>> {
        let ListState {
            items,
            disabled_keys,
            selected_keys,
            selected_key,
            expanded_keys,
            sort_descriptor,
        } = state;

        let built = {
            let mut inner = self.inner.lock();
            let items = match operation {
                ListOperation::LoadMore => {
                    let mut merged = inner.items.clone();
                    merged.extend(items);
                    merged
                }
                ListOperation::Load | ListOperation::Sort => items,
            };
            let disabled = disabled_keys.unwrap_or_else(|| inner.collection.disabled_keys().clone());

            match build_collection(&items, &self.key_rule, self.item_mapper.as_ref()) {
                Ok(base) => {
                    inner.items = items;
                    inner.collection = Arc::new(self.decorate(base, &disabled));
                    inner.status = LoadStatus::Idle;
                    inner.error = None;
                    self.selection.prune(&inner.collection);
                    self.expansion.prune(&inner.collection);
                    Ok(inner.collection.clone())
                }
                Err(err) => Err(err),
            }
        };

        let collection = match built {
            Ok(collection) => collection,
            Err(err) => {
                tracing::warn!(
                    target: targets::ASYNC_LIST,
                    %operation,
                    %err,
                    "loader result rejected, keeping last items"
                );
                self.fail(LoadError::from(err.clone()));
                self.publish();
                return Err(err);
            }
        };

        if let Some(keys) = resolve_selection(self.selection.mode(), selected_key, selected_keys) {
            self.selection.replace_selection(&collection, keys);
        }
        if let Some(keys) = expanded_keys {
            self.expansion.set_expanded_keys(&collection, keys);
        }
        if let Some(descriptor) = sort_descriptor.or(requested_sort) {
            self.sort_descriptor.request(Some(descriptor));
        }

        tracing::debug!(
            target: targets::ASYNC_LIST,
            %operation,
            items = collection.len(),
            "operation completed"
        );
        Ok(self.publish())
    }

    fn decorate(&self, base: Collection<T>, disabled: &KeySet) -> Collection<T> {
        base.with_disabled_keys(disabled)
            .with_load_more_fn(self.load_more_trigger())
    }

    fn load_more_trigger(&self) -> Option<LoadMoreFn> {
        self.load_more.as_ref()?;
        let runtime = self.runtime.clone()?;
        let this = self.this.clone();
        Some(Arc::new(move || {
            let Some(list) = this.upgrade() else {
                return;
            };
            runtime.spawn(async move {
                if let Err(err) = list.load_more().await {
                    tracing::debug!(
                        target: targets::ASYNC_LIST,
                        %err,
                        "load more trigger ignored"
                    );
                }
            });
        }))
    }

    fn publish_if(&self, changed: bool) -> bool {
        if changed {
            self.publish();
        }
        changed
    }

    fn publish(&self) -> Arc<AsyncListSnapshot<T>> {
        let snapshot = {
            let mut inner = self.inner.lock();
            inner.version += 1;
            let snapshot = Arc::new(AsyncListSnapshot {
                collection: inner.collection.clone(),
                status: inner.status,
                error: inner.error.clone(),
                sort_descriptor: self.sort_descriptor.get(),
                selected_keys: self.selection.selected_keys(&inner.collection),
                expanded_keys: self.expansion.expanded_keys(&inner.collection),
                page_size: self.config.page_size,
                version: inner.version,
            });
            *self.snapshot.write() = snapshot.clone();
            inner.pending.push_back(snapshot.clone());
            snapshot
        };
        self.emit_pending();
        snapshot
    }

    /// Emits queued snapshots in version order.
    ///
    /// Only one caller drains at a time. A publish that finds the queue
    /// being drained, including one made from a `state_changed` handler,
    /// leaves its snapshot to the drainer.
    fn emit_pending(&self) {
        while self
            .emitting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            let draining = Draining(&self.emitting);
            loop {
                let next = self.inner.lock().pending.pop_front();
                let Some(snapshot) = next else {
                    break;
                };
                self.state_changed.emit(snapshot);
            }
            drop(draining);
            // A publish racing the reset above may have queued after the last pop.
            if self.inner.lock().pending.is_empty() {
                break;
            }
        }
    }
}

/// Clears the draining flag, also when a handler panics.
struct Draining<'a>(&'a AtomicBool);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// An accepted operation that has not completed yet.
///
/// Dropped without [`InFlight::disarm`] when the operation's future is
/// dropped or its loader panics; the list then fails the operation.
struct InFlight<'a, T: Clone + Send + Sync + 'static> {
    list: &'a AsyncListController<T>,
    operation: ListOperation,
    armed: bool,
}

impl<T: Clone + Send + Sync + 'static> InFlight<'_, T> {
    fn disarm(mut self) -> ListOperation {
        self.armed = false;
        self.operation
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.list.abandon(self.operation);
        }
    }
}

impl<T> fmt::Debug for AsyncListController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncListController")
            .field("snapshot", &*self.snapshot.read())
            .field("has_load_more", &self.load_more.is_some())
            .field("has_sort", &self.sort.is_some())
            .finish()
    }
}

fn build_collection<T: Clone>(
    items: &[T],
    key_rule: &KeyRule<T>,
    item_mapper: Option<&ItemMapper<T>>,
) -> Result<Collection<T>> {
    Collection::build(
        items.iter().map(|value| match item_mapper {
            Some(mapper) => Entry::Item(mapper(value)),
            None => Entry::Item(Item::new(value.clone())),
        }),
        key_rule,
    )
}

static_assertions::assert_impl_all!(AsyncListController<String>: Send, Sync);
static_assertions::assert_impl_all!(AsyncListSnapshot<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Row {
        id: u32,
        name: &'static str,
    }

    fn rows(ids: &[u32]) -> Vec<Row> {
        ids.iter().map(|&id| Row { id, name: "row" }).collect()
    }

    fn ids(snapshot: &AsyncListSnapshot<Row>) -> Vec<u32> {
        snapshot.items().map(|row| row.id).collect()
    }

    #[test]
    fn test_status_in_flight() {
        assert!(!LoadStatus::Idle.is_loading());
        assert!(!LoadStatus::Error.is_loading());
        assert_eq!(LoadStatus::Sorting.in_flight(), Some(ListOperation::Sort));
        assert_eq!(LoadStatus::running(ListOperation::LoadMore), LoadStatus::LoadingMore);
        assert_eq!(ListOperation::LoadMore.to_string(), "load more");
    }

    #[test]
    fn test_seeded_state_without_runtime() {
        let options = AsyncListOptions::new(|_state: ListState<Row>| async { Ok(ListState::default()) })
            .with_initial_state(ListState::new(rows(&[1, 2])).with_selected_key(2u32).with_disabled_keys([1u32]))
            .with_load_more(|_state: ListState<Row>| async { Ok(ListState::default()) });

        let list = AsyncListController::new(options).unwrap();
        let snapshot = list.snapshot();
        assert_eq!(ids(&snapshot), vec![1, 2]);
        assert_eq!(snapshot.selected_key(), Some(&Key::Int(2)));
        assert!(snapshot.disabled_keys().contains(&Key::Int(1)));
        assert_eq!(snapshot.status(), LoadStatus::Idle);
        // Without a runtime the collection has no trigger to spawn on.
        assert!(!snapshot.collection().can_load_more());
    }

    #[test]
    fn test_seeded_duplicate_keys_rejected() {
        let options = AsyncListOptions::new(|_state: ListState<Row>| async { Ok(ListState::default()) })
            .with_initial_state(ListState::new(rows(&[1, 1])));
        let err = AsyncListController::new(options).unwrap_err();
        assert!(matches!(err, CollectionError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn test_load_replaces_items() {
        let options = AsyncListOptions::new(|_state: ListState<Row>| async { Ok(ListState::new(rows(&[3, 4]))) })
            .with_initial_state(ListState::new(rows(&[1, 2])));
        let list = AsyncListController::new(options).unwrap();

        let snapshot = list.load().await.unwrap();
        assert_eq!(ids(&snapshot), vec![3, 4]);
        assert_eq!(snapshot.status(), LoadStatus::Idle);
        assert!(snapshot.error().is_none());
    }

    #[tokio::test]
    async fn test_load_more_without_loader() {
        let options = AsyncListOptions::new(|_state: ListState<Row>| async { Ok(ListState::default()) });
        let list = AsyncListController::new(options).unwrap();
        let err = list.load_more().await.unwrap_err();
        assert!(matches!(err, CollectionError::NoLoader { operation: ListOperation::LoadMore }));
        assert_eq!(list.status(), LoadStatus::Idle);
    }

    #[tokio::test]
    async fn test_loader_receives_current_state() {
        let options = AsyncListOptions::new(|state: ListState<Row>| async move {
            assert_eq!(state.items.len(), 2);
            assert_eq!(state.selected_keys, Some(KeySet::single(1)));
            Ok(ListState::new(state.items))
        })
        .with_initial_state(ListState::new(rows(&[1, 2])).with_selected_keys([1u32]));
        let list = AsyncListController::new(options).unwrap();
        list.load().await.unwrap();
    }
}
