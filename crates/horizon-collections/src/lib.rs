//! Horizon Collections - keyed, hierarchical, asynchronously loadable
//! collection models for item views.
//!
//! This crate provides the data side of list, tree and grid views:
//!
//! - **Collections**: immutable, keyed snapshots of items and sections
//!   ([`Collection`], [`Item`], [`Section`])
//! - **Selection and expansion**: key sets with controlled or uncontrolled
//!   ownership ([`SelectionManager`], [`ExpansionManager`])
//! - **Sorting**: sort descriptors and a stable column sort ([`SortDescriptor`])
//! - **Keyboard navigation**: optional-capability delegates with a default
//!   traversal ([`KeyboardDelegate`], [`Navigator`])
//! - **Async lists**: a load / load more / sort state machine publishing
//!   immutable snapshots ([`AsyncListController`])
//!
//! Rendering is left to the view; everything here is plain data that a
//! renderer reads.
//!
//! # Example
//!
//! ```
//! use horizon_collections::{Collection, Item, Key, KeyRule, SelectionManager, SelectionMode};
//!
//! let collection = Collection::build(
//!     vec![
//!         Item::new("Inbox").with_key("inbox").into(),
//!         Item::new("Drafts").with_key("drafts").into(),
//!     ],
//!     &KeyRule::explicit(),
//! )
//! .unwrap();
//!
//! let selection = SelectionManager::new(SelectionMode::Multiple);
//! selection.select_all(&collection);
//! assert_eq!(selection.selected_keys(&collection).len(), 2);
//! assert!(selection.is_selected(&Key::from("drafts")));
//! ```

pub mod async_list;
pub mod collection;
pub mod config;
pub mod error;
pub mod expansion;
pub mod key;
pub mod navigation;
pub mod node;
pub mod selection;
pub mod sort;

pub use async_list::{
    AsyncListController, AsyncListOptions, AsyncListSnapshot, ItemMapper, ListOperation, ListState,
    LoadResult, LoadStatus, Loader,
};
pub use collection::{Collection, DuplicatePolicy, KeyRule, Node, NodeKind};
pub use config::{CollectionConfig, DEFAULT_PAGE_SIZE};
pub use error::{CollectionError, LoadError, Result};
pub use expansion::ExpansionManager;
pub use key::{Key, KeySet};
pub use navigation::{
    CollectionKeyboardDelegate, DelegateCapabilities, FnKeyboardDelegate, KeyboardDelegate,
    NavigationKey, Navigator,
};
pub use node::{Entry, Item, LoadMoreFn, Section};
pub use selection::{SelectionManager, SelectionMode, resolve_selection};
pub use sort::{ColumnAccessor, SortDescriptor, SortDirection, SortValue, json_column_accessor, sort_items};

pub use horizon_collections_core::{ConnectionGuard, ConnectionId, ControlledState, Ownership, Signal};
