//! Configuration for collections and async lists.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.
//!
//! ```
//! use horizon_collections::{CollectionConfig, SelectionMode, SortDirection};
//!
//! let config = CollectionConfig::from_toml_str(r#"
//!     selection_mode = "multiple"
//!     item_key = "uuid"
//!
//!     [default_sort_descriptor]
//!     column = "name"
//!     direction = "descending"
//! "#).unwrap();
//!
//! assert_eq!(config.selection_mode, SelectionMode::Multiple);
//! assert_eq!(config.item_key.as_deref(), Some("uuid"));
//! assert_eq!(
//!     config.default_sort_descriptor.and_then(|d| d.direction),
//!     Some(SortDirection::Descending)
//! );
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CollectionError, Result};
use crate::selection::SelectionMode;
use crate::sort::SortDescriptor;

/// Default number of items a page navigation moves by.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Recognized collection options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// The kind of selection allowed.
    pub selection_mode: SelectionMode,
    /// Whether clearing the selection is rejected.
    pub disallow_empty_selection: bool,
    /// Payload field used as the key when items carry none.
    /// `None` tries `id`, then `key`.
    pub item_key: Option<String>,
    /// Items moved by page up/down navigation.
    pub page_size: usize,
    /// Sort descriptor applied before the first explicit sort.
    pub default_sort_descriptor: Option<SortDescriptor>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            selection_mode: SelectionMode::Single,
            disallow_empty_selection: false,
            item_key: None,
            page_size: DEFAULT_PAGE_SIZE,
            default_sort_descriptor: None,
        }
    }
}

impl CollectionConfig {
    /// Parses a configuration from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| CollectionError::Config(e.to_string()))?;
        if config.page_size == 0 {
            return Err(CollectionError::Config("page_size must be at least 1".into()));
        }
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CollectionError::Config(e.to_string()))
    }

    /// Sets the selection mode.
    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.selection_mode = mode;
        self
    }

    /// Sets whether empty selection is disallowed.
    pub fn with_disallow_empty_selection(mut self, disallow: bool) -> Self {
        self.disallow_empty_selection = disallow;
        self
    }

    /// Sets the key field name.
    pub fn with_item_key(mut self, field: impl Into<String>) -> Self {
        self.item_key = Some(field.into());
        self
    }

    /// Sets the default sort descriptor.
    pub fn with_default_sort_descriptor(mut self, descriptor: SortDescriptor) -> Self {
        self.default_sort_descriptor = Some(descriptor);
        self
    }

    /// Sets the page size; values below 1 are raised to 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
