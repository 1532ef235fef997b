//! Reactive properties and controlled/uncontrolled state.
//!
//! Item views expose most of their state in two flavors:
//!
//! - **Uncontrolled**: the model is seeded with a default value and owns the
//!   canonical value from then on.
//! - **Controlled**: the value is owned by the caller. The model only reads
//!   it and announces requested changes; the owner decides whether to push
//!   a new value back with [`ControlledState::sync`].
//!
//! [`ControlledState`] makes that ownership explicit at construction time
//! instead of inferring it from which options happen to be set.
//!
//! # Example
//!
//! ```
//! use horizon_collections_core::ControlledState;
//!
//! // Uncontrolled: requests are applied immediately.
//! let sort = ControlledState::uncontrolled("name".to_string());
//! assert!(sort.request("date".to_string()));
//! assert_eq!(sort.get(), "date");
//!
//! // Controlled: requests only notify; the owner syncs the value.
//! let sort = ControlledState::controlled("name".to_string());
//! sort.changed.connect(|requested| println!("owner asked to sort by {requested}"));
//! assert!(!sort.request("date".to_string()));
//! assert_eq!(sort.get(), "name");
//! ```

use std::fmt;

use parking_lot::RwLock;

use crate::signal::Signal;

/// A shared value that reports whether a write changed it.
///
/// ```
/// use horizon_collections_core::Property;
///
/// let page_size = Property::new(10usize);
/// assert!(!page_size.set(10));
/// assert!(page_size.set(25));
/// assert_eq!(page_size.with(|size| size * 2), 50);
/// ```
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone + PartialEq> Property<T> {
    /// Wraps `value`.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// A clone of the value. Prefer [`Property::with`] for large values.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Reads the value in place.
    pub fn with<F, R>(&self, read: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        read(&self.value.read())
    }

    /// Stores `value`; returns `false` and leaves the value alone if equal.
    pub fn set(&self, value: T) -> bool {
        let mut slot = self.value.write();
        if *slot == value {
            return false;
        }
        *slot = value;
        true
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Property").field(&*self.value.read()).finish()
    }
}

/// Who owns the canonical value of a [`ControlledState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ownership {
    /// The caller owns the value; the model never mutates it.
    Controlled,
    /// The model owns the value after seeding it with a default.
    #[default]
    Uncontrolled,
}

/// State that is either owned by the model or by an external caller.
///
/// Every accepted or requested change is announced through [`changed`],
/// which carries the requested value in both modes.
///
/// [`changed`]: ControlledState::changed
pub struct ControlledState<T> {
    value: Property<T>,
    ownership: Ownership,
    /// Emitted with the requested value whenever a change is requested.
    pub changed: Signal<T>,
}

impl<T: Clone + PartialEq + Send + 'static> ControlledState<T> {
    /// Creates state whose value is owned by the caller.
    pub fn controlled(value: T) -> Self {
        Self::with_ownership(value, Ownership::Controlled)
    }

    /// Creates state owned by the model, seeded with `default`.
    pub fn uncontrolled(default: T) -> Self {
        Self::with_ownership(default, Ownership::Uncontrolled)
    }

    /// Creates state with an explicit ownership descriptor.
    pub fn with_ownership(value: T, ownership: Ownership) -> Self {
        Self {
            value: Property::new(value),
            ownership,
            changed: Signal::new(),
        }
    }

    /// Returns the ownership of this state.
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Returns `true` if the caller owns the value.
    pub fn is_controlled(&self) -> bool {
        self.ownership == Ownership::Controlled
    }

    /// Returns the current value.
    pub fn get(&self) -> T {
        self.value.get()
    }

    /// Access the current value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.value.with(f)
    }

    /// Requests a new value.
    ///
    /// Uncontrolled state stores the value and returns `true` if it changed.
    /// Controlled state leaves the value untouched and returns `false`.
    /// In both cases `changed` is emitted if the value differs from the
    /// current one.
    pub fn request(&self, value: T) -> bool {
        if self.value.with(|current| *current == value) {
            return false;
        }

        let applied = match self.ownership {
            Ownership::Uncontrolled => self.value.set(value.clone()),
            Ownership::Controlled => false,
        };
        self.changed.emit(value);
        applied
    }

    /// Replaces the value without notifying, regardless of ownership.
    ///
    /// Controlled owners call this to push their authoritative value; the
    /// model uses it for housekeeping such as pruning stale keys.
    pub fn sync(&self, value: T) -> bool {
        self.value.set(value)
    }
}

impl<T: Clone + PartialEq + Default + Send + 'static> Default for ControlledState<T> {
    fn default() -> Self {
        Self::uncontrolled(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for ControlledState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlledState")
            .field("value", &self.value)
            .field("ownership", &self.ownership)
            .finish()
    }
}

static_assertions::assert_impl_all!(Property<String>: Send, Sync);
static_assertions::assert_impl_all!(ControlledState<Vec<u64>>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    #[test]
    fn test_property_reports_changes() {
        let keys = Property::new(vec![1u32]);
        assert!(!keys.set(vec![1]));
        assert!(keys.set(vec![1, 2]));
        assert_eq!(keys.with(Vec::len), 2);
        assert_eq!(format!("{keys:?}"), "Property([1, 2])");
    }

    #[test]
    fn test_uncontrolled_request_applies() {
        let state = ControlledState::uncontrolled(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        state.changed.connect(move |&v| seen_clone.lock().push(v));

        assert!(state.request(2));
        assert!(!state.request(2));
        assert_eq!(state.get(), 2);
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn test_controlled_request_only_notifies() {
        let state = ControlledState::controlled(1);
        let notified = Arc::new(AtomicUsize::new(0));
        let notified_clone = notified.clone();
        state.changed.connect(move |_| {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!state.request(5));
        assert_eq!(state.get(), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        assert!(state.sync(5));
        assert_eq!(state.get(), 5);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_is_uncontrolled() {
        let state: ControlledState<Vec<u8>> = ControlledState::default();
        assert_eq!(state.ownership(), Ownership::Uncontrolled);
        assert!(!state.is_controlled());
        assert!(state.get().is_empty());
    }
}
