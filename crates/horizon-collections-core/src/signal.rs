//! Signal/slot system for Horizon Collections.
//!
//! Models announce state changes through a [`Signal`]. There is no event
//! loop here: slots run on the emitting thread, after the model has released
//! its locks, so a slot may read the model or connect and disconnect slots.
//!
//! # Example
//!
//! ```
//! use horizon_collections_core::Signal;
//!
//! let selection_changed = Signal::<Vec<u32>>::new();
//!
//! let conn_id = selection_changed.connect(|keys| {
//!     println!("Selection is now: {:?}", keys);
//! });
//!
//! selection_changed.emit(vec![1, 2]);
//! selection_changed.disconnect(conn_id);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::logging::targets;

new_key_type! {
    /// Handle of one connected slot, accepted by [`Signal::disconnect`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A change notification with any number of connected slots.
///
/// Slots receive a reference to the emitted value. Models emit owned
/// snapshots or key sets, so slots can keep what they need by cloning.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    blocked: AtomicBool,
}

impl<Args: Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Send + 'static> Signal<Args> {
    /// Creates a signal without slots.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connects a slot and returns its handle.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Removes a slot. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Removes every slot.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Suppresses emission while `blocked` is set.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Whether emission is suppressed.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Invokes every slot with `args` and returns how many ran.
    #[tracing::instrument(skip_all, target = "horizon_collections_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) -> usize {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "emit suppressed");
            return 0;
        }

        // Snapshot the slots so they can reconnect or disconnect while running.
        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, slots = slots.len(), "emit");
        slots.iter().for_each(|slot| slot(&args));
        slots.len()
    }

    /// Connects a slot that stays connected until the returned guard drops.
    pub fn connect_scoped<F>(self: &Arc<Self>, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard {
            signal: Arc::downgrade(self),
            id,
        }
    }
}

/// Disconnects its slot on drop. Holds the signal weakly.
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use horizon_collections_core::Signal;
///
/// let rows_loaded = Arc::new(Signal::<usize>::new());
/// let total = Arc::new(AtomicUsize::new(0));
/// {
///     let total = total.clone();
///     let _guard = rows_loaded.connect_scoped(move |&rows| {
///         total.fetch_add(rows, Ordering::SeqCst);
///     });
///     rows_loaded.emit(20);
/// }
/// rows_loaded.emit(20);
/// assert_eq!(total.load(Ordering::SeqCst), 20);
/// ```
pub struct ConnectionGuard<Args: Send + 'static> {
    signal: Weak<Signal<Args>>,
    id: ConnectionId,
}

impl<Args: Send + 'static> ConnectionGuard<Args> {
    /// The id of the guarded connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args: Send + 'static> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.disconnect(self.id);
        }
    }
}

static_assertions::assert_impl_all!(Signal<Vec<u64>>: Send, Sync);
static_assertions::assert_impl_all!(ConnectionGuard<()>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Signal<u32>, Arc<Mutex<Vec<u32>>>) {
        let signal = Signal::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        signal.connect(move |&key| sink.lock().push(key));
        (signal, seen)
    }

    #[test]
    fn test_emit_reaches_slot() {
        let (signal, seen) = recorder();
        assert_eq!(signal.emit(7), 1);
        signal.emit(9);
        assert_eq!(*seen.lock(), vec![7, 9]);
    }

    #[test]
    fn test_disconnected_slot_is_skipped() {
        let (signal, seen) = recorder();
        let extra = signal.connect(|_| panic!("disconnected slot ran"));
        assert!(signal.disconnect(extra));
        assert!(!signal.disconnect(extra));
        signal.emit(3);
        assert_eq!(*seen.lock(), vec![3]);
    }

    #[test]
    fn test_blocked_emit_is_dropped() {
        let (signal, seen) = recorder();
        signal.set_blocked(true);
        assert!(signal.is_blocked());
        assert_eq!(signal.emit(1), 0);
        signal.set_blocked(false);
        signal.emit(2);
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn test_every_slot_runs() {
        let signal = Signal::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        (0..4).for_each(|_| {
            let hits = hits.clone();
            signal.connect(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        });
        assert_eq!(signal.emit(()), 4);
        assert_eq!(hits.load(Ordering::SeqCst), 4);

        signal.disconnect_all();
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_scoped_connection() {
        let signal = Arc::new(Signal::<u32>::new());
        let guard = signal.connect_scoped(|_| {});
        assert_eq!(signal.connection_count(), 1);
        drop(guard);
        assert_eq!(signal.connection_count(), 0);

        // A guard may outlive its signal.
        let guard = signal.connect_scoped(|_| {});
        drop(signal);
        drop(guard);
    }

    #[test]
    fn test_slot_disconnects_during_emit() {
        let signal = Arc::new(Signal::<()>::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&signal);
        let counter = hits.clone();
        signal.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(signal) = weak.upgrade() {
                signal.disconnect_all();
            }
        });

        signal.emit(());
        signal.emit(());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
