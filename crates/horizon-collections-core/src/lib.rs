//! Core systems for Horizon Collections.
//!
//! This crate provides the reactive primitives that the collection models
//! are built on:
//!
//! - **Signal/Slot System**: Type-safe change notification
//! - **Property System**: Values with change detection
//! - **Controlled State**: Explicit caller-owned vs. model-owned state
//! - **Logging**: Tracing targets, tree visualization, performance spans
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_collections_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//! value_changed.disconnect(conn_id);
//! ```
//!
//! # Controlled State Example
//!
//! ```
//! use horizon_collections_core::{ControlledState, Ownership};
//!
//! let expanded = ControlledState::with_ownership(vec![1u32], Ownership::Uncontrolled);
//! expanded.request(vec![1, 2]);
//! assert_eq!(expanded.get(), vec![1, 2]);
//! ```

pub mod logging;
pub mod property;
pub mod signal;

pub use logging::{DebugTree, PerfSpan, TreeDebug, TreeFormatOptions, TreeStyle};
pub use property::{ControlledState, Ownership, Property};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
