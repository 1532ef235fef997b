//! Integration tests for controlled/uncontrolled state with signals.

use std::sync::Arc;

use horizon_collections_core::{ControlledState, Ownership, Signal};
use parking_lot::Mutex;

#[test]
fn test_controlled_owner_round_trip() {
    // The owner listens for requests and decides to accept every other one.
    let state = Arc::new(ControlledState::controlled(0u32));
    let accepted = Arc::new(Mutex::new(Vec::new()));

    let state_clone = state.clone();
    let accepted_clone = accepted.clone();
    state.changed.connect(move |&requested| {
        if requested % 2 == 0 {
            state_clone.sync(requested);
            accepted_clone.lock().push(requested);
        }
    });

    for value in 1..=4 {
        state.request(value);
    }

    assert_eq!(state.get(), 4);
    assert_eq!(*accepted.lock(), vec![2, 4]);
}

#[test]
fn test_ownership_is_fixed_at_construction() {
    let controlled = ControlledState::with_ownership("a".to_string(), Ownership::Controlled);
    let uncontrolled = ControlledState::with_ownership("a".to_string(), Ownership::Uncontrolled);

    controlled.request("b".to_string());
    uncontrolled.request("b".to_string());

    assert_eq!(controlled.get(), "a");
    assert_eq!(uncontrolled.get(), "b");
}

#[test]
fn test_signal_emits_across_threads() {
    let signal = Arc::new(Signal::<usize>::new());
    let total = Arc::new(Mutex::new(0usize));

    let total_clone = total.clone();
    signal.connect(move |&n| {
        *total_clone.lock() += n;
    });

    let handles: Vec<_> = (1..=4)
        .map(|n| {
            let signal = signal.clone();
            std::thread::spawn(move || {
                signal.emit(n);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*total.lock(), 10);
}
