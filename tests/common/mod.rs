//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use colorpipe::observer::{SignalEvent, SignalKind};
use colorpipe::FilterNode;
use std::cell::Cell;
use std::rc::Rc;

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Count `kind` signals delivered on `node`. The observation lives as long
/// as the returned observer handle.
pub fn count_signals(node: &FilterNode, kind: SignalKind) -> (Rc<()>, Rc<Cell<u32>>) {
    let observer = Rc::new(());
    let count = Rc::new(Cell::new(0));
    let seen = count.clone();
    node.signals().add(
        &observer,
        None,
        Rc::new(move |event: &SignalEvent<'_>| {
            if event.kind == kind {
                seen.set(seen.get() + 1);
            }
            true
        }),
    );
    (observer, count)
}
