//! Fuzz target for the adapter against the reference model
//!
//! Drive the fake SDK and the view API with arbitrary operation sequences
//! (HIGH priority)
//!
//! # Strategy
//!
//! - Same operations as the model-based property tests, but unbounded length
//!   and coverage-guided ordering
//! - Every step applied to both the model and the real adapter
//! - Detach everything at the end
//!
//! # Invariants
//!
//! - Operation results match the model
//! - Observable state matches the model after every step
//! - Standard invariants hold after every step
//! - No listener survives detach

#![no_main]

use libfuzzer_sys::fuzz_target;
use switchboard_harness::{ModelWorld, Operation, SimWorld};

fuzz_target!(|ops: Vec<Operation>| {
    let mut model = ModelWorld::new();
    let Ok(mut real) = SimWorld::new() else {
        panic!("attaching fake roots must succeed");
    };

    for op in &ops {
        let expected = model.apply(op);
        let actual = real.apply(op);
        assert_eq!(expected, actual, "result divergence on {op:?}");
        assert_eq!(
            model.observable_state(),
            real.observable_state(),
            "state divergence after {op:?}"
        );
        if let Err(violations) = real.check_invariants() {
            panic!("invariant violation after {op:?}: {violations:?}");
        }
    }

    real.detach_all();
    assert_eq!(real.adapter().listener_count(), 0, "listeners survived detach");
});
