//! Fuzz target for event log decoding
//!
//! Harden JSON event log parsing used by replay (MEDIUM priority)
//!
//! # Strategy
//!
//! - Random bytes: arbitrary input parsed as an event array
//! - Decoded logs are reduced from an empty snapshot
//!
//! # Invariants
//!
//! - NEVER panic on malformed JSON
//! - Any log that decodes reduces without panicking
//! - Reduction is deterministic
//! - Ended calls stay bounded

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use switchboard_core::{reduce, state::MAX_ENDED_CALLS, CommunicationIdentifier, Event, Snapshot};

fuzz_target!(|data: &[u8]| {
    let Ok(events) = serde_json::from_slice::<Vec<Event>>(data) else {
        return;
    };

    let initial = Arc::new(Snapshot::new(CommunicationIdentifier::user("me")));
    let run = || events.iter().fold(Arc::clone(&initial), |state, event| reduce(&state, event));

    let state = run();
    assert_eq!(state, run(), "reduction is not deterministic");
    assert!(
        state.calls_ended.len() <= MAX_ENDED_CALLS,
        "ended calls unbounded: {}",
        state.calls_ended.len()
    );
});
