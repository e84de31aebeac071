//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! store and adapter behave identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelWorld      SimWorld       Compare
//!      (reference)  (fakes+adapter)   Results
//! ```

use proptest::prelude::*;
use switchboard_harness::{
    ModelWorld, Operation, SimWorld,
    model::{CALLS, PARTICIPANTS, STREAMS, THREADS},
};

/// Strategy for generating operations on a small id space.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    let call = 0..CALLS;
    let participant = 0..PARTICIPANTS;
    let stream = 0..STREAMS;
    let thread = 0..THREADS;
    let sequence = 0..24u8;

    prop_oneof![
        // Weight towards operations that build up state
        3 => call.clone().prop_map(|call| Operation::StartCall { call }),
        1 => (call.clone(), any::<bool>())
            .prop_map(|(call, removed)| Operation::EndCall { call, removed }),
        1 => (call.clone(), any::<bool>())
            .prop_map(|(call, is_muted)| Operation::SetMuted { call, is_muted }),
        4 => (call.clone(), participant.clone())
            .prop_map(|(call, participant)| Operation::Join { call, participant }),
        1 => (call.clone(), participant.clone())
            .prop_map(|(call, participant)| Operation::Leave { call, participant }),
        1 => (call.clone(), participant.clone(), any::<bool>()).prop_map(
            |(call, participant, is_muted)| {
                Operation::MuteParticipant { call, participant, is_muted }
            }
        ),
        4 => (call.clone(), participant.clone(), stream.clone(), any::<bool>()).prop_map(
            |(call, participant, stream, screen_share)| Operation::StartVideo {
                call,
                participant,
                stream,
                screen_share,
            }
        ),
        1 => (call.clone(), participant.clone(), stream.clone()).prop_map(
            |(call, participant, stream)| Operation::StopVideo { call, participant, stream }
        ),
        2 => (call.clone(), participant.clone(), stream.clone(), any::<bool>()).prop_map(
            |(call, participant, stream, is_available)| Operation::SetAvailable {
                call,
                participant,
                stream,
                is_available,
            }
        ),
        3 => (call.clone(), participant.clone(), stream.clone()).prop_map(
            |(call, participant, stream)| Operation::Render { call, participant, stream }
        ),
        1 => (call.clone(), participant.clone(), stream.clone()).prop_map(
            |(call, participant, stream)| Operation::Dispose { call, participant, stream }
        ),
        3 => (thread.clone(), sequence.clone(), participant.clone()).prop_map(
            |(thread, sequence, sender)| Operation::ReceiveMessage { thread, sequence, sender }
        ),
        1 => (thread, sequence)
            .prop_map(|(thread, sequence)| Operation::DeleteMessage { thread, sequence }),
        1 => call.prop_map(|call| Operation::SdkFailure { call }),
    ]
}

proptest! {
    /// Verify that operation results and observable state match between the
    /// model and the real implementation after every step.
    #[test]
    fn prop_model_matches_real(ops in prop::collection::vec(operation_strategy(), 0..80)) {
        let mut model = ModelWorld::new();
        let mut real = SimWorld::new().expect("attach");

        for (i, op) in ops.iter().enumerate() {
            let model_result = model.apply(op);
            let real_result = real.apply(op);

            prop_assert_eq!(
                &model_result,
                &real_result,
                "Divergence at operation {}: {:?}",
                i,
                op
            );
            prop_assert_eq!(
                model.observable_state(),
                real.observable_state(),
                "State divergence after operation {}: {:?}",
                i,
                op
            );
            if let Err(violations) = real.check_invariants() {
                prop_assert!(false, "Invariant violation after {:?}: {:?}", op, violations);
            }
        }
    }

    /// Replaying the same sequence yields the same state.
    #[test]
    fn prop_replay_is_deterministic(ops in prop::collection::vec(operation_strategy(), 0..40)) {
        let mut first = SimWorld::new().expect("attach");
        let mut second = SimWorld::new().expect("attach");
        for op in &ops {
            first.apply(op);
            second.apply(op);
        }
        prop_assert_eq!(first.observable_state(), second.observable_state());
    }
}

#[test]
fn random_walks_keep_invariants() {
    for seed in 0..32 {
        let mut model = ModelWorld::new();
        let mut real = SimWorld::new().expect("attach");

        for op in Operation::random_walk(seed, 200) {
            assert_eq!(model.apply(&op), real.apply(&op), "seed {seed}: {op:?}");
            if let Err(violations) = real.check_invariants() {
                panic!("seed {seed}: invariant violation after {op:?}: {violations:?}");
            }
        }
        assert_eq!(model.observable_state(), real.observable_state(), "seed {seed}");
    }
}

#[test]
fn detach_all_releases_every_listener() {
    let mut real = SimWorld::new().expect("attach");
    for op in Operation::random_walk(7, 100) {
        real.apply(&op);
    }

    real.detach_all();
    assert_eq!(real.adapter().listener_count(), 0);
    assert_eq!(real.agent().emitter.handler_count(), 0);
    assert_eq!(real.chat().emitter.handler_count(), 0);
}

#[test]
fn scripted_session_state() {
    let script = [
        Operation::StartCall { call: 0 },
        Operation::Join { call: 0, participant: 1 },
        Operation::Join { call: 0, participant: 0 },
        Operation::StartVideo { call: 0, participant: 1, stream: 0, screen_share: false },
        Operation::StartVideo { call: 0, participant: 1, stream: 1, screen_share: true },
        Operation::Render { call: 0, participant: 1, stream: 1 },
        Operation::SetAvailable { call: 0, participant: 1, stream: 0, is_available: false },
        Operation::MuteParticipant { call: 0, participant: 1, is_muted: true },
        Operation::StartCall { call: 1 },
        Operation::EndCall { call: 1, removed: false },
        Operation::ReceiveMessage { thread: 1, sequence: 5, sender: 2 },
        Operation::ReceiveMessage { thread: 1, sequence: 2, sender: 0 },
        Operation::DeleteMessage { thread: 1, sequence: 5 },
    ];

    let mut real = SimWorld::new().expect("attach");
    for op in &script {
        assert!(real.apply(op).is_ok(), "{op:?}");
    }
    real.check_invariants().expect("invariants");

    insta::assert_json_snapshot!(real.observable_state(), @r#"
    {
      "calls": {
        "call-0": {
          "is_muted": false,
          "participants": {
            "user-1": {
              "is_muted": true,
              "streams": {
                "s0": {
                  "is_available": false,
                  "rendered": false
                },
                "s1": {
                  "is_available": true,
                  "rendered": true
                }
              }
            }
          }
        }
      },
      "threads": {
        "thread-0": [],
        "thread-1": [
          [
            "m2",
            false
          ],
          [
            "m5",
            true
          ]
        ]
      }
    }
    "#);
}
