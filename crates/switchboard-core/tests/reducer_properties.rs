//! Property-based tests for the reducers.
//!
//! Random event sequences over a small id universe, so that adds, removes,
//! and updates collide often. Each property is checked after every step.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;
use switchboard_core::{
    CallId, CommunicationIdentifier, Event, ParticipantId, Snapshot, StreamId, reduce,
    state::{
        CallState, MediaStreamType, MessageState, ParticipantState, ThreadState, TypingIndicator,
        VideoStreamState,
    },
};

const LOCAL: &str = "me";

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000)
}

fn call_id() -> impl Strategy<Value = CallId> {
    prop_oneof![Just(CallId::from("c1")), Just(CallId::from("c2"))]
}

fn participant_id() -> impl Strategy<Value = ParticipantId> {
    prop_oneof![
        3 => Just(ParticipantId::from("u1")),
        3 => Just(ParticipantId::from("u2")),
        1 => Just(ParticipantId::from(LOCAL)),
    ]
}

fn stream_id() -> impl Strategy<Value = StreamId> {
    prop_oneof![Just(StreamId::from("s1")), Just(StreamId::from("s2"))]
}

fn media_type() -> impl Strategy<Value = MediaStreamType> {
    prop_oneof![Just(MediaStreamType::Video), Just(MediaStreamType::ScreenSharing)]
}

/// SDK-originated events only; no view events.
fn sdk_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        2 => call_id().prop_map(|call_id| Event::CallAdded { call: CallState::new(call_id) }),
        1 => call_id().prop_map(|call_id| Event::CallRemoved { call_id }),
        1 => (call_id(), any::<bool>())
            .prop_map(|(call_id, is_muted)| Event::CallMuteChanged { call_id, is_muted }),
        3 => (call_id(), participant_id()).prop_map(|(call_id, id)| Event::ParticipantAdded {
            call_id,
            participant: ParticipantState::new(CommunicationIdentifier::user(id.as_str())),
        }),
        2 => (call_id(), participant_id())
            .prop_map(|(call_id, participant_id)| {
                Event::ParticipantRemoved { call_id, participant_id }
            }),
        2 => (call_id(), participant_id(), any::<bool>()).prop_map(
            |(call_id, participant_id, is_muted)| Event::ParticipantMuteChanged {
                call_id,
                participant_id,
                is_muted,
            }
        ),
        3 => (call_id(), participant_id(), stream_id(), media_type(), any::<bool>()).prop_map(
            |(call_id, participant_id, id, kind, available)| Event::StreamAdded {
                call_id,
                participant_id,
                stream: VideoStreamState::new(id, kind, available),
            }
        ),
        2 => (call_id(), participant_id(), stream_id()).prop_map(
            |(call_id, participant_id, stream_id)| Event::StreamRemoved {
                call_id,
                participant_id,
                stream_id,
            }
        ),
        1 => (call_id(), participant_id(), stream_id(), any::<bool>()).prop_map(
            |(call_id, participant_id, stream_id, is_available)| {
                Event::StreamAvailabilityChanged {
                    call_id,
                    participant_id,
                    stream_id,
                    is_available,
                }
            }
        ),
    ]
}

fn chat_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        1 => Just(Event::ThreadAdded { thread: ThreadState::new("t1".into()) }),
        4 => (0u64..20, prop_oneof![Just("u1"), Just("u2")]).prop_map(|(seq, sender)| {
            Event::MessageReceived {
                thread_id: "t1".into(),
                message: MessageState::text(
                    format!("m{seq}").into(),
                    seq,
                    sender.into(),
                    "hi",
                    epoch() + TimeDelta::seconds(seq as i64),
                ),
            }
        }),
        1 => (0u64..20).prop_map(|seq| Event::MessageDeleted {
            thread_id: "t1".into(),
            message_id: format!("m{seq}").into(),
            deleted_on: epoch(),
        }),
        2 => (0i64..30, prop_oneof![Just("u1"), Just("u2")]).prop_map(|(at, sender)| {
            Event::TypingIndicatorReceived {
                thread_id: "t1".into(),
                indicator: TypingIndicator {
                    sender: sender.into(),
                    sender_display_name: None,
                    received_on: epoch() + TimeDelta::seconds(at),
                },
            }
        }),
    ]
}

fn initial() -> Arc<Snapshot> {
    Arc::new(Snapshot::new(CommunicationIdentifier::user(LOCAL)))
}

fn run(events: &[Event]) -> Arc<Snapshot> {
    events.iter().fold(initial(), |state, event| reduce(&state, event))
}

proptest! {
    #[test]
    fn local_user_never_becomes_remote(events in prop::collection::vec(sdk_event(), 0..60)) {
        let local = ParticipantId::from(LOCAL);
        let mut state = initial();
        for event in &events {
            state = reduce(&state, event);
            for call in state.calls.values() {
                prop_assert!(!call.remote_participants.contains_key(&local));
            }
        }
    }

    #[test]
    fn sdk_events_never_create_views(events in prop::collection::vec(sdk_event(), 0..60)) {
        let state = run(&events);
        for call in state.calls.values().chain(state.calls_ended.iter()) {
            prop_assert!(call.views().is_empty());
        }
    }

    #[test]
    fn removal_is_idempotent(
        events in prop::collection::vec(sdk_event(), 0..40),
        call_id in call_id(),
        participant_id in participant_id(),
    ) {
        let state = run(&events);
        let removal = Event::ParticipantRemoved { call_id, participant_id };
        let once = reduce(&state, &removal);
        let twice = reduce(&once, &removal);
        prop_assert!(Arc::ptr_eq(&once, &twice));
    }

    #[test]
    fn add_stream_remove_leaves_no_trace(
        events in prop::collection::vec(sdk_event(), 0..40),
        call_id in call_id(),
    ) {
        let participant = ParticipantId::from("late");
        let state = run(&events);
        let state = reduce(&state, &Event::ParticipantAdded {
            call_id: call_id.clone(),
            participant: ParticipantState::new(CommunicationIdentifier::user("late")),
        });
        let state = reduce(&state, &Event::StreamAdded {
            call_id: call_id.clone(),
            participant_id: participant.clone(),
            stream: VideoStreamState::new("s1".into(), MediaStreamType::Video, true),
        });
        let state = reduce(&state, &Event::ParticipantRemoved {
            call_id: call_id.clone(),
            participant_id: participant.clone(),
        });

        if let Some(call) = state.call(&call_id) {
            prop_assert!(call.participant(&participant).is_none());
        }
    }

    #[test]
    fn participant_mute_shares_siblings(
        events in prop::collection::vec(sdk_event(), 0..40),
        is_muted in any::<bool>(),
    ) {
        let state = run(&events);
        let target = ParticipantId::from("u1");
        let Some(call) = state.calls.values().find(|c| c.participant(&target).is_some()).cloned()
        else {
            return Ok(());
        };

        let next = reduce(&state, &Event::ParticipantMuteChanged {
            call_id: call.id.clone(),
            participant_id: target.clone(),
            is_muted,
        });
        let next_call = &next.calls[&call.id];

        for (id, participant) in call.remote_participants.iter().filter(|(id, _)| **id != target) {
            prop_assert!(Arc::ptr_eq(participant, &next_call.remote_participants[id]));
        }
        prop_assert!(Arc::ptr_eq(
            &call.remote_participants[&target].video_streams,
            &next_call.remote_participants[&target].video_streams,
        ));
        for (id, other) in state.calls.iter().filter(|(id, _)| **id != call.id) {
            prop_assert!(Arc::ptr_eq(other, &next.calls[id]));
        }
        prop_assert!(Arc::ptr_eq(&state.threads, &next.threads));
        prop_assert!(Arc::ptr_eq(&state.device_manager, &next.device_manager));
    }

    #[test]
    fn messages_stay_ordered_and_unique(events in prop::collection::vec(chat_event(), 0..60)) {
        let state = run(&events);
        if let Some(thread) = state.thread(&"t1".into()) {
            let sequence: Vec<u64> = thread.messages.iter().map(|m| m.sequence_id).collect();
            prop_assert!(sequence.windows(2).all(|w| w[0] < w[1]), "{sequence:?}");

            let mut senders: Vec<_> =
                thread.typing_indicators.iter().map(|t| t.sender.clone()).collect();
            senders.sort();
            senders.dedup();
            prop_assert_eq!(senders.len(), thread.typing_indicators.len());
        }
    }

    #[test]
    fn events_survive_json(events in prop::collection::vec(sdk_event(), 0..10)) {
        let json = serde_json::to_string(&events).unwrap();
        let decoded: Vec<Event> = serde_json::from_str(&json).unwrap();
        let from_decoded = run(&decoded);
        let from_events = run(&events);
        prop_assert_eq!(from_decoded.as_ref(), from_events.as_ref());
    }
}
