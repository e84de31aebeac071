//! Fuzz target for the reducers
//!
//! Ensure snapshot invariants under arbitrary event orderings (HIGH priority)
//!
//! # Strategy
//!
//! - Events folded onto a small id space so sequences revisit the same calls,
//!   participants, streams, threads, and messages
//! - Events for entities that do not exist (yet, or anymore)
//! - The local user showing up as a remote participant
//! - Messages, receipts, and typing indicators out of order
//!
//! # Invariants
//!
//! - Standard snapshot invariants hold after every event
//! - An event that changes nothing returns the same snapshot
//! - Reducing never mutates the input snapshot

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use chrono::{DateTime, TimeDelta, Utc};
use libfuzzer_sys::fuzz_target;
use switchboard_core::{
    reduce,
    state::{
        CallEndReason, CallState, CallStatus, ChatParticipant, MediaStreamType, MessageState,
        ParticipantState, ReadReceipt, RenderHandle, ScalingMode, StreamView, ThreadState,
        TypingIndicator, VideoStreamState,
    },
    CommunicationIdentifier, Event, Snapshot,
};
use switchboard_harness::{
    model::{call_id, message_id, participant, stream_id, thread_id, LOCAL_USER},
    InvariantRegistry, SystemSnapshot,
};

#[derive(Debug, Clone, Arbitrary)]
enum EventOp {
    AddCall { call: u8, status: u8 },
    SetStatus { call: u8, status: u8 },
    EndCall { call: u8, removed: bool },
    Mute { call: u8, is_muted: bool },
    AddParticipant { call: u8, participant: u8, with_stream: bool },
    RemoveParticipant { call: u8, participant: u8 },
    MuteParticipant { call: u8, participant: u8, is_muted: bool },
    AddStream { call: u8, participant: u8, stream: u8, screen_share: bool, available: bool },
    RemoveStream { call: u8, participant: u8, stream: u8 },
    SetAvailable { call: u8, participant: u8, stream: u8, available: bool },
    CreateView { call: u8, participant: u8, stream: u8 },
    DisposeView { call: u8, participant: u8, stream: u8 },
    AddThread { thread: u8 },
    RemoveThread { thread: u8 },
    AddMember { thread: u8, participant: u8 },
    RemoveMember { thread: u8, participant: u8 },
    Message { thread: u8, sequence: u8, sender: u8 },
    Edit { thread: u8, sequence: u8 },
    Delete { thread: u8, sequence: u8 },
    Receipt { thread: u8, reader: u8, sequence: u8, at: u8 },
    Typing { thread: u8, sender: u8, at: u8 },
}

const STATUSES: [CallStatus; 10] = [
    CallStatus::None,
    CallStatus::Connecting,
    CallStatus::Ringing,
    CallStatus::EarlyMedia,
    CallStatus::InLobby,
    CallStatus::Connected,
    CallStatus::LocalHold,
    CallStatus::RemoteHold,
    CallStatus::Disconnecting,
    CallStatus::Disconnected,
];

fn status(choice: u8) -> CallStatus {
    STATUSES[usize::from(choice) % STATUSES.len()]
}

fn at(offset: u8) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(i64::from(offset))
}

fn stream(slot: u8, screen_share: bool, available: bool) -> VideoStreamState {
    let media_stream_type =
        if screen_share { MediaStreamType::ScreenSharing } else { MediaStreamType::Video };
    VideoStreamState::new(stream_id(slot), media_stream_type, available)
}

/// Map an operation to an event. Render handles are minted from `next_handle`
/// so each view gets a fresh surface, as a real renderer would.
fn to_event(op: EventOp, next_handle: &mut u64) -> Event {
    match op {
        EventOp::AddCall { call, status: choice } => {
            let mut state = CallState::new(call_id(call));
            state.state = status(choice);
            Event::CallAdded { call: state }
        },
        EventOp::SetStatus { call, status: choice } => {
            Event::CallStateChanged { call_id: call_id(call), state: status(choice) }
        },
        EventOp::EndCall { call, removed } => {
            if removed {
                Event::CallEndReasonChanged {
                    call_id: call_id(call),
                    end_reason: CallEndReason::REMOVED,
                }
            } else {
                Event::CallRemoved { call_id: call_id(call) }
            }
        },
        EventOp::Mute { call, is_muted } => {
            Event::CallMuteChanged { call_id: call_id(call), is_muted }
        },
        EventOp::AddParticipant { call, participant: slot, with_stream } => {
            let mut state = ParticipantState::new(participant(slot));
            if with_stream {
                let seeded = stream(0, false, true);
                state.video_streams = Arc::new([(seeded.id.clone(), Arc::new(seeded))].into());
            }
            Event::ParticipantAdded { call_id: call_id(call), participant: state }
        },
        EventOp::RemoveParticipant { call, participant: slot } => Event::ParticipantRemoved {
            call_id: call_id(call),
            participant_id: participant(slot).to_flat(),
        },
        EventOp::MuteParticipant { call, participant: slot, is_muted } => {
            Event::ParticipantMuteChanged {
                call_id: call_id(call),
                participant_id: participant(slot).to_flat(),
                is_muted,
            }
        },
        EventOp::AddStream { call, participant: slot, stream: s, screen_share, available } => {
            Event::StreamAdded {
                call_id: call_id(call),
                participant_id: participant(slot).to_flat(),
                stream: stream(s, screen_share, available),
            }
        },
        EventOp::RemoveStream { call, participant: slot, stream: s } => Event::StreamRemoved {
            call_id: call_id(call),
            participant_id: participant(slot).to_flat(),
            stream_id: stream_id(s),
        },
        EventOp::SetAvailable { call, participant: slot, stream: s, available } => {
            Event::StreamAvailabilityChanged {
                call_id: call_id(call),
                participant_id: participant(slot).to_flat(),
                stream_id: stream_id(s),
                is_available: available,
            }
        },
        EventOp::CreateView { call, participant: slot, stream: s } => {
            *next_handle += 1;
            Event::RemoteViewCreated {
                call_id: call_id(call),
                participant_id: participant(slot).to_flat(),
                stream_id: stream_id(s),
                view: StreamView {
                    handle: RenderHandle(*next_handle),
                    scaling_mode: ScalingMode::Crop,
                    is_mirrored: false,
                },
            }
        },
        EventOp::DisposeView { call, participant: slot, stream: s } => Event::RemoteViewDisposed {
            call_id: call_id(call),
            participant_id: participant(slot).to_flat(),
            stream_id: stream_id(s),
        },
        EventOp::AddThread { thread } => {
            Event::ThreadAdded { thread: ThreadState::new(thread_id(thread)) }
        },
        EventOp::RemoveThread { thread } => Event::ThreadRemoved { thread_id: thread_id(thread) },
        EventOp::AddMember { thread, participant: slot } => Event::ChatParticipantsAdded {
            thread_id: thread_id(thread),
            participants: vec![ChatParticipant::new(participant(slot), None)],
        },
        EventOp::RemoveMember { thread, participant: slot } => Event::ChatParticipantsRemoved {
            thread_id: thread_id(thread),
            participant_ids: vec![participant(slot).to_flat()],
        },
        EventOp::Message { thread, sequence, sender } => Event::MessageReceived {
            thread_id: thread_id(thread),
            message: MessageState::text(
                message_id(sequence),
                u64::from(sequence),
                participant(sender).to_flat(),
                "fuzz",
                at(sequence),
            ),
        },
        EventOp::Edit { thread, sequence } => Event::MessageEdited {
            thread_id: thread_id(thread),
            message_id: message_id(sequence),
            content: Some("edited".to_owned()),
            edited_on: at(sequence.saturating_add(1)),
        },
        EventOp::Delete { thread, sequence } => Event::MessageDeleted {
            thread_id: thread_id(thread),
            message_id: message_id(sequence),
            deleted_on: at(u8::MAX),
        },
        EventOp::Receipt { thread, reader, sequence, at: offset } => Event::ReadReceiptReceived {
            thread_id: thread_id(thread),
            receipt: ReadReceipt {
                sender: participant(reader).to_flat(),
                message_id: message_id(sequence),
                read_on: at(offset),
            },
        },
        EventOp::Typing { thread, sender, at: offset } => Event::TypingIndicatorReceived {
            thread_id: thread_id(thread),
            indicator: TypingIndicator {
                sender: participant(sender).to_flat(),
                sender_display_name: None,
                received_on: at(offset),
            },
        },
    }
}

fuzz_target!(|ops: Vec<EventOp>| {
    let registry = InvariantRegistry::standard();
    let mut state = Arc::new(Snapshot::new(CommunicationIdentifier::user(LOCAL_USER)));
    let mut next_handle = 0;

    for op in ops {
        let event = to_event(op, &mut next_handle);
        let before = (*state).clone();
        let next = reduce(&state, &event);

        assert_eq!(*state, before, "input snapshot mutated by {event:?}");
        if *next == before {
            assert!(Arc::ptr_eq(&state, &next), "no-op {event:?} allocated a new snapshot");
        }
        if let Err(violations) = registry.check_all(&SystemSnapshot::new(Arc::clone(&next))) {
            panic!("invariant violation after {event:?}: {violations:?}");
        }
        state = next;
    }
});

