//! Pure reducers from (snapshot, event) to the next snapshot.
//!
//! Every reducer is copy-on-write. The path from the root to the changed
//! node is rebuilt; every sibling along the way is the same [`Arc`] as in the
//! previous snapshot. An event that changes nothing (unknown entity, value
//! already current, duplicate add) returns the input [`Arc`] itself, which
//! the store treats as "no commit".
//!
//! Collection-style events (device lists, local streams, dominant speakers)
//! replace the collection wholesale. Scalar events patch one field.

mod call;
mod chat;
mod device;

use std::sync::Arc;

use crate::{
    CallId, Event, ParticipantId, StreamId, ThreadId,
    state::{
        CallState, DeviceManagerState, ParticipantState, Snapshot, ThreadState, VideoStreamState,
    },
};

/// Apply `event` to `state`.
///
/// Returns `state` itself (pointer-equal) when the event has no effect.
pub fn reduce(state: &Arc<Snapshot>, event: &Event) -> Arc<Snapshot> {
    match event {
        Event::LocalDisplayNameChanged { display_name } => {
            if state.display_name == *display_name {
                return Arc::clone(state);
            }
            replace_root(state, |s| s.display_name.clone_from(display_name))
        },

        Event::CallAdded { call } => call::call_added(state, call),
        Event::CallRemoved { call_id } => call::call_removed(state, call_id),
        Event::CallStateChanged { call_id, state: status } => {
            update_call(state, call_id, |c| patch(c, &c.state, status, |c| c.state = *status))
        },
        Event::CallEndReasonChanged { call_id, end_reason } => {
            let next = Some(*end_reason);
            update_call(state, call_id, |c| patch(c, &c.end_reason, &next, |c| c.end_reason = next))
        },
        Event::CallMuteChanged { call_id, is_muted } => {
            update_call(state, call_id, |c| {
                patch(c, &c.is_muted, is_muted, |c| c.is_muted = *is_muted)
            })
        },
        Event::ScreenShareChanged { call_id, is_screen_sharing_on } => {
            update_call(state, call_id, |c| {
                patch(c, &c.is_screen_sharing_on, is_screen_sharing_on, |c| {
                    c.is_screen_sharing_on = *is_screen_sharing_on;
                })
            })
        },
        Event::LocalVideoStreamsUpdated { call_id, streams } => {
            call::local_video_streams_updated(state, call_id, streams)
        },
        Event::DominantSpeakersChanged { call_id, speakers } => update_call(state, call_id, |c| {
            (c.dominant_speakers.as_slice() != speakers.as_slice()).then(|| CallState {
                dominant_speakers: Arc::new(speakers.clone()),
                ..c.clone()
            })
        }),

        Event::ParticipantAdded { call_id, participant } => {
            call::participant_added(state, call_id, participant)
        },
        Event::ParticipantRemoved { call_id, participant_id } => {
            call::participant_removed(state, call_id, participant_id)
        },
        Event::ParticipantStateChanged { call_id, participant_id, state: status } => {
            update_participant(state, call_id, participant_id, |p| {
                patch(p, &p.state, status, |p| p.state = *status)
            })
        },
        Event::ParticipantMuteChanged { call_id, participant_id, is_muted } => {
            update_participant(state, call_id, participant_id, |p| {
                patch(p, &p.is_muted, is_muted, |p| p.is_muted = *is_muted)
            })
        },
        Event::ParticipantSpeakingChanged { call_id, participant_id, is_speaking } => {
            update_participant(state, call_id, participant_id, |p| {
                patch(p, &p.is_speaking, is_speaking, |p| p.is_speaking = *is_speaking)
            })
        },
        Event::ParticipantDisplayNameChanged { call_id, participant_id, display_name } => {
            update_participant(state, call_id, participant_id, |p| {
                patch(p, &p.display_name, display_name, |p| p.display_name.clone_from(display_name))
            })
        },

        Event::StreamAdded { call_id, participant_id, stream } => {
            call::stream_added(state, call_id, participant_id, stream)
        },
        Event::StreamRemoved { call_id, participant_id, stream_id } => {
            call::stream_removed(state, call_id, participant_id, stream_id)
        },
        Event::StreamAvailabilityChanged { call_id, participant_id, stream_id, is_available } => {
            update_stream(state, call_id, participant_id, stream_id, |s| {
                patch(s, &s.is_available, is_available, |s| s.is_available = *is_available)
            })
        },
        Event::RemoteViewCreated { call_id, participant_id, stream_id, view } => {
            let next = Some(*view);
            update_stream(state, call_id, participant_id, stream_id, |s| {
                patch(s, &s.view, &next, |s| s.view = next)
            })
        },
        Event::RemoteViewDisposed { call_id, participant_id, stream_id } => {
            update_stream(state, call_id, participant_id, stream_id, |s| {
                patch(s, &s.view, &None, |s| s.view = None)
            })
        },
        Event::LocalViewCreated { call_id, media_stream_type, view } => {
            call::set_local_view(state, call_id, *media_stream_type, Some(*view))
        },
        Event::LocalViewDisposed { call_id, media_stream_type } => {
            call::set_local_view(state, call_id, *media_stream_type, None)
        },

        Event::PreviewViewCreated { source, view } => device::preview_created(state, source, *view),
        Event::PreviewViewDisposed { camera_id } => device::preview_disposed(state, camera_id),
        Event::CamerasUpdated { cameras } => device::cameras_updated(state, cameras),
        Event::MicrophonesUpdated { microphones } => {
            device::microphones_updated(state, microphones)
        },
        Event::SpeakersUpdated { speakers } => device::speakers_updated(state, speakers),
        Event::SelectedCameraChanged { camera } => update_devices(state, |d| {
            patch(d, &d.selected_camera, camera, |d| d.selected_camera.clone_from(camera))
        }),
        Event::SelectedMicrophoneChanged { microphone } => update_devices(state, |d| {
            patch(d, &d.selected_microphone, microphone, |d| {
                d.selected_microphone.clone_from(microphone);
            })
        }),
        Event::SelectedSpeakerChanged { speaker } => update_devices(state, |d| {
            patch(d, &d.selected_speaker, speaker, |d| d.selected_speaker.clone_from(speaker))
        }),
        Event::SpeakerSelectionAvailabilityChanged { available } => update_devices(state, |d| {
            patch(d, &d.is_speaker_selection_available, available, |d| {
                d.is_speaker_selection_available = *available;
            })
        }),
        Event::DeviceAccessChanged { access } => {
            let next = Some(*access);
            update_devices(state, |d| patch(d, &d.device_access, &next, |d| d.device_access = next))
        },

        Event::ThreadAdded { thread } => chat::thread_added(state, thread),
        Event::ThreadRemoved { thread_id } => chat::thread_removed(state, thread_id),
        Event::TopicUpdated { thread_id, topic } => update_thread(state, thread_id, |t| {
            patch(t, &t.topic, topic, |t| t.topic.clone_from(topic))
        }),
        Event::ChatParticipantsAdded { thread_id, participants } => {
            chat::participants_added(state, thread_id, participants)
        },
        Event::ChatParticipantsRemoved { thread_id, participant_ids } => {
            chat::participants_removed(state, thread_id, participant_ids)
        },
        Event::MessageReceived { thread_id, message } => {
            chat::message_received(state, thread_id, message)
        },
        Event::MessageEdited { thread_id, message_id, content, edited_on } => {
            chat::message_edited(state, thread_id, message_id, content.as_deref(), *edited_on)
        },
        Event::MessageDeleted { thread_id, message_id, deleted_on } => {
            chat::message_deleted(state, thread_id, message_id, *deleted_on)
        },
        Event::TypingIndicatorReceived { thread_id, indicator } => {
            chat::typing_indicator_received(state, thread_id, indicator)
        },
        Event::ReadReceiptReceived { thread_id, receipt } => {
            chat::read_receipt_received(state, thread_id, receipt)
        },
    }
}

/// Copy of `entity` with `apply` run on it, or `None` if `current == next`.
fn patch<T: Clone, V: PartialEq + ?Sized>(
    entity: &T,
    current: &V,
    next: &V,
    apply: impl FnOnce(&mut T),
) -> Option<T> {
    if current == next {
        return None;
    }
    let mut copy = entity.clone();
    apply(&mut copy);
    Some(copy)
}

/// New root: a shallow copy of `state` (every branch shared) with `f` applied.
fn replace_root(state: &Arc<Snapshot>, f: impl FnOnce(&mut Snapshot)) -> Arc<Snapshot> {
    let mut next = Snapshot::clone(state);
    f(&mut next);
    Arc::new(next)
}

/// Replace one call. No-op if the call is absent or `f` returns `None`.
fn update_call(
    state: &Arc<Snapshot>,
    call_id: &CallId,
    f: impl FnOnce(&CallState) -> Option<CallState>,
) -> Arc<Snapshot> {
    let Some(next) = state.calls.get(call_id).and_then(|call| f(call)) else {
        return Arc::clone(state);
    };
    replace_root(state, |s| {
        Arc::make_mut(&mut s.calls).insert(call_id.clone(), Arc::new(next));
    })
}

/// Replace one remote participant. No-op if absent or `f` returns `None`.
fn update_participant(
    state: &Arc<Snapshot>,
    call_id: &CallId,
    participant_id: &ParticipantId,
    f: impl FnOnce(&ParticipantState) -> Option<ParticipantState>,
) -> Arc<Snapshot> {
    update_call(state, call_id, |call| {
        let next = call.remote_participants.get(participant_id).and_then(|p| f(p))?;
        let mut call = call.clone();
        Arc::make_mut(&mut call.remote_participants).insert(participant_id.clone(), Arc::new(next));
        Some(call)
    })
}

/// Replace one remote stream. No-op if absent or `f` returns `None`.
fn update_stream(
    state: &Arc<Snapshot>,
    call_id: &CallId,
    participant_id: &ParticipantId,
    stream_id: &StreamId,
    f: impl FnOnce(&VideoStreamState) -> Option<VideoStreamState>,
) -> Arc<Snapshot> {
    update_participant(state, call_id, participant_id, |participant| {
        let next = participant.video_streams.get(stream_id).and_then(|s| f(s))?;
        let mut participant = participant.clone();
        Arc::make_mut(&mut participant.video_streams).insert(stream_id.clone(), Arc::new(next));
        Some(participant)
    })
}

/// Replace the device manager. No-op if `f` returns `None`.
fn update_devices(
    state: &Arc<Snapshot>,
    f: impl FnOnce(&DeviceManagerState) -> Option<DeviceManagerState>,
) -> Arc<Snapshot> {
    let Some(next) = f(&state.device_manager) else {
        return Arc::clone(state);
    };
    replace_root(state, |s| s.device_manager = Arc::new(next))
}

/// Replace one thread. No-op if the thread is absent or `f` returns `None`.
fn update_thread(
    state: &Arc<Snapshot>,
    thread_id: &ThreadId,
    f: impl FnOnce(&ThreadState) -> Option<ThreadState>,
) -> Arc<Snapshot> {
    let Some(next) = state.threads.get(thread_id).and_then(|thread| f(thread)) else {
        return Arc::clone(state);
    };
    replace_root(state, |s| {
        Arc::make_mut(&mut s.threads).insert(thread_id.clone(), Arc::new(next));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CommunicationIdentifier,
        state::{MediaStreamType, RenderHandle, ScalingMode, StreamView},
    };

    fn snapshot_with_two_participants() -> Arc<Snapshot> {
        let state = Arc::new(Snapshot::new(CommunicationIdentifier::user("me")));
        let state = reduce(&state, &Event::CallAdded { call: CallState::new("c1".into()) });
        let state = reduce(&state, &Event::ParticipantAdded {
            call_id: "c1".into(),
            participant: ParticipantState::new(CommunicationIdentifier::user("u1")),
        });
        reduce(&state, &Event::ParticipantAdded {
            call_id: "c1".into(),
            participant: ParticipantState::new(CommunicationIdentifier::user("u2")),
        })
    }

    #[test]
    fn scalar_patch_shares_siblings() {
        let before = snapshot_with_two_participants();
        let after = reduce(&before, &Event::ParticipantMuteChanged {
            call_id: "c1".into(),
            participant_id: "u1".into(),
            is_muted: true,
        });

        let old_call = &before.calls[&CallId::from("c1")];
        let new_call = &after.calls[&CallId::from("c1")];
        assert!(!Arc::ptr_eq(old_call, new_call));
        assert!(Arc::ptr_eq(
            &old_call.remote_participants[&ParticipantId::from("u2")],
            &new_call.remote_participants[&ParticipantId::from("u2")],
        ));
        assert!(Arc::ptr_eq(&before.device_manager, &after.device_manager));
        assert!(Arc::ptr_eq(&before.threads, &after.threads));
    }

    #[test]
    fn unchanged_value_returns_same_snapshot() {
        let before = snapshot_with_two_participants();
        let after = reduce(&before, &Event::ParticipantMuteChanged {
            call_id: "c1".into(),
            participant_id: "u1".into(),
            is_muted: false,
        });
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn events_for_unknown_entities_are_no_ops() {
        let before = snapshot_with_two_participants();
        let events = [
            Event::CallMuteChanged { call_id: "nope".into(), is_muted: true },
            Event::ParticipantRemoved { call_id: "c1".into(), participant_id: "ghost".into() },
            Event::StreamRemoved {
                call_id: "c1".into(),
                participant_id: "u1".into(),
                stream_id: "s9".into(),
            },
            Event::RemoteViewCreated {
                call_id: "c1".into(),
                participant_id: "u1".into(),
                stream_id: "s9".into(),
                view: StreamView {
                    handle: RenderHandle(1),
                    scaling_mode: ScalingMode::Crop,
                    is_mirrored: false,
                },
            },
            Event::LocalViewDisposed {
                call_id: "c1".into(),
                media_stream_type: MediaStreamType::Video,
            },
            Event::TopicUpdated { thread_id: "t1".into(), topic: Some("x".into()) },
        ];
        for event in &events {
            let after = reduce(&before, event);
            assert!(Arc::ptr_eq(&before, &after), "{} was not a no-op", event.name());
        }
    }

    #[test]
    fn display_name_change_is_root_only() {
        let before = snapshot_with_two_participants();
        let after = reduce(&before, &Event::LocalDisplayNameChanged {
            display_name: Some("Me".into()),
        });
        assert_eq!(after.display_name.as_deref(), Some("Me"));
        assert!(Arc::ptr_eq(&before.calls, &after.calls));
    }
}
