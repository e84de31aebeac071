//! Call, participant, and stream reducers.

use std::sync::Arc;

use super::{replace_root, update_call, update_participant};
use crate::{
    CallId, ParticipantId, StreamId,
    state::{
        CallState, LocalVideoStreamState, MAX_ENDED_CALLS, MediaStreamType, ParticipantState,
        Snapshot, StreamView, VideoStreamState,
    },
};

/// Participant with every stream's view cleared.
fn without_views(participant: &ParticipantState) -> ParticipantState {
    let video_streams = participant
        .video_streams
        .values()
        .map(|stream| {
            (stream.id.clone(), Arc::new(VideoStreamState { view: None, ..(**stream).clone() }))
        })
        .collect();
    ParticipantState { video_streams: Arc::new(video_streams), ..participant.clone() }
}

/// Call with no views anywhere and without the local user among participants.
///
/// Seed payloads are untrusted on both counts; ended calls must not keep
/// handles the renderer has already released.
fn detached(call: &CallState, local: &ParticipantId) -> CallState {
    let local_video_streams = call
        .local_video_streams
        .iter()
        .map(|stream| LocalVideoStreamState { view: None, ..stream.clone() })
        .collect();
    let remote_participants = call
        .remote_participants
        .values()
        .filter(|p| p.id() != *local)
        .map(|p| (p.id(), Arc::new(without_views(p))))
        .collect();
    CallState {
        local_video_streams: Arc::new(local_video_streams),
        remote_participants: Arc::new(remote_participants),
        ..call.clone()
    }
}

pub(super) fn call_added(state: &Arc<Snapshot>, call: &CallState) -> Arc<Snapshot> {
    if state.calls.contains_key(&call.id) {
        return Arc::clone(state);
    }
    let call = detached(call, &state.local_participant_id());
    replace_root(state, |s| {
        Arc::make_mut(&mut s.calls).insert(call.id.clone(), Arc::new(call));
    })
}

/// Move a call into the ended-call history.
pub(super) fn call_removed(state: &Arc<Snapshot>, call_id: &CallId) -> Arc<Snapshot> {
    let Some(call) = state.calls.get(call_id) else {
        return Arc::clone(state);
    };
    let ended = Arc::new(detached(call, &state.local_participant_id()));
    replace_root(state, |s| {
        Arc::make_mut(&mut s.calls).remove(call_id);

        let history = Arc::make_mut(&mut s.calls_ended);
        history.retain(|c| &c.id != call_id);
        history.push(ended);
        if history.len() > MAX_ENDED_CALLS {
            let excess = history.len() - MAX_ENDED_CALLS;
            history.drain(..excess);
        }
    })
}

/// Replace the local stream set, keeping views of streams that survive.
pub(super) fn local_video_streams_updated(
    state: &Arc<Snapshot>,
    call_id: &CallId,
    streams: &[LocalVideoStreamState],
) -> Arc<Snapshot> {
    update_call(state, call_id, |call| {
        let next: Vec<LocalVideoStreamState> = streams
            .iter()
            .map(|stream| {
                let view = call
                    .local_video_streams
                    .iter()
                    .find(|existing| {
                        existing.source.id == stream.source.id
                            && existing.media_stream_type == stream.media_stream_type
                    })
                    .and_then(|existing| existing.view);
                LocalVideoStreamState { view, ..stream.clone() }
            })
            .collect();

        (next != *call.local_video_streams)
            .then(|| CallState { local_video_streams: Arc::new(next), ..call.clone() })
    })
}

pub(super) fn set_local_view(
    state: &Arc<Snapshot>,
    call_id: &CallId,
    media_stream_type: MediaStreamType,
    view: Option<StreamView>,
) -> Arc<Snapshot> {
    update_call(state, call_id, |call| {
        let index =
            call.local_video_streams.iter().position(|s| s.media_stream_type == media_stream_type)?;
        if call.local_video_streams[index].view == view {
            return None;
        }
        let mut call = call.clone();
        Arc::make_mut(&mut call.local_video_streams)[index].view = view;
        Some(call)
    })
}

pub(super) fn participant_added(
    state: &Arc<Snapshot>,
    call_id: &CallId,
    participant: &ParticipantState,
) -> Arc<Snapshot> {
    let id = participant.id();
    if id == state.local_participant_id() {
        return Arc::clone(state);
    }
    update_call(state, call_id, |call| {
        if call.remote_participants.contains_key(&id) {
            return None;
        }
        let mut call = call.clone();
        Arc::make_mut(&mut call.remote_participants)
            .insert(id, Arc::new(without_views(participant)));
        Some(call)
    })
}

pub(super) fn participant_removed(
    state: &Arc<Snapshot>,
    call_id: &CallId,
    participant_id: &ParticipantId,
) -> Arc<Snapshot> {
    update_call(state, call_id, |call| {
        if !call.remote_participants.contains_key(participant_id) {
            return None;
        }
        let mut call = call.clone();
        Arc::make_mut(&mut call.remote_participants).remove(participant_id);
        Some(call)
    })
}

pub(super) fn stream_added(
    state: &Arc<Snapshot>,
    call_id: &CallId,
    participant_id: &ParticipantId,
    stream: &VideoStreamState,
) -> Arc<Snapshot> {
    update_participant(state, call_id, participant_id, |participant| {
        if participant.video_streams.contains_key(&stream.id) {
            return None;
        }
        let mut participant = participant.clone();
        Arc::make_mut(&mut participant.video_streams)
            .insert(stream.id.clone(), Arc::new(VideoStreamState { view: None, ..stream.clone() }));
        Some(participant)
    })
}

pub(super) fn stream_removed(
    state: &Arc<Snapshot>,
    call_id: &CallId,
    participant_id: &ParticipantId,
    stream_id: &StreamId,
) -> Arc<Snapshot> {
    update_participant(state, call_id, participant_id, |participant| {
        if !participant.video_streams.contains_key(stream_id) {
            return None;
        }
        let mut participant = participant.clone();
        Arc::make_mut(&mut participant.video_streams).remove(stream_id);
        Some(participant)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CommunicationIdentifier, Event,
        reducer::reduce,
        state::{RenderHandle, ScalingMode, VideoDeviceInfo},
    };

    fn view(handle: u64) -> StreamView {
        StreamView {
            handle: RenderHandle(handle),
            scaling_mode: ScalingMode::Crop,
            is_mirrored: false,
        }
    }

    fn base() -> Arc<Snapshot> {
        Arc::new(Snapshot::new(CommunicationIdentifier::user("me")))
    }

    #[test]
    fn seeded_call_drops_local_user_and_views() {
        let mut seeded = CallState::new("c1".into());
        let mut me = ParticipantState::new(CommunicationIdentifier::user("me"));
        me.is_muted = true;
        let mut bob = ParticipantState::new(CommunicationIdentifier::user("bob"));
        let mut stream = VideoStreamState::new("s1".into(), MediaStreamType::Video, true);
        stream.view = Some(view(7));
        Arc::make_mut(&mut bob.video_streams).insert("s1".into(), Arc::new(stream));
        let remotes = Arc::make_mut(&mut seeded.remote_participants);
        remotes.insert("me".into(), Arc::new(me));
        remotes.insert("bob".into(), Arc::new(bob));

        let state = reduce(&base(), &Event::CallAdded { call: seeded });
        let call = &state.calls[&CallId::from("c1")];
        assert_eq!(call.remote_participants.len(), 1);
        let bob = &call.remote_participants[&ParticipantId::from("bob")];
        assert_eq!(bob.video_streams[&StreamId::from("s1")].view, None);
    }

    #[test]
    fn duplicate_call_added_is_ignored() {
        let state = reduce(&base(), &Event::CallAdded { call: CallState::new("c1".into()) });
        let mut again = CallState::new("c1".into());
        again.is_muted = true;
        let after = reduce(&state, &Event::CallAdded { call: again });
        assert!(Arc::ptr_eq(&state, &after));
    }

    #[test]
    fn removed_call_moves_to_bounded_history() {
        let mut state = base();
        for i in 0..(MAX_ENDED_CALLS + 3) {
            let id = CallId::new(format!("c{i}"));
            state = reduce(&state, &Event::CallAdded { call: CallState::new(id.clone()) });
            state = reduce(&state, &Event::CallRemoved { call_id: id });
        }
        assert!(state.calls.is_empty());
        assert_eq!(state.calls_ended.len(), MAX_ENDED_CALLS);
        assert_eq!(state.calls_ended[0].id, CallId::from("c3"));
        assert_eq!(
            state.calls_ended[MAX_ENDED_CALLS - 1].id,
            CallId::new(format!("c{}", MAX_ENDED_CALLS + 2))
        );

        let again = reduce(&state, &Event::CallRemoved { call_id: "c3".into() });
        assert!(Arc::ptr_eq(&state, &again));
    }

    #[test]
    fn local_stream_replacement_keeps_surviving_views() {
        let camera = VideoDeviceInfo::camera("cam0", "Front");
        let stream = LocalVideoStreamState {
            source: camera.clone(),
            media_stream_type: MediaStreamType::Video,
            view: None,
        };
        let state = reduce(&base(), &Event::CallAdded { call: CallState::new("c1".into()) });
        let state = reduce(&state, &Event::LocalVideoStreamsUpdated {
            call_id: "c1".into(),
            streams: vec![stream.clone()],
        });
        let state = reduce(&state, &Event::LocalViewCreated {
            call_id: "c1".into(),
            media_stream_type: MediaStreamType::Video,
            view: view(3),
        });

        // Same stream re-announced: nothing changes.
        let same = reduce(&state, &Event::LocalVideoStreamsUpdated {
            call_id: "c1".into(),
            streams: vec![stream],
        });
        assert!(Arc::ptr_eq(&state, &same));

        let cleared = reduce(&state, &Event::LocalVideoStreamsUpdated {
            call_id: "c1".into(),
            streams: Vec::new(),
        });
        assert!(cleared.calls[&CallId::from("c1")].local_video_streams.is_empty());
    }

    #[test]
    fn local_user_is_never_added_as_remote() {
        let state = reduce(&base(), &Event::CallAdded { call: CallState::new("c1".into()) });
        let after = reduce(&state, &Event::ParticipantAdded {
            call_id: "c1".into(),
            participant: ParticipantState::new(CommunicationIdentifier::user("me")),
        });
        assert!(Arc::ptr_eq(&state, &after));
    }

    #[test]
    fn stream_added_never_carries_a_view() {
        let state = reduce(&base(), &Event::CallAdded { call: CallState::new("c1".into()) });
        let state = reduce(&state, &Event::ParticipantAdded {
            call_id: "c1".into(),
            participant: ParticipantState::new(CommunicationIdentifier::user("bob")),
        });
        let mut stream = VideoStreamState::new("s1".into(), MediaStreamType::ScreenSharing, true);
        stream.view = Some(view(9));
        let state = reduce(&state, &Event::StreamAdded {
            call_id: "c1".into(),
            participant_id: "bob".into(),
            stream,
        });
        let call = &state.calls[&CallId::from("c1")];
        let bob = &call.remote_participants[&ParticipantId::from("bob")];
        let stored = &bob.video_streams[&StreamId::from("s1")];
        assert_eq!(stored.view, None);
        assert!(stored.is_available);
    }
}
