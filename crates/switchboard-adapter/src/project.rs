//! Read SDK objects into plain snapshot records.
//!
//! Every getter is read once, at event-handling time. Nothing returned here
//! refers back to the SDK object.

use std::{collections::BTreeMap, sync::Arc};

use switchboard_core::{
    ParticipantId,
    state::{CallState, LocalVideoStreamState, ParticipantState, VideoStreamState},
};

use crate::sdk::{CallObject, RemoteParticipantObject, RemoteVideoStreamObject};

pub(crate) fn stream(stream: &dyn RemoteVideoStreamObject) -> VideoStreamState {
    VideoStreamState::new(stream.id(), stream.media_stream_type(), stream.is_available())
}

pub(crate) fn participant(participant: &dyn RemoteParticipantObject) -> ParticipantState {
    let video_streams: BTreeMap<_, _> = participant
        .video_streams()
        .iter()
        .map(|s| (s.id(), Arc::new(stream(s.as_ref()))))
        .collect();
    ParticipantState {
        identifier: participant.identifier(),
        display_name: participant.display_name(),
        state: participant.state(),
        is_muted: participant.is_muted(),
        is_speaking: participant.is_speaking(),
        video_streams: Arc::new(video_streams),
    }
}

pub(crate) fn local_streams(call: &dyn CallObject) -> Vec<LocalVideoStreamState> {
    call.local_video_streams()
        .into_iter()
        .map(|s| LocalVideoStreamState {
            source: s.source,
            media_stream_type: s.media_stream_type,
            view: None,
        })
        .collect()
}

pub(crate) fn dominant_speakers(call: &dyn CallObject) -> Vec<ParticipantId> {
    call.dominant_speakers().iter().map(ParticipantId::from).collect()
}

/// Full call record. The local user is left out of the participants.
pub(crate) fn call(call: &dyn CallObject, local: &ParticipantId) -> CallState {
    let remote_participants: BTreeMap<_, _> = call
        .remote_participants()
        .iter()
        .filter(|p| p.participant_id() != *local)
        .map(|p| (p.participant_id(), Arc::new(participant(p.as_ref()))))
        .collect();
    CallState {
        id: call.id(),
        state: call.state(),
        direction: call.direction(),
        is_muted: call.is_muted(),
        is_screen_sharing_on: call.is_screen_sharing_on(),
        local_video_streams: Arc::new(local_streams(call)),
        remote_participants: Arc::new(remote_participants),
        dominant_speakers: Arc::new(dominant_speakers(call)),
        end_reason: call.call_end_reason(),
    }
}
