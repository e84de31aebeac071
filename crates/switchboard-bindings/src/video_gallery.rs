//! Video gallery view-models.
//!
//! Remote tiles are ordered by the dominant speaker ranking, then by id. A
//! tile carries at most one camera stream and one screen share stream.

use std::{collections::BTreeMap, sync::Arc};

use serde::Serialize;
use switchboard_core::{
    ParticipantId, StreamId,
    state::{
        LocalVideoStreamState, MediaStreamType, ParticipantState, ParticipantStatus, RenderHandle,
        VideoStreamState,
    },
};

use crate::{CallProps, Selector, TileProps, base};

/// A stream as the gallery renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryStream {
    /// Remote stream id. `None` for the local stream.
    pub id: Option<StreamId>,
    /// Media is flowing.
    pub is_available: bool,
    /// Rendered mirrored.
    pub is_mirrored: bool,
    /// Surface, once a view has been created.
    pub render_handle: Option<RenderHandle>,
}

impl GalleryStream {
    fn remote(stream: &VideoStreamState) -> Self {
        Self {
            id: Some(stream.id.clone()),
            is_available: stream.is_available,
            is_mirrored: stream.view.is_some_and(|v| v.is_mirrored),
            render_handle: stream.view.map(|v| v.handle),
        }
    }

    fn local(stream: &LocalVideoStreamState) -> Self {
        Self {
            id: None,
            is_available: true,
            is_mirrored: stream.view.is_some_and(|v| v.is_mirrored),
            render_handle: stream.view.map(|v| v.handle),
        }
    }
}

/// The local user's tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTile {
    /// Flat identifier.
    pub user_id: ParticipantId,
    /// Display name.
    pub display_name: Option<String>,
    /// Microphone muted.
    pub is_muted: bool,
    /// Sharing the screen.
    pub is_screen_sharing_on: bool,
    /// Outgoing camera stream.
    pub video_stream: Option<GalleryStream>,
}

/// A remote participant's tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTile {
    /// Flat identifier.
    pub user_id: ParticipantId,
    /// Display name.
    pub display_name: Option<String>,
    /// Connection state.
    pub state: ParticipantStatus,
    /// Microphone muted.
    pub is_muted: bool,
    /// Currently speaking.
    pub is_speaking: bool,
    /// Camera stream.
    pub video_stream: Option<GalleryStream>,
    /// Screen share stream.
    pub screen_share_stream: Option<GalleryStream>,
}

impl RemoteTile {
    fn new(participant: &ParticipantState) -> Self {
        let stream = |kind: MediaStreamType| {
            participant
                .video_streams
                .values()
                .find(|s| s.media_stream_type == kind)
                .map(|s| GalleryStream::remote(s))
        };
        Self {
            user_id: participant.id(),
            display_name: participant.display_name.clone(),
            state: participant.state,
            is_muted: participant.is_muted,
            is_speaking: participant.is_speaking,
            video_stream: stream(MediaStreamType::Video),
            screen_share_stream: stream(MediaStreamType::ScreenSharing),
        }
    }

    fn is_sharing_screen(&self) -> bool {
        self.screen_share_stream.as_ref().is_some_and(|s| s.is_available)
    }
}

/// The whole gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGallery {
    /// Local tile.
    pub local_participant: LocalTile,
    /// Remote tiles, dominant speakers first.
    pub remote_participants: Vec<RemoteTile>,
    /// Dominant speakers, most dominant first.
    pub dominant_speakers: Vec<ParticipantId>,
    /// First remote participant with an available screen share.
    pub screen_share_participant: Option<RemoteTile>,
}

type GalleryInputs = (
    ParticipantId,
    Option<String>,
    (bool, bool),
    Option<Arc<Vec<LocalVideoStreamState>>>,
    Option<Arc<BTreeMap<ParticipantId, Arc<ParticipantState>>>>,
    Option<Arc<Vec<ParticipantId>>>,
);

/// Selector for [`VideoGallery`].
pub type VideoGallerySelector = Selector<CallProps, GalleryInputs, VideoGallery>;

/// Selector for one [`RemoteTile`]. `None` once the participant has left.
pub type VideoTileSelector =
    Selector<TileProps, (Option<Arc<ParticipantState>>,), Option<RemoteTile>>;

fn ranked<'a>(
    remote: &'a BTreeMap<ParticipantId, Arc<ParticipantState>>,
    dominant: &'a [ParticipantId],
) -> impl Iterator<Item = &'a Arc<ParticipantState>> {
    let leading = dominant.iter().filter_map(|id| remote.get(id));
    let rest = remote.iter().filter(|(id, _)| !dominant.contains(*id)).map(|(_, p)| p);
    leading.chain(rest)
}

/// New [`VideoGallery`] selector.
pub fn video_gallery_selector() -> VideoGallerySelector {
    Selector::new(
        "video_gallery",
        |state, props| {
            (
                base::user_id(state),
                base::display_name(state),
                (base::is_muted(state, props), base::is_screen_sharing_on(state, props)),
                base::local_video_streams(state, props),
                base::remote_participants(state, props),
                base::dominant_speakers(state, props),
            )
        },
        |(user_id, display_name, (is_muted, is_screen_sharing_on), local, remote, dominant)| {
            let dominant: &[ParticipantId] = dominant.as_deref().map_or(&[][..], Vec::as_slice);
            let remote_participants: Vec<RemoteTile> = remote
                .as_deref()
                .map(|remote| ranked(remote, dominant).map(|p| RemoteTile::new(p)).collect())
                .unwrap_or_default();
            let screen_share_participant =
                remote_participants.iter().find(|t| t.is_sharing_screen()).cloned();

            let local_participant = LocalTile {
                user_id: user_id.clone(),
                display_name: display_name.clone(),
                is_muted: *is_muted,
                is_screen_sharing_on: *is_screen_sharing_on,
                video_stream: local.as_deref().and_then(|streams| {
                    streams
                        .iter()
                        .find(|s| s.media_stream_type == MediaStreamType::Video)
                        .map(GalleryStream::local)
                }),
            };

            VideoGallery {
                local_participant,
                remote_participants,
                dominant_speakers: dominant.to_vec(),
                screen_share_participant,
            }
        },
    )
}

/// New [`RemoteTile`] selector. Keep one per participant in a
/// [`crate::MemoTable`].
pub fn video_tile_selector() -> VideoTileSelector {
    Selector::new(
        "video_tile",
        |state, props| {
            let call = state.call(&props.call_id);
            (call.and_then(|c| c.participant(&props.participant_id)).cloned(),)
        },
        |(participant,)| participant.as_deref().map(RemoteTile::new),
    )
}

#[cfg(test)]
mod tests {
    use switchboard_core::{CallId, CommunicationIdentifier, Snapshot, state::CallState};

    use super::*;

    fn gallery_state() -> Snapshot {
        let mut state = Snapshot::new(CommunicationIdentifier::user("me"));
        let mut call = CallState::new(CallId::from("c1"));
        for name in ["ann", "bob", "cat"] {
            let p = ParticipantState::new(CommunicationIdentifier::user(name));
            Arc::make_mut(&mut call.remote_participants).insert(p.id(), Arc::new(p));
        }
        call.dominant_speakers =
            Arc::new(vec![ParticipantId::from("cat"), ParticipantId::from("gone")]);
        Arc::make_mut(&mut state.calls).insert(call.id.clone(), Arc::new(call));
        state
    }

    #[test]
    fn dominant_speakers_lead_the_gallery() {
        let gallery = video_gallery_selector().select(&gallery_state(), &CallProps::new("c1"));
        let order: Vec<&str> =
            gallery.remote_participants.iter().map(|t| t.user_id.as_str()).collect();
        assert_eq!(order, ["cat", "ann", "bob"]);
        assert!(gallery.screen_share_participant.is_none());
        assert!(gallery.local_participant.video_stream.is_none());
    }

    #[test]
    fn tile_ignores_other_participants() {
        let state = gallery_state();
        let props =
            TileProps { call_id: CallId::from("c1"), participant_id: ParticipantId::from("ann") };
        let mut tile = video_tile_selector();
        let first = tile.select(&state, &props);

        let mut next = state.clone();
        let calls = Arc::make_mut(&mut next.calls);
        let call = Arc::make_mut(calls.get_mut(&CallId::from("c1")).expect("call"));
        let remote = Arc::make_mut(&mut call.remote_participants);
        Arc::make_mut(remote.get_mut(&ParticipantId::from("bob")).expect("bob")).is_muted = true;

        let second = tile.select(&next, &props);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(tile.recomputations(), 1);
    }
}
