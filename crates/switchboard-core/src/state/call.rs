//! Call, participant, and video stream records.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use super::device::VideoDeviceInfo;
use crate::{CallId, CommunicationIdentifier, ParticipantId, StreamId};

/// Connection status of a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallStatus {
    /// No connection attempt yet.
    #[default]
    None,
    /// Outgoing call being set up.
    Connecting,
    /// Remote side is ringing.
    Ringing,
    /// Early media is flowing before the call is answered.
    EarlyMedia,
    /// Waiting in a meeting lobby.
    InLobby,
    /// Connected.
    Connected,
    /// Put on hold locally.
    LocalHold,
    /// Put on hold by the remote side.
    RemoteHold,
    /// Hanging up.
    Disconnecting,
    /// Ended.
    Disconnected,
}

/// Direction of a call relative to the local user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallDirection {
    /// Placed by the local user.
    #[default]
    Outgoing,
    /// Received by the local user.
    Incoming,
}

/// Why a call ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallEndReason {
    /// Primary code.
    pub code: u32,
    /// Secondary code.
    pub subcode: u32,
}

impl CallEndReason {
    /// Code/subcode pair reported when another participant removed us.
    pub const REMOVED: Self = Self { code: 0, subcode: 5300 };
    /// A Teams meeting refused to admit the local user.
    pub const ACCESS_DENIED: Self = Self { code: 403, subcode: 5854 };
    /// The join attempt failed because the device had no network.
    pub const NO_NETWORK: Self = Self { code: 410, subcode: 3112 };

    /// Subcodes meaning someone else ended our participation.
    const REMOVED_SUBCODES: [u32; 2] = [5000, 5300];

    /// The local user was removed from the call by someone else.
    pub fn is_removed_by_others(&self) -> bool {
        Self::REMOVED_SUBCODES.contains(&self.subcode)
    }

    /// Coarse classification used to pick what to show after a call.
    pub fn kind(&self) -> CallEndKind {
        if self.subcode == Self::ACCESS_DENIED.subcode {
            CallEndKind::AccessDenied
        } else if self.is_removed_by_others() {
            CallEndKind::Removed
        } else if *self == Self::NO_NETWORK {
            CallEndKind::NoNetwork
        } else {
            CallEndKind::Left
        }
    }
}

/// Outcome families of [`CallEndReason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallEndKind {
    /// Hung up or otherwise ended normally.
    Left,
    /// Removed by another participant.
    Removed,
    /// Denied entry to a Teams meeting.
    AccessDenied,
    /// Could not join for lack of network.
    NoNetwork,
}

/// Connection state of a remote participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantStatus {
    /// Known but not yet dialed.
    #[default]
    Idle,
    /// Joining.
    Connecting,
    /// Being rung.
    Ringing,
    /// Connected.
    Connected,
    /// On hold.
    Hold,
    /// Waiting in the lobby.
    InLobby,
    /// Early media before answer.
    EarlyMedia,
    /// Left.
    Disconnected,
}

/// Kind of media carried by a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaStreamType {
    /// Camera video.
    Video,
    /// Shared screen.
    ScreenSharing,
}

/// How a rendered stream fills its surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalingMode {
    /// Stretch to fill, ignoring aspect ratio.
    Stretch,
    /// Crop to fill, keeping aspect ratio.
    #[default]
    Crop,
    /// Letterbox, keeping aspect ratio.
    Fit,
}

/// Opaque reference to a video surface owned by the UI layer.
///
/// The core stores it and hands it back; it never creates or destroys one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderHandle(pub u64);

/// A rendered view attached to a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamView {
    /// Surface handle.
    pub handle: RenderHandle,
    /// Scaling applied by the renderer.
    pub scaling_mode: ScalingMode,
    /// Horizontally mirrored.
    pub is_mirrored: bool,
}

/// A remote participant's video stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStreamState {
    /// Stream id.
    pub id: StreamId,
    /// Camera or screen share.
    pub media_stream_type: MediaStreamType,
    /// Media is currently flowing.
    pub is_available: bool,
    /// Attached view. Set only by an explicit create-view call.
    pub view: Option<StreamView>,
}

impl VideoStreamState {
    /// Stream without a view.
    pub fn new(id: StreamId, media_stream_type: MediaStreamType, is_available: bool) -> Self {
        Self { id, media_stream_type, is_available, view: None }
    }
}

/// A local outgoing video stream (camera or screen share), or a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalVideoStreamState {
    /// Capture device.
    pub source: VideoDeviceInfo,
    /// Camera or screen share.
    pub media_stream_type: MediaStreamType,
    /// Attached view. Set only by an explicit create-view call.
    pub view: Option<StreamView>,
}

/// A remote participant in a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantState {
    /// SDK identifier.
    pub identifier: CommunicationIdentifier,
    /// Display name if known.
    pub display_name: Option<String>,
    /// Connection state.
    pub state: ParticipantStatus,
    /// Microphone muted.
    pub is_muted: bool,
    /// Currently speaking.
    pub is_speaking: bool,
    /// Video streams by id.
    pub video_streams: Arc<BTreeMap<StreamId, Arc<VideoStreamState>>>,
}

impl ParticipantState {
    /// Connected participant with no streams.
    pub fn new(identifier: CommunicationIdentifier) -> Self {
        Self {
            identifier,
            display_name: None,
            state: ParticipantStatus::Connected,
            is_muted: false,
            is_speaking: false,
            video_streams: Arc::default(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Flat id used as the map key.
    pub fn id(&self) -> ParticipantId {
        self.identifier.to_flat()
    }

    /// Stream by id.
    pub fn stream(&self, id: &StreamId) -> Option<&Arc<VideoStreamState>> {
        self.video_streams.get(id)
    }
}

/// A call the local user is in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallState {
    /// Call id.
    pub id: CallId,
    /// Connection status.
    pub state: CallStatus,
    /// Incoming or outgoing.
    pub direction: CallDirection,
    /// Local microphone muted.
    pub is_muted: bool,
    /// Local screen share active.
    pub is_screen_sharing_on: bool,
    /// Local outgoing streams.
    pub local_video_streams: Arc<Vec<LocalVideoStreamState>>,
    /// Remote participants by flat id. Never contains the local user.
    pub remote_participants: Arc<BTreeMap<ParticipantId, Arc<ParticipantState>>>,
    /// Dominant speakers, most dominant first.
    pub dominant_speakers: Arc<Vec<ParticipantId>>,
    /// Set once the call has ended.
    pub end_reason: Option<CallEndReason>,
}

impl CallState {
    /// Empty call with the given id.
    pub fn new(id: CallId) -> Self {
        Self {
            id,
            state: CallStatus::None,
            direction: CallDirection::Outgoing,
            is_muted: false,
            is_screen_sharing_on: false,
            local_video_streams: Arc::default(),
            remote_participants: Arc::default(),
            dominant_speakers: Arc::default(),
            end_reason: None,
        }
    }

    /// Remote participant by flat id.
    pub fn participant(&self, id: &ParticipantId) -> Option<&Arc<ParticipantState>> {
        self.remote_participants.get(id)
    }

    /// Local stream of the given type.
    pub fn local_stream(
        &self,
        media_stream_type: MediaStreamType,
    ) -> Option<&LocalVideoStreamState> {
        self.local_video_streams.iter().find(|s| s.media_stream_type == media_stream_type)
    }

    /// Every view attached anywhere in this call.
    pub fn views(&self) -> Vec<AttachedView> {
        let mut views: Vec<AttachedView> = self
            .local_video_streams
            .iter()
            .filter_map(|stream| {
                stream.view.map(|view| AttachedView::Local { source: stream.source.clone(), view })
            })
            .collect();

        for (participant_id, participant) in self.remote_participants.iter() {
            views.extend(participant.video_streams.values().filter_map(|stream| {
                stream.view.map(|view| AttachedView::Remote {
                    participant_id: participant_id.clone(),
                    stream_id: stream.id.clone(),
                    view,
                })
            }));
        }
        views
    }
}

/// A view found while walking a call, used to release it before removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachedView {
    /// View on a local stream.
    Local {
        /// Capture device of the stream.
        source: VideoDeviceInfo,
        /// The view.
        view: StreamView,
    },
    /// View on a remote participant's stream.
    Remote {
        /// Owner of the stream.
        participant_id: ParticipantId,
        /// Stream id.
        stream_id: StreamId,
        /// The view.
        view: StreamView,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_reasons_classify_by_code() {
        assert_eq!(CallEndReason::default().kind(), CallEndKind::Left);
        assert_eq!(CallEndReason::REMOVED.kind(), CallEndKind::Removed);
        assert_eq!(CallEndReason { code: 0, subcode: 5000 }.kind(), CallEndKind::Removed);
        assert_eq!(CallEndReason::ACCESS_DENIED.kind(), CallEndKind::AccessDenied);
        assert_eq!(CallEndReason::NO_NETWORK.kind(), CallEndKind::NoNetwork);
        assert_eq!(CallEndReason { code: 410, subcode: 1 }.kind(), CallEndKind::Left);
    }
}
