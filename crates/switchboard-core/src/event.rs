//! Typed state events.
//!
//! An [`Event`] is a plain record of something the SDK (or an explicit view
//! call) reported. Events carry values already read off the SDK objects, so
//! reducers never see a live SDK reference.
//!
//! Events are serializable so that sequences can be logged and replayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    CallId, MessageId, ParticipantId, StreamId, ThreadId,
    state::{
        AudioDeviceInfo, CallEndReason, CallState, CallStatus, ChatParticipant, DeviceAccess,
        LocalVideoStreamState, MediaStreamType, MessageState, ParticipantState,
        ParticipantStatus, ReadReceipt, StreamView, ThreadState, TypingIndicator,
        VideoDeviceInfo, VideoStreamState,
    },
};

/// Events that drive the reducers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    /// Local display name changed.
    LocalDisplayNameChanged {
        /// New name.
        display_name: Option<String>,
    },

    /// A call appeared, seeded from the SDK's current values.
    CallAdded {
        /// Initial state, including participants already present.
        call: CallState,
    },

    /// A call disappeared from the call agent.
    CallRemoved {
        /// Removed call.
        call_id: CallId,
    },

    /// Call connection status changed.
    CallStateChanged {
        /// Call.
        call_id: CallId,
        /// New status.
        state: CallStatus,
    },

    /// End reason became known.
    CallEndReasonChanged {
        /// Call.
        call_id: CallId,
        /// Reason.
        end_reason: CallEndReason,
    },

    /// Local microphone mute changed.
    CallMuteChanged {
        /// Call.
        call_id: CallId,
        /// Muted.
        is_muted: bool,
    },

    /// Local screen share toggled.
    ScreenShareChanged {
        /// Call.
        call_id: CallId,
        /// Sharing.
        is_screen_sharing_on: bool,
    },

    /// The set of local outgoing streams changed. Replaces the set.
    LocalVideoStreamsUpdated {
        /// Call.
        call_id: CallId,
        /// Authoritative set.
        streams: Vec<LocalVideoStreamState>,
    },

    /// Dominant speaker ranking changed. Replaces the ranking.
    DominantSpeakersChanged {
        /// Call.
        call_id: CallId,
        /// Most dominant first.
        speakers: Vec<ParticipantId>,
    },

    /// A remote participant joined.
    ParticipantAdded {
        /// Call.
        call_id: CallId,
        /// Initial state, including streams already present.
        participant: ParticipantState,
    },

    /// A remote participant left.
    ParticipantRemoved {
        /// Call.
        call_id: CallId,
        /// Participant.
        participant_id: ParticipantId,
    },

    /// A remote participant's connection state changed.
    ParticipantStateChanged {
        /// Call.
        call_id: CallId,
        /// Participant.
        participant_id: ParticipantId,
        /// New state.
        state: ParticipantStatus,
    },

    /// A remote participant muted or unmuted.
    ParticipantMuteChanged {
        /// Call.
        call_id: CallId,
        /// Participant.
        participant_id: ParticipantId,
        /// Muted.
        is_muted: bool,
    },

    /// A remote participant started or stopped speaking.
    ParticipantSpeakingChanged {
        /// Call.
        call_id: CallId,
        /// Participant.
        participant_id: ParticipantId,
        /// Speaking.
        is_speaking: bool,
    },

    /// A remote participant's display name changed.
    ParticipantDisplayNameChanged {
        /// Call.
        call_id: CallId,
        /// Participant.
        participant_id: ParticipantId,
        /// New name.
        display_name: Option<String>,
    },

    /// A remote video stream appeared.
    StreamAdded {
        /// Call.
        call_id: CallId,
        /// Owner.
        participant_id: ParticipantId,
        /// Initial stream state.
        stream: VideoStreamState,
    },

    /// A remote video stream stopped.
    StreamRemoved {
        /// Call.
        call_id: CallId,
        /// Owner.
        participant_id: ParticipantId,
        /// Stream.
        stream_id: StreamId,
    },

    /// A remote video stream's availability changed.
    StreamAvailabilityChanged {
        /// Call.
        call_id: CallId,
        /// Owner.
        participant_id: ParticipantId,
        /// Stream.
        stream_id: StreamId,
        /// Media flowing.
        is_available: bool,
    },

    /// A view was created for a remote stream.
    RemoteViewCreated {
        /// Call.
        call_id: CallId,
        /// Owner.
        participant_id: ParticipantId,
        /// Stream.
        stream_id: StreamId,
        /// The view.
        view: StreamView,
    },

    /// A remote stream's view was disposed.
    RemoteViewDisposed {
        /// Call.
        call_id: CallId,
        /// Owner.
        participant_id: ParticipantId,
        /// Stream.
        stream_id: StreamId,
    },

    /// A view was created for a local stream in a call.
    LocalViewCreated {
        /// Call.
        call_id: CallId,
        /// Which local stream.
        media_stream_type: MediaStreamType,
        /// The view.
        view: StreamView,
    },

    /// A local stream's view was disposed.
    LocalViewDisposed {
        /// Call.
        call_id: CallId,
        /// Which local stream.
        media_stream_type: MediaStreamType,
    },

    /// A camera preview was created outside any call.
    PreviewViewCreated {
        /// Camera.
        source: VideoDeviceInfo,
        /// The view.
        view: StreamView,
    },

    /// A camera preview was disposed.
    PreviewViewDisposed {
        /// Camera id.
        camera_id: String,
    },

    /// Camera enumeration finished. Replaces the list.
    CamerasUpdated {
        /// Authoritative list.
        cameras: Vec<VideoDeviceInfo>,
    },

    /// Microphone enumeration finished. Replaces the list.
    MicrophonesUpdated {
        /// Authoritative list.
        microphones: Vec<AudioDeviceInfo>,
    },

    /// Speaker enumeration finished. Replaces the list.
    SpeakersUpdated {
        /// Authoritative list.
        speakers: Vec<AudioDeviceInfo>,
    },

    /// Selected camera changed.
    SelectedCameraChanged {
        /// New selection.
        camera: Option<VideoDeviceInfo>,
    },

    /// Selected microphone changed.
    SelectedMicrophoneChanged {
        /// New selection.
        microphone: Option<AudioDeviceInfo>,
    },

    /// Selected speaker changed.
    SelectedSpeakerChanged {
        /// New selection.
        speaker: Option<AudioDeviceInfo>,
    },

    /// Speaker selection support changed.
    SpeakerSelectionAvailabilityChanged {
        /// Supported.
        available: bool,
    },

    /// Media permissions changed.
    DeviceAccessChanged {
        /// Granted permissions.
        access: DeviceAccess,
    },

    /// A chat thread appeared.
    ThreadAdded {
        /// Initial state.
        thread: ThreadState,
    },

    /// A chat thread was deleted.
    ThreadRemoved {
        /// Thread.
        thread_id: ThreadId,
    },

    /// Thread topic changed.
    TopicUpdated {
        /// Thread.
        thread_id: ThreadId,
        /// New topic.
        topic: Option<String>,
    },

    /// Participants joined a thread.
    ChatParticipantsAdded {
        /// Thread.
        thread_id: ThreadId,
        /// Joined.
        participants: Vec<ChatParticipant>,
    },

    /// Participants left a thread.
    ChatParticipantsRemoved {
        /// Thread.
        thread_id: ThreadId,
        /// Left.
        participant_ids: Vec<ParticipantId>,
    },

    /// A message arrived.
    MessageReceived {
        /// Thread.
        thread_id: ThreadId,
        /// Message.
        message: MessageState,
    },

    /// A message was edited.
    MessageEdited {
        /// Thread.
        thread_id: ThreadId,
        /// Message.
        message_id: MessageId,
        /// New body.
        content: Option<String>,
        /// Edit time.
        edited_on: DateTime<Utc>,
    },

    /// A message was deleted.
    MessageDeleted {
        /// Thread.
        thread_id: ThreadId,
        /// Message.
        message_id: MessageId,
        /// Deletion time.
        deleted_on: DateTime<Utc>,
    },

    /// Someone is typing.
    TypingIndicatorReceived {
        /// Thread.
        thread_id: ThreadId,
        /// Indicator.
        indicator: TypingIndicator,
    },

    /// Someone read a message.
    ReadReceiptReceived {
        /// Thread.
        thread_id: ThreadId,
        /// Receipt.
        receipt: ReadReceipt,
    },
}

impl Event {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LocalDisplayNameChanged { .. } => "localDisplayNameChanged",
            Self::CallAdded { .. } => "callAdded",
            Self::CallRemoved { .. } => "callRemoved",
            Self::CallStateChanged { .. } => "callStateChanged",
            Self::CallEndReasonChanged { .. } => "callEndReasonChanged",
            Self::CallMuteChanged { .. } => "callMuteChanged",
            Self::ScreenShareChanged { .. } => "screenShareChanged",
            Self::LocalVideoStreamsUpdated { .. } => "localVideoStreamsUpdated",
            Self::DominantSpeakersChanged { .. } => "dominantSpeakersChanged",
            Self::ParticipantAdded { .. } => "participantAdded",
            Self::ParticipantRemoved { .. } => "participantRemoved",
            Self::ParticipantStateChanged { .. } => "participantStateChanged",
            Self::ParticipantMuteChanged { .. } => "participantMuteChanged",
            Self::ParticipantSpeakingChanged { .. } => "participantSpeakingChanged",
            Self::ParticipantDisplayNameChanged { .. } => "participantDisplayNameChanged",
            Self::StreamAdded { .. } => "streamAdded",
            Self::StreamRemoved { .. } => "streamRemoved",
            Self::StreamAvailabilityChanged { .. } => "streamAvailabilityChanged",
            Self::RemoteViewCreated { .. } => "remoteViewCreated",
            Self::RemoteViewDisposed { .. } => "remoteViewDisposed",
            Self::LocalViewCreated { .. } => "localViewCreated",
            Self::LocalViewDisposed { .. } => "localViewDisposed",
            Self::PreviewViewCreated { .. } => "previewViewCreated",
            Self::PreviewViewDisposed { .. } => "previewViewDisposed",
            Self::CamerasUpdated { .. } => "camerasUpdated",
            Self::MicrophonesUpdated { .. } => "microphonesUpdated",
            Self::SpeakersUpdated { .. } => "speakersUpdated",
            Self::SelectedCameraChanged { .. } => "selectedCameraChanged",
            Self::SelectedMicrophoneChanged { .. } => "selectedMicrophoneChanged",
            Self::SelectedSpeakerChanged { .. } => "selectedSpeakerChanged",
            Self::SpeakerSelectionAvailabilityChanged { .. } => {
                "speakerSelectionAvailabilityChanged"
            },
            Self::DeviceAccessChanged { .. } => "deviceAccessChanged",
            Self::ThreadAdded { .. } => "threadAdded",
            Self::ThreadRemoved { .. } => "threadRemoved",
            Self::TopicUpdated { .. } => "topicUpdated",
            Self::ChatParticipantsAdded { .. } => "chatParticipantsAdded",
            Self::ChatParticipantsRemoved { .. } => "chatParticipantsRemoved",
            Self::MessageReceived { .. } => "messageReceived",
            Self::MessageEdited { .. } => "messageEdited",
            Self::MessageDeleted { .. } => "messageDeleted",
            Self::TypingIndicatorReceived { .. } => "typingIndicatorReceived",
            Self::ReadReceiptReceived { .. } => "readReceiptReceived",
        }
    }
}
