//! The SDK object-graph contract.
//!
//! The adapter never depends on a concrete SDK. It sees a graph of objects,
//! each an [`EventSource`] with typed property getters, rooted at a call
//! agent, a device manager, or a chat client.
//!
//! Handlers receive an [`Emission`]: either a [`Notification`] or the
//! [`SdkError`] the SDK hit while producing it. Property-change notifications
//! carry no payload; the adapter re-reads the getter. Collection notifications
//! carry the added and removed child objects.

use std::{fmt, rc::Rc};

use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use switchboard_core::{
    CallId, CommunicationIdentifier, MessageId, ParticipantId, StreamId, ThreadId,
    state::{
        AudioDeviceInfo, CallDirection, CallEndReason, CallStatus, ChatParticipant, DeviceAccess,
        MediaStreamType, MessageState, ParticipantStatus, ReadReceipt, ThreadState,
        TypingIndicator, VideoDeviceInfo,
    },
};

use crate::SdkError;

/// Identity of a live SDK object. Stable for the object's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Handle returned by [`EventSource::on`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

/// Event names the adapter listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Call agent: calls added or removed.
    CallsUpdated,
    /// Call or participant: connection state changed.
    StateChanged,
    /// Call or participant: mute changed.
    IsMutedChanged,
    /// Call: local screen share toggled.
    IsScreenSharingOnChanged,
    /// Call: local outgoing streams changed.
    LocalVideoStreamsUpdated,
    /// Call: remote participants added or removed.
    RemoteParticipantsUpdated,
    /// Call: dominant speaker ranking changed.
    DominantSpeakersChanged,
    /// Participant: speaking changed.
    IsSpeakingChanged,
    /// Participant: display name changed.
    DisplayNameChanged,
    /// Participant: video streams added or removed.
    VideoStreamsUpdated,
    /// Remote stream: availability changed.
    IsAvailableChanged,
    /// Device manager: camera list changed.
    VideoDevicesUpdated,
    /// Device manager: microphone or speaker list changed.
    AudioDevicesUpdated,
    /// Device manager: selected microphone changed.
    SelectedMicrophoneChanged,
    /// Device manager: selected speaker changed.
    SelectedSpeakerChanged,
    /// Chat: message received.
    ChatMessageReceived,
    /// Chat: message edited.
    ChatMessageEdited,
    /// Chat: message deleted.
    ChatMessageDeleted,
    /// Chat: typing indicator received.
    TypingIndicatorReceived,
    /// Chat: read receipt received.
    ReadReceiptReceived,
    /// Chat: thread created.
    ChatThreadCreated,
    /// Chat: thread deleted.
    ChatThreadDeleted,
    /// Chat: thread topic changed.
    ChatThreadPropertiesUpdated,
    /// Chat: participants joined a thread.
    ParticipantsAdded,
    /// Chat: participants left a thread.
    ParticipantsRemoved,
}

impl EventKind {
    /// Event kinds a call object emits.
    pub const CALL: [Self; 6] = [
        Self::StateChanged,
        Self::IsMutedChanged,
        Self::IsScreenSharingOnChanged,
        Self::LocalVideoStreamsUpdated,
        Self::RemoteParticipantsUpdated,
        Self::DominantSpeakersChanged,
    ];

    /// Event kinds a remote participant emits.
    pub const PARTICIPANT: [Self; 5] = [
        Self::StateChanged,
        Self::IsMutedChanged,
        Self::IsSpeakingChanged,
        Self::DisplayNameChanged,
        Self::VideoStreamsUpdated,
    ];

    /// Event kinds a device manager emits.
    pub const DEVICE_MANAGER: [Self; 4] = [
        Self::VideoDevicesUpdated,
        Self::AudioDevicesUpdated,
        Self::SelectedMicrophoneChanged,
        Self::SelectedSpeakerChanged,
    ];

    /// Event kinds a chat client emits.
    pub const CHAT: [Self; 10] = [
        Self::ChatMessageReceived,
        Self::ChatMessageEdited,
        Self::ChatMessageDeleted,
        Self::TypingIndicatorReceived,
        Self::ReadReceiptReceived,
        Self::ChatThreadCreated,
        Self::ChatThreadDeleted,
        Self::ChatThreadPropertiesUpdated,
        Self::ParticipantsAdded,
        Self::ParticipantsRemoved,
    ];

    /// SDK event name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallsUpdated => "callsUpdated",
            Self::StateChanged => "stateChanged",
            Self::IsMutedChanged => "isMutedChanged",
            Self::IsScreenSharingOnChanged => "isScreenSharingOnChanged",
            Self::LocalVideoStreamsUpdated => "localVideoStreamsUpdated",
            Self::RemoteParticipantsUpdated => "remoteParticipantsUpdated",
            Self::DominantSpeakersChanged => "dominantSpeakersChanged",
            Self::IsSpeakingChanged => "isSpeakingChanged",
            Self::DisplayNameChanged => "displayNameChanged",
            Self::VideoStreamsUpdated => "videoStreamsUpdated",
            Self::IsAvailableChanged => "isAvailableChanged",
            Self::VideoDevicesUpdated => "videoDevicesUpdated",
            Self::AudioDevicesUpdated => "audioDevicesUpdated",
            Self::SelectedMicrophoneChanged => "selectedMicrophoneChanged",
            Self::SelectedSpeakerChanged => "selectedSpeakerChanged",
            Self::ChatMessageReceived => "chatMessageReceived",
            Self::ChatMessageEdited => "chatMessageEdited",
            Self::ChatMessageDeleted => "chatMessageDeleted",
            Self::TypingIndicatorReceived => "typingIndicatorReceived",
            Self::ReadReceiptReceived => "readReceiptReceived",
            Self::ChatThreadCreated => "chatThreadCreated",
            Self::ChatThreadDeleted => "chatThreadDeleted",
            Self::ChatThreadPropertiesUpdated => "chatThreadPropertiesUpdated",
            Self::ParticipantsAdded => "participantsAdded",
            Self::ParticipantsRemoved => "participantsRemoved",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handler is called with.
pub type Emission = Result<Notification, SdkError>;

/// Callback registered with [`EventSource::on`].
pub type Handler = Rc<dyn Fn(&Emission)>;

/// Payload of an SDK notification.
#[derive(Clone)]
pub enum Notification {
    /// A property changed; read it back from the emitting object.
    Changed,
    /// Calls appeared on or disappeared from the call agent.
    CallsUpdated {
        /// New calls.
        added: Vec<Rc<dyn CallObject>>,
        /// Gone calls.
        removed: Vec<Rc<dyn CallObject>>,
    },
    /// Remote participants joined or left a call.
    RemoteParticipantsUpdated {
        /// Joined.
        added: Vec<Rc<dyn RemoteParticipantObject>>,
        /// Left.
        removed: Vec<Rc<dyn RemoteParticipantObject>>,
    },
    /// A participant's video streams started or stopped.
    VideoStreamsUpdated {
        /// Started.
        added: Vec<Rc<dyn RemoteVideoStreamObject>>,
        /// Stopped.
        removed: Vec<Rc<dyn RemoteVideoStreamObject>>,
    },
    /// Chat notifications carry plain values.
    Chat(ChatNotification),
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changed => f.write_str("Changed"),
            Self::CallsUpdated { added, removed } => f
                .debug_struct("CallsUpdated")
                .field("added", &added.len())
                .field("removed", &removed.len())
                .finish(),
            Self::RemoteParticipantsUpdated { added, removed } => f
                .debug_struct("RemoteParticipantsUpdated")
                .field("added", &added.len())
                .field("removed", &removed.len())
                .finish(),
            Self::VideoStreamsUpdated { added, removed } => f
                .debug_struct("VideoStreamsUpdated")
                .field("added", &added.len())
                .field("removed", &removed.len())
                .finish(),
            Self::Chat(chat) => f.debug_tuple("Chat").field(chat).finish(),
        }
    }
}

/// Chat notification payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatNotification {
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
    /// A thread was created.
    ThreadCreated {
        /// Initial state.
        thread: ThreadState,
    },
    /// A thread was deleted.
    ThreadDeleted {
        /// Thread.
        thread_id: ThreadId,
    },
    /// Thread properties changed.
    ThreadPropertiesUpdated {
        /// Thread.
        thread_id: ThreadId,
        /// New topic.
        topic: Option<String>,
    },
    /// Participants joined.
    ParticipantsAdded {
        /// Thread.
        thread_id: ThreadId,
        /// Joined.
        participants: Vec<ChatParticipant>,
    },
    /// Participants left.
    ParticipantsRemoved {
        /// Thread.
        thread_id: ThreadId,
        /// Left.
        participants: Vec<CommunicationIdentifier>,
    },
}

impl ChatNotification {
    /// Event kind this payload belongs to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageReceived { .. } => EventKind::ChatMessageReceived,
            Self::MessageEdited { .. } => EventKind::ChatMessageEdited,
            Self::MessageDeleted { .. } => EventKind::ChatMessageDeleted,
            Self::TypingIndicatorReceived { .. } => EventKind::TypingIndicatorReceived,
            Self::ReadReceiptReceived { .. } => EventKind::ReadReceiptReceived,
            Self::ThreadCreated { .. } => EventKind::ChatThreadCreated,
            Self::ThreadDeleted { .. } => EventKind::ChatThreadDeleted,
            Self::ThreadPropertiesUpdated { .. } => EventKind::ChatThreadPropertiesUpdated,
            Self::ParticipantsAdded { .. } => EventKind::ParticipantsAdded,
            Self::ParticipantsRemoved { .. } => EventKind::ParticipantsRemoved,
        }
    }
}

/// Anything that emits notifications.
pub trait EventSource {
    /// Identity of this object.
    fn object_id(&self) -> ObjectId;

    /// Register `handler` for `kind`.
    fn on(&self, kind: EventKind, handler: Handler) -> HandlerId;

    /// Unregister a handler. Unknown ids are ignored.
    fn off(&self, kind: EventKind, id: HandlerId);
}

/// Root of the calling graph.
pub trait CallAgentObject: EventSource {
    /// Calls currently known to the agent.
    fn calls(&self) -> Vec<Rc<dyn CallObject>>;

    /// Local display name.
    fn display_name(&self) -> Option<String>;
}

/// A local outgoing stream as the SDK reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVideoStream {
    /// Capture device.
    pub source: VideoDeviceInfo,
    /// Camera or screen share.
    pub media_stream_type: MediaStreamType,
}

/// A call.
pub trait CallObject: EventSource {
    /// Call id.
    fn id(&self) -> CallId;
    /// Connection status.
    fn state(&self) -> CallStatus;
    /// Incoming or outgoing.
    fn direction(&self) -> CallDirection;
    /// Local microphone muted.
    fn is_muted(&self) -> bool;
    /// Local screen share active.
    fn is_screen_sharing_on(&self) -> bool;
    /// Local outgoing streams.
    fn local_video_streams(&self) -> Vec<LocalVideoStream>;
    /// Remote participants. May include the local user.
    fn remote_participants(&self) -> Vec<Rc<dyn RemoteParticipantObject>>;
    /// Dominant speakers, most dominant first.
    fn dominant_speakers(&self) -> Vec<CommunicationIdentifier>;
    /// Why the call ended, once it has.
    fn call_end_reason(&self) -> Option<CallEndReason>;
}

/// A remote participant in a call.
pub trait RemoteParticipantObject: EventSource {
    /// Identifier.
    fn identifier(&self) -> CommunicationIdentifier;
    /// Display name.
    fn display_name(&self) -> Option<String>;
    /// Connection state.
    fn state(&self) -> ParticipantStatus;
    /// Muted.
    fn is_muted(&self) -> bool;
    /// Speaking.
    fn is_speaking(&self) -> bool;
    /// Video streams.
    fn video_streams(&self) -> Vec<Rc<dyn RemoteVideoStreamObject>>;

    /// Flat id used as the snapshot key.
    fn participant_id(&self) -> ParticipantId {
        self.identifier().to_flat()
    }
}

/// A remote participant's video stream.
pub trait RemoteVideoStreamObject: EventSource {
    /// Stream id.
    fn id(&self) -> StreamId;
    /// Camera or screen share.
    fn media_stream_type(&self) -> MediaStreamType;
    /// Media flowing.
    fn is_available(&self) -> bool;
}

/// Result of an async SDK query.
pub type SdkFuture<T> = LocalBoxFuture<'static, Result<T, SdkError>>;

/// Platform device enumeration and selection.
pub trait DeviceManagerObject: EventSource {
    /// Enumerate cameras.
    fn get_cameras(&self) -> SdkFuture<Vec<VideoDeviceInfo>>;
    /// Enumerate microphones.
    fn get_microphones(&self) -> SdkFuture<Vec<AudioDeviceInfo>>;
    /// Enumerate speakers.
    fn get_speakers(&self) -> SdkFuture<Vec<AudioDeviceInfo>>;
    /// Ask the platform for media permissions.
    fn ask_device_permission(&self, audio: bool, video: bool) -> SdkFuture<DeviceAccess>;
    /// Microphone in use.
    fn selected_microphone(&self) -> Option<AudioDeviceInfo>;
    /// Speaker in use.
    fn selected_speaker(&self) -> Option<AudioDeviceInfo>;
    /// Platform allows choosing the speaker.
    fn is_speaker_selection_available(&self) -> bool;
}

/// Chat client.
pub trait ChatClientObject: EventSource {
    /// Threads known at attach time.
    fn threads(&self) -> Vec<ThreadState>;
}

/// An object the adapter can be attached to.
#[derive(Clone)]
pub enum SdkRoot {
    /// Calling.
    CallAgent(Rc<dyn CallAgentObject>),
    /// Devices.
    DeviceManager(Rc<dyn DeviceManagerObject>),
    /// Chat.
    ChatClient(Rc<dyn ChatClientObject>),
}

impl SdkRoot {
    /// Identity of the root object.
    pub fn object_id(&self) -> ObjectId {
        match self {
            Self::CallAgent(agent) => agent.object_id(),
            Self::DeviceManager(manager) => manager.object_id(),
            Self::ChatClient(chat) => chat.object_id(),
        }
    }
}

impl fmt::Debug for SdkRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::CallAgent(_) => "CallAgent",
            Self::DeviceManager(_) => "DeviceManager",
            Self::ChatClient(_) => "ChatClient",
        };
        f.debug_tuple(kind).field(&self.object_id()).finish()
    }
}
