//! In-memory SDK object graph.
//!
//! Every fake keeps its properties in cells and emits synchronously from the
//! mutating call, as the SDK does. Handlers are cloned out of the table
//! before they run, so a handler may register or unregister others.
//!
//! Device queries resolve immediately unless held with
//! [`FakeDeviceManager::hold_queries`]; a held query resolves when released,
//! in whatever order the test chooses.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet},
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use switchboard_adapter::{
    SdkError, ViewOptions, ViewRenderer, ViewTarget,
    sdk::{
        CallAgentObject, CallObject, ChatClientObject, ChatNotification, DeviceManagerObject,
        Emission, EventKind, EventSource, Handler, HandlerId, LocalVideoStream, Notification,
        ObjectId, RemoteParticipantObject, RemoteVideoStreamObject, SdkFuture,
    },
};
use switchboard_core::{
    CallId, CommunicationIdentifier, ParticipantId, StreamId,
    state::{
        AudioDeviceInfo, CallDirection, CallEndReason, CallStatus, DeviceAccess, MediaStreamType,
        ParticipantStatus, RenderHandle, ThreadState, VideoDeviceInfo,
    },
};
use tokio::sync::oneshot;

static NEXT_OBJECT: AtomicU64 = AtomicU64::new(1);

/// Handler table behind every fake.
pub struct Emitter {
    object: ObjectId,
    handlers: RefCell<BTreeMap<HandlerId, (EventKind, Handler)>>,
    next_handler: Cell<u64>,
}

impl Default for Emitter {
    fn default() -> Self {
        Self {
            object: ObjectId(NEXT_OBJECT.fetch_add(1, Ordering::Relaxed)),
            handlers: RefCell::default(),
            next_handler: Cell::new(1),
        }
    }
}

impl Emitter {
    fn on(&self, kind: EventKind, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_handler.get());
        self.next_handler.set(id.0 + 1);
        self.handlers.borrow_mut().insert(id, (kind, handler));
        id
    }

    fn off(&self, kind: EventKind, id: HandlerId) {
        let mut handlers = self.handlers.borrow_mut();
        if handlers.get(&id).is_some_and(|(k, _)| *k == kind) {
            handlers.remove(&id);
        }
    }

    /// Deliver `emission` to every handler registered for `kind`.
    pub fn emit(&self, kind: EventKind, emission: &Emission) {
        let targets: Vec<Handler> = self
            .handlers
            .borrow()
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in targets {
            handler(emission);
        }
    }

    /// Emit a property-change notification.
    pub fn changed(&self, kind: EventKind) {
        self.emit(kind, &Ok(Notification::Changed));
    }

    /// Emit an SDK failure instead of a notification.
    pub fn fail(&self, kind: EventKind, message: &str) {
        self.emit(kind, &Err(SdkError::Internal(message.to_owned())));
    }

    /// Handlers currently registered.
    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("object", &self.object)
            .field("handlers", &self.handler_count())
            .finish()
    }
}

macro_rules! event_source {
    ($($ty:ty),+ $(,)?) => {$(
        impl EventSource for $ty {
            fn object_id(&self) -> ObjectId {
                self.emitter.object
            }

            fn on(&self, kind: EventKind, handler: Handler) -> HandlerId {
                self.emitter.on(kind, handler)
            }

            fn off(&self, kind: EventKind, id: HandlerId) {
                self.emitter.off(kind, id);
            }
        }
    )+};
}

event_source!(
    FakeCallAgent,
    FakeCall,
    FakeParticipant,
    FakeStream,
    FakeDeviceManager,
    FakeChatClient,
);

/// A remote video stream.
#[derive(Debug)]
pub struct FakeStream {
    /// Handler table.
    pub emitter: Emitter,
    id: StreamId,
    media_stream_type: MediaStreamType,
    is_available: Cell<bool>,
}

impl FakeStream {
    /// Stream `id` of `media_stream_type`.
    pub fn new(
        id: impl Into<StreamId>,
        media_stream_type: MediaStreamType,
        is_available: bool,
    ) -> Rc<Self> {
        Rc::new(Self {
            emitter: Emitter::default(),
            id: id.into(),
            media_stream_type,
            is_available: Cell::new(is_available),
        })
    }

    /// Camera stream, available.
    pub fn camera(id: impl Into<StreamId>) -> Rc<Self> {
        Self::new(id, MediaStreamType::Video, true)
    }

    /// Change availability and notify.
    pub fn set_available(&self, is_available: bool) {
        self.is_available.set(is_available);
        self.emitter.changed(EventKind::IsAvailableChanged);
    }
}

impl RemoteVideoStreamObject for FakeStream {
    fn id(&self) -> StreamId {
        self.id.clone()
    }

    fn media_stream_type(&self) -> MediaStreamType {
        self.media_stream_type
    }

    fn is_available(&self) -> bool {
        self.is_available.get()
    }
}

/// A remote participant.
#[derive(Debug)]
pub struct FakeParticipant {
    /// Handler table.
    pub emitter: Emitter,
    identifier: CommunicationIdentifier,
    display_name: RefCell<Option<String>>,
    state: Cell<ParticipantStatus>,
    is_muted: Cell<bool>,
    is_speaking: Cell<bool>,
    streams: RefCell<Vec<Rc<FakeStream>>>,
}

impl FakeParticipant {
    /// Connected participant with no streams.
    pub fn new(identifier: CommunicationIdentifier) -> Rc<Self> {
        Rc::new(Self {
            emitter: Emitter::default(),
            identifier,
            display_name: RefCell::new(None),
            state: Cell::new(ParticipantStatus::Connected),
            is_muted: Cell::new(false),
            is_speaking: Cell::new(false),
            streams: RefCell::new(Vec::new()),
        })
    }

    /// Participant for a plain user id.
    pub fn user(id: &str) -> Rc<Self> {
        Self::new(CommunicationIdentifier::user(id))
    }

    /// Add a stream without notifying.
    pub fn seed_stream(&self, stream: Rc<FakeStream>) {
        self.streams.borrow_mut().push(stream);
    }

    /// Start a stream and notify.
    pub fn add_stream(&self, stream: Rc<FakeStream>) {
        self.streams.borrow_mut().push(Rc::clone(&stream));
        self.emitter.emit(
            EventKind::VideoStreamsUpdated,
            &Ok(Notification::VideoStreamsUpdated {
                added: vec![stream as Rc<dyn RemoteVideoStreamObject>],
                removed: Vec::new(),
            }),
        );
    }

    /// Stop a stream and notify. `None` if there is no such stream.
    pub fn remove_stream(&self, id: &StreamId) -> Option<Rc<FakeStream>> {
        let stream = {
            let mut streams = self.streams.borrow_mut();
            let index = streams.iter().position(|s| &s.id == id)?;
            streams.remove(index)
        };
        let removed = Rc::clone(&stream) as Rc<dyn RemoteVideoStreamObject>;
        self.emitter.emit(
            EventKind::VideoStreamsUpdated,
            &Ok(Notification::VideoStreamsUpdated { added: Vec::new(), removed: vec![removed] }),
        );
        Some(stream)
    }

    /// Stream by id.
    pub fn stream(&self, id: &StreamId) -> Option<Rc<FakeStream>> {
        self.streams.borrow().iter().find(|s| &s.id == id).cloned()
    }

    /// Change mute and notify.
    pub fn set_muted(&self, is_muted: bool) {
        self.is_muted.set(is_muted);
        self.emitter.changed(EventKind::IsMutedChanged);
    }

    /// Change speaking and notify.
    pub fn set_speaking(&self, is_speaking: bool) {
        self.is_speaking.set(is_speaking);
        self.emitter.changed(EventKind::IsSpeakingChanged);
    }

    /// Change connection state and notify.
    pub fn set_state(&self, state: ParticipantStatus) {
        self.state.set(state);
        self.emitter.changed(EventKind::StateChanged);
    }

    /// Change display name and notify.
    pub fn set_display_name(&self, display_name: Option<&str>) {
        *self.display_name.borrow_mut() = display_name.map(str::to_owned);
        self.emitter.changed(EventKind::DisplayNameChanged);
    }
}

impl RemoteParticipantObject for FakeParticipant {
    fn identifier(&self) -> CommunicationIdentifier {
        self.identifier.clone()
    }

    fn display_name(&self) -> Option<String> {
        self.display_name.borrow().clone()
    }

    fn state(&self) -> ParticipantStatus {
        self.state.get()
    }

    fn is_muted(&self) -> bool {
        self.is_muted.get()
    }

    fn is_speaking(&self) -> bool {
        self.is_speaking.get()
    }

    fn video_streams(&self) -> Vec<Rc<dyn RemoteVideoStreamObject>> {
        self.streams
            .borrow()
            .iter()
            .map(|s| Rc::clone(s) as Rc<dyn RemoteVideoStreamObject>)
            .collect()
    }
}

/// A call.
#[derive(Debug)]
pub struct FakeCall {
    /// Handler table.
    pub emitter: Emitter,
    id: CallId,
    state: Cell<CallStatus>,
    direction: CallDirection,
    is_muted: Cell<bool>,
    is_screen_sharing_on: Cell<bool>,
    local_streams: RefCell<Vec<LocalVideoStream>>,
    participants: RefCell<Vec<Rc<FakeParticipant>>>,
    dominant_speakers: RefCell<Vec<CommunicationIdentifier>>,
    end_reason: Cell<Option<CallEndReason>>,
}

impl FakeCall {
    /// Outgoing call in `state`.
    pub fn new(id: impl Into<CallId>, state: CallStatus) -> Rc<Self> {
        Rc::new(Self {
            emitter: Emitter::default(),
            id: id.into(),
            state: Cell::new(state),
            direction: CallDirection::Outgoing,
            is_muted: Cell::new(false),
            is_screen_sharing_on: Cell::new(false),
            local_streams: RefCell::new(Vec::new()),
            participants: RefCell::new(Vec::new()),
            dominant_speakers: RefCell::new(Vec::new()),
            end_reason: Cell::new(None),
        })
    }

    /// Change state and notify.
    pub fn set_state(&self, state: CallStatus) {
        self.state.set(state);
        self.emitter.changed(EventKind::StateChanged);
    }

    /// Disconnect with `reason` and notify.
    pub fn end(&self, reason: CallEndReason) {
        self.end_reason.set(Some(reason));
        self.set_state(CallStatus::Disconnected);
    }

    /// Change local mute and notify.
    pub fn set_muted(&self, is_muted: bool) {
        self.is_muted.set(is_muted);
        self.emitter.changed(EventKind::IsMutedChanged);
    }

    /// Toggle local screen share and notify.
    pub fn set_screen_sharing(&self, is_screen_sharing_on: bool) {
        self.is_screen_sharing_on.set(is_screen_sharing_on);
        self.emitter.changed(EventKind::IsScreenSharingOnChanged);
    }

    /// Replace outgoing streams and notify.
    pub fn set_local_streams(&self, streams: Vec<LocalVideoStream>) {
        *self.local_streams.borrow_mut() = streams;
        self.emitter.changed(EventKind::LocalVideoStreamsUpdated);
    }

    /// Replace the dominant speaker ranking and notify.
    pub fn set_dominant_speakers(&self, speakers: Vec<CommunicationIdentifier>) {
        *self.dominant_speakers.borrow_mut() = speakers;
        self.emitter.changed(EventKind::DominantSpeakersChanged);
    }

    /// Add a participant without notifying.
    pub fn seed_participant(&self, participant: Rc<FakeParticipant>) {
        self.participants.borrow_mut().push(participant);
    }

    /// Add a participant and notify.
    pub fn add_participant(&self, participant: Rc<FakeParticipant>) {
        self.participants.borrow_mut().push(Rc::clone(&participant));
        self.emitter.emit(
            EventKind::RemoteParticipantsUpdated,
            &Ok(Notification::RemoteParticipantsUpdated {
                added: vec![participant as Rc<dyn RemoteParticipantObject>],
                removed: Vec::new(),
            }),
        );
    }

    /// Remove a participant and notify. `None` if there is no such participant.
    pub fn remove_participant(&self, id: &ParticipantId) -> Option<Rc<FakeParticipant>> {
        let participant = {
            let mut participants = self.participants.borrow_mut();
            let index = participants.iter().position(|p| &p.participant_id() == id)?;
            participants.remove(index)
        };
        let removed = Rc::clone(&participant) as Rc<dyn RemoteParticipantObject>;
        self.emitter.emit(
            EventKind::RemoteParticipantsUpdated,
            &Ok(Notification::RemoteParticipantsUpdated {
                added: Vec::new(),
                removed: vec![removed],
            }),
        );
        Some(participant)
    }

    /// Participant by flat id.
    pub fn participant(&self, id: &ParticipantId) -> Option<Rc<FakeParticipant>> {
        self.participants.borrow().iter().find(|p| &p.participant_id() == id).cloned()
    }
}

impl CallObject for FakeCall {
    fn id(&self) -> CallId {
        self.id.clone()
    }

    fn state(&self) -> CallStatus {
        self.state.get()
    }

    fn direction(&self) -> CallDirection {
        self.direction
    }

    fn is_muted(&self) -> bool {
        self.is_muted.get()
    }

    fn is_screen_sharing_on(&self) -> bool {
        self.is_screen_sharing_on.get()
    }

    fn local_video_streams(&self) -> Vec<LocalVideoStream> {
        self.local_streams.borrow().clone()
    }

    fn remote_participants(&self) -> Vec<Rc<dyn RemoteParticipantObject>> {
        self.participants
            .borrow()
            .iter()
            .map(|p| Rc::clone(p) as Rc<dyn RemoteParticipantObject>)
            .collect()
    }

    fn dominant_speakers(&self) -> Vec<CommunicationIdentifier> {
        self.dominant_speakers.borrow().clone()
    }

    fn call_end_reason(&self) -> Option<CallEndReason> {
        self.end_reason.get()
    }
}

/// Root of the calling graph.
#[derive(Debug)]
pub struct FakeCallAgent {
    /// Handler table.
    pub emitter: Emitter,
    display_name: Option<String>,
    calls: RefCell<Vec<Rc<FakeCall>>>,
}

impl FakeCallAgent {
    /// Agent with no calls.
    pub fn new(display_name: Option<&str>) -> Rc<Self> {
        Rc::new(Self {
            emitter: Emitter::default(),
            display_name: display_name.map(str::to_owned),
            calls: RefCell::new(Vec::new()),
        })
    }

    /// Add a call without notifying.
    pub fn seed_call(&self, call: Rc<FakeCall>) {
        self.calls.borrow_mut().push(call);
    }

    /// Add a call and notify.
    pub fn add_call(&self, call: Rc<FakeCall>) {
        self.calls.borrow_mut().push(Rc::clone(&call));
        self.emitter.emit(
            EventKind::CallsUpdated,
            &Ok(Notification::CallsUpdated {
                added: vec![call as Rc<dyn CallObject>],
                removed: Vec::new(),
            }),
        );
    }

    /// Remove a call and notify. `None` if there is no such call.
    pub fn remove_call(&self, id: &CallId) -> Option<Rc<FakeCall>> {
        let call = {
            let mut calls = self.calls.borrow_mut();
            let index = calls.iter().position(|c| &c.id == id)?;
            calls.remove(index)
        };
        let removed = Rc::clone(&call) as Rc<dyn CallObject>;
        self.emitter.emit(
            EventKind::CallsUpdated,
            &Ok(Notification::CallsUpdated { added: Vec::new(), removed: vec![removed] }),
        );
        Some(call)
    }

    /// Call by id.
    pub fn call(&self, id: &CallId) -> Option<Rc<FakeCall>> {
        self.calls.borrow().iter().find(|c| &c.id == id).cloned()
    }
}

impl CallAgentObject for FakeCallAgent {
    fn calls(&self) -> Vec<Rc<dyn CallObject>> {
        self.calls.borrow().iter().map(|c| Rc::clone(c) as Rc<dyn CallObject>).collect()
    }

    fn display_name(&self) -> Option<String> {
        self.display_name.clone()
    }
}

/// Device enumeration and selection.
#[derive(Debug)]
pub struct FakeDeviceManager {
    /// Handler table.
    pub emitter: Emitter,
    cameras: RefCell<Vec<VideoDeviceInfo>>,
    microphones: RefCell<Vec<AudioDeviceInfo>>,
    speakers: RefCell<Vec<AudioDeviceInfo>>,
    selected_microphone: RefCell<Option<AudioDeviceInfo>>,
    selected_speaker: RefCell<Option<AudioDeviceInfo>>,
    speaker_selection: Cell<bool>,
    granted: Cell<DeviceAccess>,
    failing: Cell<bool>,
    holding: Cell<bool>,
    held: RefCell<Vec<Option<oneshot::Sender<()>>>>,
    queries: Cell<usize>,
}

impl FakeDeviceManager {
    /// Manager reporting `cameras`, no audio devices, and full access.
    pub fn new(cameras: Vec<VideoDeviceInfo>) -> Rc<Self> {
        Rc::new(Self {
            emitter: Emitter::default(),
            cameras: RefCell::new(cameras),
            microphones: RefCell::new(Vec::new()),
            speakers: RefCell::new(Vec::new()),
            selected_microphone: RefCell::new(None),
            selected_speaker: RefCell::new(None),
            speaker_selection: Cell::new(true),
            granted: Cell::new(DeviceAccess { audio: true, video: true }),
            failing: Cell::new(false),
            holding: Cell::new(false),
            held: RefCell::new(Vec::new()),
            queries: Cell::new(0),
        })
    }

    /// Result captured now, delivered when the query is released.
    fn query<T: 'static>(&self, value: T) -> SdkFuture<T> {
        self.queries.set(self.queries.get() + 1);
        let result = if self.failing.get() {
            Err(SdkError::DeviceQuery("enumeration failed".to_owned()))
        } else {
            Ok(value)
        };
        let gate = self.holding.get().then(|| {
            let (release, gate) = oneshot::channel();
            self.held.borrow_mut().push(Some(release));
            gate
        });
        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            result
        })
    }

    /// Replace the camera list and notify.
    pub fn set_cameras(&self, cameras: Vec<VideoDeviceInfo>) {
        *self.cameras.borrow_mut() = cameras;
        self.emitter.changed(EventKind::VideoDevicesUpdated);
    }

    /// Replace the microphone list and notify.
    pub fn set_microphones(&self, microphones: Vec<AudioDeviceInfo>) {
        *self.microphones.borrow_mut() = microphones;
        self.emitter.changed(EventKind::AudioDevicesUpdated);
    }

    /// Replace the speaker list and notify.
    pub fn set_speakers(&self, speakers: Vec<AudioDeviceInfo>) {
        *self.speakers.borrow_mut() = speakers;
        self.emitter.changed(EventKind::AudioDevicesUpdated);
    }

    /// Select a microphone and notify.
    pub fn select_microphone(&self, microphone: Option<AudioDeviceInfo>) {
        *self.selected_microphone.borrow_mut() = microphone;
        self.emitter.changed(EventKind::SelectedMicrophoneChanged);
    }

    /// Select a speaker and notify.
    pub fn select_speaker(&self, speaker: Option<AudioDeviceInfo>) {
        *self.selected_speaker.borrow_mut() = speaker;
        self.emitter.changed(EventKind::SelectedSpeakerChanged);
    }

    /// What the platform grants when asked.
    pub fn grant(&self, access: DeviceAccess) {
        self.granted.set(access);
    }

    /// Make every later query fail.
    pub fn fail_queries(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// Hold later queries until released.
    pub fn hold_queries(&self, holding: bool) {
        self.holding.set(holding);
    }

    /// Release the `index`-th held query. Returns whether it was still held.
    pub fn release_query(&self, index: usize) -> bool {
        let release = self.held.borrow_mut().get_mut(index).and_then(Option::take);
        release.is_some_and(|r| r.send(()).is_ok())
    }

    /// Queries issued so far.
    pub fn query_count(&self) -> usize {
        self.queries.get()
    }
}

impl DeviceManagerObject for FakeDeviceManager {
    fn get_cameras(&self) -> SdkFuture<Vec<VideoDeviceInfo>> {
        self.query(self.cameras.borrow().clone())
    }

    fn get_microphones(&self) -> SdkFuture<Vec<AudioDeviceInfo>> {
        self.query(self.microphones.borrow().clone())
    }

    fn get_speakers(&self) -> SdkFuture<Vec<AudioDeviceInfo>> {
        self.query(self.speakers.borrow().clone())
    }

    fn ask_device_permission(&self, audio: bool, video: bool) -> SdkFuture<DeviceAccess> {
        let granted = self.granted.get();
        self.query(DeviceAccess { audio: audio && granted.audio, video: video && granted.video })
    }

    fn selected_microphone(&self) -> Option<AudioDeviceInfo> {
        self.selected_microphone.borrow().clone()
    }

    fn selected_speaker(&self) -> Option<AudioDeviceInfo> {
        self.selected_speaker.borrow().clone()
    }

    fn is_speaker_selection_available(&self) -> bool {
        self.speaker_selection.get()
    }
}

/// Chat client.
#[derive(Debug)]
pub struct FakeChatClient {
    /// Handler table.
    pub emitter: Emitter,
    threads: Vec<ThreadState>,
}

impl FakeChatClient {
    /// Client that knows `threads` at attach time.
    pub fn new(threads: Vec<ThreadState>) -> Rc<Self> {
        Rc::new(Self { emitter: Emitter::default(), threads })
    }

    /// Emit a chat notification.
    pub fn notify(&self, notification: ChatNotification) {
        let kind = notification.kind();
        self.emitter.emit(kind, &Ok(Notification::Chat(notification)));
    }
}

impl ChatClientObject for FakeChatClient {
    fn threads(&self) -> Vec<ThreadState> {
        self.threads.clone()
    }
}

/// Renderer that records every surface it creates and disposes.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    next: Cell<u64>,
    live: RefCell<BTreeMap<u64, ViewTarget>>,
    disposed: RefCell<Vec<u64>>,
    unknown_disposals: Cell<usize>,
    failing: Cell<bool>,
}

impl RecordingRenderer {
    /// Renderer with no surfaces.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Make later renders fail.
    pub fn fail_renders(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// Handles created and not yet disposed.
    pub fn live_handles(&self) -> BTreeSet<u64> {
        self.live.borrow().keys().copied().collect()
    }

    /// Target a live handle was created for.
    pub fn target(&self, handle: RenderHandle) -> Option<ViewTarget> {
        self.live.borrow().get(&handle.0).cloned()
    }

    /// Disposed handles, in disposal order.
    pub fn disposed(&self) -> Vec<u64> {
        self.disposed.borrow().clone()
    }

    /// Disposals of handles that were never live or already disposed.
    pub fn unknown_disposals(&self) -> usize {
        self.unknown_disposals.get()
    }

    fn dispose(&self, handle: RenderHandle) {
        if self.live.borrow_mut().remove(&handle.0).is_none() {
            self.unknown_disposals.set(self.unknown_disposals.get() + 1);
        }
        self.disposed.borrow_mut().push(handle.0);
    }
}

impl ViewRenderer for RecordingRenderer {
    fn create_view(&self, target: &ViewTarget, _: &ViewOptions) -> Result<RenderHandle, SdkError> {
        if self.failing.get() {
            return Err(SdkError::Render("surface unavailable".to_owned()));
        }
        let handle = self.next.get() + 1;
        self.next.set(handle);
        self.live.borrow_mut().insert(handle, target.clone());
        Ok(RenderHandle(handle))
    }

    fn dispose_remote_stream_view(
        &self,
        _: &CallId,
        _: &ParticipantId,
        _: &StreamId,
        handle: RenderHandle,
    ) {
        self.dispose(handle);
    }

    fn dispose_local_stream_view(&self, _: &VideoDeviceInfo, handle: RenderHandle) {
        self.dispose(handle);
    }
}
