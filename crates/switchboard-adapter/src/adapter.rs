//! The event adapter.
//!
//! Subscribes to an SDK object graph and turns every notification into
//! [`Event`]s dispatched on the injected [`Store`].
//!
//! # Listener lifetime
//!
//! Collection notifications (`callsUpdated`, `remoteParticipantsUpdated`,
//! `videoStreamsUpdated`) are handled in one synchronous step: views in a
//! removed sub-tree are handed to the renderer, the sub-tree's handlers are
//! unregistered, the removal is dispatched, and then added children are
//! seeded and subscribed. The registry therefore always names exactly the
//! calls, participants, and streams present in the snapshot.
//!
//! Every handler checks its subscription's liveness flag before touching the
//! store, so a notification already in flight when its source was released
//! is dropped.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeSet,
    fmt,
    rc::Rc,
};

use switchboard_core::{
    CallId, Event, ParticipantId, Store, StreamId,
    state::{CallStatus, DeviceAccess, VideoDeviceInfo},
};
use tracing::{debug, trace, warn};

use crate::{
    AdapterError,
    devices::{self, DeviceRefresh, TaskSpawner},
    project,
    registry::{EntityKey, ListenerRegistry, Subscription, SubscriptionToken},
    sdk::{
        CallAgentObject, CallObject, ChatClientObject, ChatNotification, DeviceManagerObject,
        Emission, EventKind, Handler, Notification, ObjectId, RemoteParticipantObject,
        RemoteVideoStreamObject, SdkRoot,
    },
    view::{self, PendingViews, ViewRenderer, ViewTarget},
};

/// Projects an SDK object graph into a [`Store`].
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct Adapter {
    pub(crate) inner: Rc<Inner>,
}

pub(crate) struct Inner {
    pub store: Rc<Store>,
    pub renderer: Rc<dyn ViewRenderer>,
    pub registry: RefCell<ListenerRegistry>,
    pub devices: DeviceRefresh,
    pub views: PendingViews,
    pub device_manager: RefCell<Option<Rc<dyn DeviceManagerObject>>>,
    next_token: Cell<u64>,
}

impl Inner {
    fn local_id(&self) -> ParticipantId {
        self.store.get_state().local_participant_id()
    }

    fn is_subscribed(&self, object: ObjectId) -> bool {
        self.registry.borrow().contains(object)
    }

    pub(crate) fn register(&self, subscription: Subscription) {
        let rejected = self.registry.borrow_mut().insert(subscription);
        if let Some(duplicate) = rejected {
            debug!(key = ?duplicate.key, "duplicate subscription released");
            duplicate.release();
        }
    }

    /// Release `object`'s sub-tree, or whatever is registered under `key`.
    fn unregister(&self, object: Option<ObjectId>, key: &EntityKey) {
        let removed = {
            let mut registry = self.registry.borrow_mut();
            let target =
                object.filter(|o| registry.contains(*o)).or_else(|| registry.object_for(key));
            target.map(|t| registry.remove_tree(t)).unwrap_or_default()
        };
        for subscription in removed {
            subscription.release();
        }
    }
}

/// Register `on_event` for `kind` on the subscription's source.
///
/// The handler holds the adapter weakly and checks the liveness flag, so a
/// released subscription or a dropped adapter turns it into a no-op.
pub(crate) fn listen(
    inner: &Rc<Inner>,
    subscription: &mut Subscription,
    kind: EventKind,
    on_event: impl Fn(&Rc<Inner>, &Notification) + 'static,
) {
    let weak = Rc::downgrade(inner);
    let alive = Rc::clone(&subscription.alive);
    let handler: Handler = Rc::new(move |emission: &Emission| {
        if !alive.get() {
            trace!(%kind, "notification from released source dropped");
            return;
        }
        let Some(inner) = weak.upgrade() else {
            return;
        };
        match emission {
            Ok(notification) => on_event(&inner, notification),
            Err(err) => warn!(%kind, error = %err, "sdk notification failed; dropped"),
        }
    });
    let id = subscription.source.on(kind, handler);
    subscription.handlers.push((kind, id));
}

fn malformed(kind: EventKind, notification: &Notification) {
    warn!(%kind, ?notification, "unexpected payload dropped");
}

fn new_liveness() -> Rc<Cell<bool>> {
    Rc::new(Cell::new(true))
}

impl Adapter {
    /// Adapter dispatching into `store` and rendering through `renderer`.
    ///
    /// Device list re-queries wait for [`Adapter::settle`].
    pub fn new(store: Rc<Store>, renderer: Rc<dyn ViewRenderer>) -> Self {
        Self::build(store, renderer, None)
    }

    /// Like [`Adapter::new`], with device list re-queries run on `spawner`.
    pub fn with_spawner(
        store: Rc<Store>,
        renderer: Rc<dyn ViewRenderer>,
        spawner: Rc<dyn TaskSpawner>,
    ) -> Self {
        Self::build(store, renderer, Some(spawner))
    }

    fn build(
        store: Rc<Store>,
        renderer: Rc<dyn ViewRenderer>,
        spawner: Option<Rc<dyn TaskSpawner>>,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                store,
                renderer,
                registry: RefCell::new(ListenerRegistry::default()),
                devices: DeviceRefresh::with_spawner(spawner),
                views: PendingViews::default(),
                device_manager: RefCell::new(None),
                next_token: Cell::new(1),
            }),
        }
    }

    /// The store this adapter writes to.
    pub fn store(&self) -> &Rc<Store> {
        &self.inner.store
    }

    /// Seed the store from `root` and subscribe to it and all its children.
    ///
    /// Attaching a root that is already attached returns its existing token.
    /// Attaching a device manager awaits the initial device enumeration.
    pub async fn attach(&self, root: SdkRoot) -> Result<SubscriptionToken, AdapterError> {
        let existing = self.inner.registry.borrow().token_of(root.object_id());
        if let Some(token) = existing {
            debug!(?root, ?token, "already attached");
            return Ok(token);
        }

        let token = SubscriptionToken(self.inner.next_token.get());
        self.inner.next_token.set(token.0 + 1);

        match root.clone() {
            SdkRoot::CallAgent(agent) => attach_call_agent(&self.inner, agent, token),
            SdkRoot::DeviceManager(manager) => {
                if let Some(existing) = devices::attach(&self.inner, manager, token).await? {
                    return Ok(existing);
                }
            },
            SdkRoot::ChatClient(chat) => attach_chat_client(&self.inner, chat, token),
        }
        debug!(?root, ?token, "attached");
        Ok(token)
    }

    /// Release every subscription made under `token`.
    ///
    /// Idempotent. The snapshot is left as it is.
    pub fn detach(&self, token: SubscriptionToken) {
        let roots = self.inner.registry.borrow().roots_of(token);
        if roots.is_empty() {
            trace!(?token, "nothing to detach");
            return;
        }

        let manager_root = self.inner.device_manager.borrow().as_ref().map(|m| m.object_id());
        for root in roots {
            if manager_root == Some(root) {
                self.inner.device_manager.borrow_mut().take();
            }
            let removed = self.inner.registry.borrow_mut().remove_tree(root);
            for subscription in removed {
                subscription.release();
            }
        }
        debug!(?token, "detached");
    }

    /// Calls, participants, and streams that currently have listeners.
    pub fn live_entities(&self) -> BTreeSet<EntityKey> {
        self.inner.registry.borrow().keys().filter(|k| !k.is_root()).cloned().collect()
    }

    /// Handlers currently registered on SDK objects.
    pub fn listener_count(&self) -> usize {
        self.inner.registry.borrow().handler_count()
    }

    /// Wait for outstanding device re-queries to land.
    ///
    /// Without a spawner this is what runs them.
    pub async fn settle(&self) {
        self.inner.devices.settle().await;
    }

    /// Record the camera the user picked.
    pub fn set_selected_camera(&self, camera: Option<VideoDeviceInfo>) {
        self.inner.store.dispatch(Event::SelectedCameraChanged { camera });
    }

    /// Ask the platform for media permissions and record the outcome.
    pub async fn ask_device_permission(
        &self,
        audio: bool,
        video: bool,
    ) -> Result<DeviceAccess, AdapterError> {
        let manager =
            self.inner.device_manager.borrow().clone().ok_or(AdapterError::NoDeviceManager)?;
        let access = manager.ask_device_permission(audio, video).await?;
        self.inner.store.dispatch(Event::DeviceAccessChanged { access });
        Ok(access)
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("store", &self.inner.store)
            .field("registry", &self.inner.registry.borrow())
            .finish_non_exhaustive()
    }
}

fn attach_call_agent(inner: &Rc<Inner>, agent: Rc<dyn CallAgentObject>, token: SubscriptionToken) {
    let object = agent.object_id();
    if let Some(display_name) = agent.display_name() {
        inner.store.dispatch(Event::LocalDisplayNameChanged { display_name: Some(display_name) });
    }

    let mut subscription =
        Subscription::new(agent.clone(), EntityKey::CallAgent(object), token, None, new_liveness());
    listen(inner, &mut subscription, EventKind::CallsUpdated, move |inner, notification| {
        let Notification::CallsUpdated { added, removed } = notification else {
            malformed(EventKind::CallsUpdated, notification);
            return;
        };
        debug!(added = added.len(), removed = removed.len(), "calls updated");
        for call in removed {
            remove_call(inner, call.as_ref());
        }
        for call in added {
            attach_call(inner, Rc::clone(call), object, token);
        }
    });
    inner.register(subscription);

    for call in agent.calls() {
        attach_call(inner, call, object, token);
    }
}

fn attach_call(
    inner: &Rc<Inner>,
    call: Rc<dyn CallObject>,
    parent: ObjectId,
    token: SubscriptionToken,
) {
    let object = call.object_id();
    if inner.is_subscribed(object) {
        trace!(?object, "call already subscribed");
        return;
    }
    let call_id = call.id();
    let key = EntityKey::Call(call_id.clone());
    let stale = inner.registry.borrow().object_for(&key);
    if let Some(stale) = stale {
        debug!(%call_id, ?stale, "call replaced by a new object");
        drop_call(inner, &call_id, Some(stale));
    }

    let local = inner.local_id();
    inner.store.dispatch(Event::CallAdded { call: project::call(call.as_ref(), &local) });

    let mut subscription =
        Subscription::new(call.clone(), key, token, Some(parent), new_liveness());
    for kind in EventKind::CALL {
        let weak = Rc::downgrade(&call);
        let call_id = call_id.clone();
        listen(inner, &mut subscription, kind, move |inner, notification| {
            if let Some(call) = weak.upgrade() {
                on_call_event(inner, &call, &call_id, object, token, kind, notification);
            }
        });
    }
    inner.register(subscription);

    for participant in call.remote_participants() {
        if participant.participant_id() != local {
            attach_participant(inner, &call_id, participant, object, token, false);
        }
    }
    debug!(%call_id, "call subscribed");
}

/// Property notifications carry no payload.
fn expect_changed(kind: EventKind, notification: &Notification) -> bool {
    let changed = matches!(notification, Notification::Changed);
    if !changed {
        malformed(kind, notification);
    }
    changed
}

fn on_call_event(
    inner: &Rc<Inner>,
    call: &Rc<dyn CallObject>,
    call_id: &CallId,
    object: ObjectId,
    token: SubscriptionToken,
    kind: EventKind,
    notification: &Notification,
) {
    let call_id = call_id.clone();
    match kind {
        EventKind::RemoteParticipantsUpdated => {
            let Notification::RemoteParticipantsUpdated { added, removed } = notification else {
                malformed(kind, notification);
                return;
            };
            debug!(%call_id, added = added.len(), removed = removed.len(), "participants updated");
            for participant in removed {
                remove_participant(inner, &call_id, participant.as_ref());
            }
            let local = inner.local_id();
            for participant in added {
                if participant.participant_id() != local {
                    let participant = Rc::clone(participant);
                    attach_participant(inner, &call_id, participant, object, token, true);
                }
            }
        },
        _ if !expect_changed(kind, notification) => {},
        EventKind::StateChanged => {
            let state = call.state();
            inner.store.dispatch(Event::CallStateChanged { call_id: call_id.clone(), state });
            if state == CallStatus::Disconnected
                && let Some(end_reason) = call.call_end_reason()
            {
                inner.store.dispatch(Event::CallEndReasonChanged { call_id, end_reason });
            }
        },
        EventKind::IsMutedChanged => {
            inner.store.dispatch(Event::CallMuteChanged { call_id, is_muted: call.is_muted() });
        },
        EventKind::IsScreenSharingOnChanged => {
            inner.store.dispatch(Event::ScreenShareChanged {
                call_id,
                is_screen_sharing_on: call.is_screen_sharing_on(),
            });
        },
        EventKind::LocalVideoStreamsUpdated => {
            let streams = project::local_streams(call.as_ref());
            let next = streams.clone();
            let event = Event::LocalVideoStreamsUpdated { call_id: call_id.clone(), streams };
            view::dispatch_releasing(inner, event, move |inner, state| {
                if let Some(current) = state.call(&call_id) {
                    view::release_replaced_local_views(inner, current, &next);
                }
            });
        },
        EventKind::DominantSpeakersChanged => {
            inner.store.dispatch(Event::DominantSpeakersChanged {
                call_id,
                speakers: project::dominant_speakers(call.as_ref()),
            });
        },
        _ => {},
    }
}

fn remove_call(inner: &Rc<Inner>, call: &dyn CallObject) {
    let call_id = call.id();
    inner.store.dispatch(Event::CallStateChanged { call_id: call_id.clone(), state: call.state() });
    if let Some(end_reason) = call.call_end_reason() {
        inner.store.dispatch(Event::CallEndReasonChanged { call_id: call_id.clone(), end_reason });
    }
    drop_call(inner, &call_id, Some(call.object_id()));
}

/// Release views, unsubscribe, and remove a call.
fn drop_call(inner: &Rc<Inner>, call_id: &CallId, object: Option<ObjectId>) {
    inner.unregister(object, &EntityKey::Call(call_id.clone()));
    let removed = call_id.clone();
    let event = Event::CallRemoved { call_id: call_id.clone() };
    view::dispatch_releasing(inner, event, move |inner, state| {
        if let Some(call) = state.call(&removed) {
            view::release_call_views(inner, call);
        }
    });
    debug!(%call_id, "call removed");
}

fn attach_participant(
    inner: &Rc<Inner>,
    call_id: &CallId,
    participant: Rc<dyn RemoteParticipantObject>,
    parent: ObjectId,
    token: SubscriptionToken,
    seed: bool,
) {
    let object = participant.object_id();
    if inner.is_subscribed(object) {
        return;
    }
    let participant_id = participant.participant_id();
    let key = EntityKey::Participant(call_id.clone(), participant_id.clone());
    let stale = inner.registry.borrow().object_for(&key);
    if let Some(stale) = stale {
        drop_participant(inner, call_id, &participant_id, Some(stale));
    }

    // Initial participants arrive inside the call record, streams included.
    if seed {
        inner.store.dispatch(Event::ParticipantAdded {
            call_id: call_id.clone(),
            participant: project::participant(participant.as_ref()),
        });
    }

    let mut subscription =
        Subscription::new(participant.clone(), key, token, Some(parent), new_liveness());
    for kind in EventKind::PARTICIPANT {
        let weak = Rc::downgrade(&participant);
        let call_id = call_id.clone();
        let participant_id = participant_id.clone();
        listen(inner, &mut subscription, kind, move |inner, notification| {
            if let Some(participant) = weak.upgrade() {
                on_participant_event(
                    inner,
                    participant.as_ref(),
                    (&call_id, &participant_id),
                    object,
                    token,
                    kind,
                    notification,
                );
            }
        });
    }
    inner.register(subscription);

    for stream in participant.video_streams() {
        attach_stream(inner, (call_id, &participant_id), stream, object, token, false);
    }
}

fn on_participant_event(
    inner: &Rc<Inner>,
    participant: &dyn RemoteParticipantObject,
    (call_id, participant_id): (&CallId, &ParticipantId),
    object: ObjectId,
    token: SubscriptionToken,
    kind: EventKind,
    notification: &Notification,
) {
    let (call_id, participant_id) = (call_id.clone(), participant_id.clone());
    match kind {
        EventKind::VideoStreamsUpdated => {
            let Notification::VideoStreamsUpdated { added, removed } = notification else {
                malformed(kind, notification);
                return;
            };
            debug!(
                %call_id,
                %participant_id,
                added = added.len(),
                removed = removed.len(),
                "streams updated"
            );
            for stream in removed {
                remove_stream(inner, (&call_id, &participant_id), stream.as_ref());
            }
            for stream in added {
                let owner = (&call_id, &participant_id);
                attach_stream(inner, owner, Rc::clone(stream), object, token, true);
            }
        },
        _ if !expect_changed(kind, notification) => {},
        EventKind::StateChanged => {
            inner.store.dispatch(Event::ParticipantStateChanged {
                call_id,
                participant_id,
                state: participant.state(),
            });
        },
        EventKind::IsMutedChanged => {
            inner.store.dispatch(Event::ParticipantMuteChanged {
                call_id,
                participant_id,
                is_muted: participant.is_muted(),
            });
        },
        EventKind::IsSpeakingChanged => {
            inner.store.dispatch(Event::ParticipantSpeakingChanged {
                call_id,
                participant_id,
                is_speaking: participant.is_speaking(),
            });
        },
        EventKind::DisplayNameChanged => {
            inner.store.dispatch(Event::ParticipantDisplayNameChanged {
                call_id,
                participant_id,
                display_name: participant.display_name(),
            });
        },
        _ => {},
    }
}

fn remove_participant(
    inner: &Rc<Inner>,
    call_id: &CallId,
    participant: &dyn RemoteParticipantObject,
) {
    let participant_id = participant.participant_id();
    drop_participant(inner, call_id, &participant_id, Some(participant.object_id()));
}

fn drop_participant(
    inner: &Rc<Inner>,
    call_id: &CallId,
    participant_id: &ParticipantId,
    object: Option<ObjectId>,
) {
    inner.unregister(object, &EntityKey::Participant(call_id.clone(), participant_id.clone()));
    let event = Event::ParticipantRemoved {
        call_id: call_id.clone(),
        participant_id: participant_id.clone(),
    };
    let (call_id, participant_id) = (call_id.clone(), participant_id.clone());
    view::dispatch_releasing(inner, event, move |inner, state| {
        let participant = state.call(&call_id).and_then(|c| c.participant(&participant_id));
        if let Some(participant) = participant {
            view::release_participant_views(inner, &call_id, &participant_id, participant);
        }
    });
}

fn attach_stream(
    inner: &Rc<Inner>,
    (call_id, participant_id): (&CallId, &ParticipantId),
    stream: Rc<dyn RemoteVideoStreamObject>,
    parent: ObjectId,
    token: SubscriptionToken,
    seed: bool,
) {
    let object = stream.object_id();
    if inner.is_subscribed(object) {
        return;
    }
    let stream_id = stream.id();
    let key = EntityKey::Stream(call_id.clone(), participant_id.clone(), stream_id.clone());
    let stale = inner.registry.borrow().object_for(&key);
    if let Some(stale) = stale {
        drop_stream(inner, (call_id, participant_id), &stream_id, Some(stale));
    }

    let mut subscription =
        Subscription::new(stream.clone(), key, token, Some(parent), new_liveness());
    let weak = Rc::downgrade(&stream);
    let ids = (call_id.clone(), participant_id.clone());
    listen(inner, &mut subscription, EventKind::IsAvailableChanged, move |inner, notification| {
        if !expect_changed(EventKind::IsAvailableChanged, notification) {
            return;
        }
        if let Some(stream) = weak.upgrade() {
            inner.store.dispatch(Event::StreamAvailabilityChanged {
                call_id: ids.0.clone(),
                participant_id: ids.1.clone(),
                stream_id: stream.id(),
                is_available: stream.is_available(),
            });
        }
    });
    // Registered before seeding: a store listener may remove the stream again
    // while the seed commits.
    inner.register(subscription);

    if seed {
        inner.store.dispatch(Event::StreamAdded {
            call_id: call_id.clone(),
            participant_id: participant_id.clone(),
            stream: project::stream(stream.as_ref()),
        });
    }
}

fn remove_stream(
    inner: &Rc<Inner>,
    ids: (&CallId, &ParticipantId),
    stream: &dyn RemoteVideoStreamObject,
) {
    drop_stream(inner, ids, &stream.id(), Some(stream.object_id()));
}

fn drop_stream(
    inner: &Rc<Inner>,
    (call_id, participant_id): (&CallId, &ParticipantId),
    stream_id: &StreamId,
    object: Option<ObjectId>,
) {
    inner.unregister(
        object,
        &EntityKey::Stream(call_id.clone(), participant_id.clone(), stream_id.clone()),
    );
    let event = Event::StreamRemoved {
        call_id: call_id.clone(),
        participant_id: participant_id.clone(),
        stream_id: stream_id.clone(),
    };
    let target = ViewTarget::Remote {
        call_id: call_id.clone(),
        participant_id: participant_id.clone(),
        stream_id: stream_id.clone(),
    };
    view::dispatch_releasing(inner, event, move |inner, state| {
        view::release_target(inner, state, &target);
    });
}

fn attach_chat_client(inner: &Rc<Inner>, chat: Rc<dyn ChatClientObject>, token: SubscriptionToken) {
    let object = chat.object_id();
    for thread in chat.threads() {
        inner.store.dispatch(Event::ThreadAdded { thread });
    }

    let mut subscription =
        Subscription::new(chat.clone(), EntityKey::ChatClient(object), token, None, new_liveness());
    for kind in EventKind::CHAT {
        listen(inner, &mut subscription, kind, move |inner, notification| {
            match notification {
                Notification::Chat(payload) if payload.kind() == kind => {
                    inner.store.dispatch(chat_event(payload.clone()));
                },
                _ => malformed(kind, notification),
            }
        });
    }
    inner.register(subscription);
}

fn chat_event(notification: ChatNotification) -> Event {
    match notification {
        ChatNotification::MessageReceived { thread_id, message } => {
            Event::MessageReceived { thread_id, message }
        },
        ChatNotification::MessageEdited { thread_id, message_id, content, edited_on } => {
            Event::MessageEdited { thread_id, message_id, content, edited_on }
        },
        ChatNotification::MessageDeleted { thread_id, message_id, deleted_on } => {
            Event::MessageDeleted { thread_id, message_id, deleted_on }
        },
        ChatNotification::TypingIndicatorReceived { thread_id, indicator } => {
            Event::TypingIndicatorReceived { thread_id, indicator }
        },
        ChatNotification::ReadReceiptReceived { thread_id, receipt } => {
            Event::ReadReceiptReceived { thread_id, receipt }
        },
        ChatNotification::ThreadCreated { thread } => Event::ThreadAdded { thread },
        ChatNotification::ThreadDeleted { thread_id } => Event::ThreadRemoved { thread_id },
        ChatNotification::ThreadPropertiesUpdated { thread_id, topic } => {
            Event::TopicUpdated { thread_id, topic }
        },
        ChatNotification::ParticipantsAdded { thread_id, participants } => {
            Event::ChatParticipantsAdded { thread_id, participants }
        },
        ChatNotification::ParticipantsRemoved { thread_id, participants } => {
            Event::ChatParticipantsRemoved {
                thread_id,
                participant_ids: participants.iter().map(ParticipantId::from).collect(),
            }
        },
    }
}
