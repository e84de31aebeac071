//! View lifecycle.
//!
//! Render handles belong to the UI layer. The adapter asks a
//! [`ViewRenderer`] to create one, records it in the snapshot, and hands it
//! back to the renderer for disposal before the snapshot forgets it: either
//! on an explicit [`Adapter::dispose_view`] or when the entity holding the
//! view is removed. Both happen as the update commits, so a view whose
//! record is still queued behind an in-flight commit is never missed.

use std::{cell::RefCell, rc::Rc};

use switchboard_core::{
    CallId, Event, ParticipantId, Snapshot, StreamId, reduce,
    state::{
        AttachedView, CallState, LocalVideoStreamState, MediaStreamType, ParticipantState,
        RenderHandle, ScalingMode, StreamView, VideoDeviceInfo, VideoStreamState,
    },
};
use tracing::{debug, trace};

use crate::{Adapter, AdapterError, SdkError, adapter::Inner};

/// What to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewTarget {
    /// A remote participant's stream.
    Remote {
        /// Call.
        call_id: CallId,
        /// Owner.
        participant_id: ParticipantId,
        /// Stream.
        stream_id: StreamId,
    },
    /// The local camera stream of a call.
    LocalCall {
        /// Call.
        call_id: CallId,
    },
    /// A camera preview outside any call.
    Preview {
        /// Camera.
        camera: VideoDeviceInfo,
    },
}

/// Render options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewOptions {
    /// Scaling applied to the surface.
    pub scaling_mode: ScalingMode,
    /// Mirror horizontally.
    pub is_mirrored: bool,
}

/// Creates and disposes video surfaces. Implemented by the UI layer.
pub trait ViewRenderer {
    /// Create a surface for `target`.
    fn create_view(
        &self,
        target: &ViewTarget,
        options: &ViewOptions,
    ) -> Result<RenderHandle, SdkError>;

    /// Dispose the surface of a remote stream.
    fn dispose_remote_stream_view(
        &self,
        call_id: &CallId,
        participant_id: &ParticipantId,
        stream_id: &StreamId,
        handle: RenderHandle,
    );

    /// Dispose the surface of a local stream or preview.
    fn dispose_local_stream_view(&self, source: &VideoDeviceInfo, handle: RenderHandle);
}

impl Adapter {
    /// Render `target`, or return the handle of the view already attached.
    ///
    /// A view rendered earlier in the same store round, whose record has
    /// not committed yet, is returned rather than rendered again.
    pub fn create_view(
        &self,
        target: &ViewTarget,
        options: ViewOptions,
    ) -> Result<RenderHandle, AdapterError> {
        let inner = &self.inner;
        if let Some(handle) = inner.views.get(target) {
            return Ok(handle);
        }
        let state = inner.store.get_state();

        let (view, event, source) = match target {
            ViewTarget::Remote { call_id, participant_id, stream_id } => {
                let stream = state
                    .call(call_id)
                    .and_then(|c| c.participant(participant_id))
                    .and_then(|p| p.stream(stream_id))
                    .ok_or_else(|| AdapterError::StreamNotFound {
                        call_id: call_id.clone(),
                        participant_id: participant_id.clone(),
                        stream_id: stream_id.clone(),
                    })?;
                if let Some(view) = stream.view {
                    return Ok(view.handle);
                }
                if !stream.is_available {
                    return Err(AdapterError::StreamUnavailable {
                        participant_id: participant_id.clone(),
                        stream_id: stream_id.clone(),
                    });
                }
                let view = render(inner, target, options)?;
                let event = Event::RemoteViewCreated {
                    call_id: call_id.clone(),
                    participant_id: participant_id.clone(),
                    stream_id: stream_id.clone(),
                    view,
                };
                (view, event, None)
            },
            ViewTarget::LocalCall { call_id } => {
                let call =
                    state.call(call_id).ok_or_else(|| AdapterError::CallNotFound(call_id.clone()))?;
                let stream = call
                    .local_stream(MediaStreamType::Video)
                    .ok_or_else(|| AdapterError::NoLocalStream(call_id.clone()))?;
                if let Some(view) = stream.view {
                    return Ok(view.handle);
                }
                let view = render(inner, target, options)?;
                let event = Event::LocalViewCreated {
                    call_id: call_id.clone(),
                    media_stream_type: MediaStreamType::Video,
                    view,
                };
                (view, event, Some(stream.source.clone()))
            },
            ViewTarget::Preview { camera } => {
                if let Some(view) = state.device_manager.preview(&camera.id).and_then(|p| p.view) {
                    return Ok(view.handle);
                }
                let view = render(inner, target, options)?;
                let event = Event::PreviewViewCreated { source: camera.clone(), view };
                (view, event, Some(camera.clone()))
            },
        };

        let handle = view.handle;
        debug!(?target, handle = handle.0, "view created");
        inner.views.insert(target.clone(), handle);

        let weak = Rc::downgrade(inner);
        let target = target.clone();
        inner.store.set_state(move |state| {
            let next = reduce(state, &event);
            if let Some(inner) = weak.upgrade() {
                inner.views.remove(&target, Some(handle));
                if recorded_handle(&next, &target) != Some(handle) {
                    debug!(?target, handle = handle.0, "view target gone before commit");
                    dispose_handle(&inner, &target, source.as_ref(), handle);
                }
            }
            next
        });
        Ok(handle)
    }

    /// Dispose the view on `target`. No-op if there is none.
    pub fn dispose_view(&self, target: &ViewTarget) {
        let inner = &self.inner;
        inner.views.remove(target, None);

        let event = match target {
            ViewTarget::Remote { call_id, participant_id, stream_id } => {
                Event::RemoteViewDisposed {
                    call_id: call_id.clone(),
                    participant_id: participant_id.clone(),
                    stream_id: stream_id.clone(),
                }
            },
            ViewTarget::LocalCall { call_id } => Event::LocalViewDisposed {
                call_id: call_id.clone(),
                media_stream_type: MediaStreamType::Video,
            },
            ViewTarget::Preview { camera } => {
                Event::PreviewViewDisposed { camera_id: camera.id.clone() }
            },
        };
        let target = target.clone();
        dispatch_releasing(inner, event, move |inner, state| release_target(inner, state, &target));
    }
}

/// Views rendered whose record has not committed yet.
#[derive(Debug, Default)]
pub(crate) struct PendingViews(RefCell<Vec<(ViewTarget, RenderHandle)>>);

impl PendingViews {
    fn get(&self, target: &ViewTarget) -> Option<RenderHandle> {
        self.0.borrow().iter().find(|(t, _)| t == target).map(|(_, handle)| *handle)
    }

    fn insert(&self, target: ViewTarget, handle: RenderHandle) {
        self.0.borrow_mut().push((target, handle));
    }

    /// Forget `target`, or only its `handle` entry when given.
    fn remove(&self, target: &ViewTarget, handle: Option<RenderHandle>) {
        self.0
            .borrow_mut()
            .retain(|(t, h)| t != target || handle.is_some_and(|handle| handle != *h));
    }
}

/// Apply `event` when its turn to commit comes, first handing the views
/// `release` finds in the committing snapshot back to the renderer.
///
/// Reading the committing snapshot rather than the published one also
/// releases views whose record was still queued when `event` was raised.
pub(crate) fn dispatch_releasing(
    inner: &Rc<Inner>,
    event: Event,
    release: impl FnOnce(&Inner, &Snapshot) + 'static,
) {
    trace!(event = event.name(), "dispatch releasing views");
    let weak = Rc::downgrade(inner);
    inner.store.set_state(move |state| {
        if let Some(inner) = weak.upgrade() {
            release(&inner, state);
        }
        reduce(state, &event)
    });
}

fn recorded_handle(state: &Snapshot, target: &ViewTarget) -> Option<RenderHandle> {
    let view = match target {
        ViewTarget::Remote { call_id, participant_id, stream_id } => state
            .call(call_id)
            .and_then(|c| c.participant(participant_id))
            .and_then(|p| p.stream(stream_id))
            .and_then(|s| s.view),
        ViewTarget::LocalCall { call_id } => {
            state.call(call_id).and_then(|c| c.local_stream(MediaStreamType::Video)?.view)
        },
        ViewTarget::Preview { camera } => {
            state.device_manager.preview(&camera.id).and_then(|p| p.view)
        },
    };
    view.map(|v| v.handle)
}

fn dispose_handle(
    inner: &Inner,
    target: &ViewTarget,
    source: Option<&VideoDeviceInfo>,
    handle: RenderHandle,
) {
    match (target, source) {
        (ViewTarget::Remote { call_id, participant_id, stream_id }, _) => {
            inner.renderer.dispose_remote_stream_view(call_id, participant_id, stream_id, handle);
        },
        (_, Some(source)) => inner.renderer.dispose_local_stream_view(source, handle),
        (_, None) => {},
    }
}

pub(crate) fn release_target(inner: &Inner, state: &Snapshot, target: &ViewTarget) {
    match target {
        ViewTarget::Remote { call_id, participant_id, stream_id } => {
            if let Some(stream) = state
                .call(call_id)
                .and_then(|c| c.participant(participant_id))
                .and_then(|p| p.stream(stream_id))
            {
                release_stream_view(inner, call_id, participant_id, stream);
            }
        },
        ViewTarget::LocalCall { call_id } => {
            if let Some(stream) =
                state.call(call_id).and_then(|c| c.local_stream(MediaStreamType::Video))
            {
                release_local_view(inner, stream);
            }
        },
        ViewTarget::Preview { camera } => {
            if let Some(preview) = state.device_manager.preview(&camera.id) {
                release_local_view(inner, preview);
            }
        },
    }
}

fn render(
    inner: &Inner,
    target: &ViewTarget,
    options: ViewOptions,
) -> Result<StreamView, AdapterError> {
    let handle = inner.renderer.create_view(target, &options)?;
    Ok(StreamView { handle, scaling_mode: options.scaling_mode, is_mirrored: options.is_mirrored })
}

/// Dispose a remote stream's view. Returns whether there was one.
pub(crate) fn release_stream_view(
    inner: &Inner,
    call_id: &CallId,
    participant_id: &ParticipantId,
    stream: &VideoStreamState,
) -> bool {
    let Some(view) = stream.view else {
        return false;
    };
    inner.renderer.dispose_remote_stream_view(call_id, participant_id, &stream.id, view.handle);
    true
}

/// Dispose a local stream's or preview's view. Returns whether there was one.
pub(crate) fn release_local_view(inner: &Inner, stream: &LocalVideoStreamState) -> bool {
    let Some(view) = stream.view else {
        return false;
    };
    inner.renderer.dispose_local_stream_view(&stream.source, view.handle);
    true
}

pub(crate) fn release_participant_views(
    inner: &Inner,
    call_id: &CallId,
    participant_id: &ParticipantId,
    participant: &ParticipantState,
) {
    for stream in participant.video_streams.values() {
        release_stream_view(inner, call_id, participant_id, stream);
    }
}

pub(crate) fn release_call_views(inner: &Inner, call: &CallState) {
    for attached in call.views() {
        match attached {
            AttachedView::Local { source, view } => {
                inner.renderer.dispose_local_stream_view(&source, view.handle);
            },
            AttachedView::Remote { participant_id, stream_id, view } => {
                inner.renderer.dispose_remote_stream_view(
                    &call.id,
                    &participant_id,
                    &stream_id,
                    view.handle,
                );
            },
        }
    }
}

/// Dispose views of local streams that `next` no longer contains.
pub(crate) fn release_replaced_local_views(
    inner: &Inner,
    call: &CallState,
    next: &[LocalVideoStreamState],
) {
    for stream in call.local_video_streams.iter() {
        let survives = next.iter().any(|n| {
            n.source.id == stream.source.id && n.media_stream_type == stream.media_stream_type
        });
        if !survives {
            release_local_view(inner, stream);
        }
    }
}
