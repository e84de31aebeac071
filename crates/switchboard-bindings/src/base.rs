//! Base extractors.
//!
//! Each one pulls a single input out of the snapshot. They return `Arc`s of
//! snapshot branches, never copies, so [`crate::Identity`] can compare them
//! by pointer.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchboard_core::{
    CallId, ParticipantId, Snapshot, ThreadId,
    state::{
        CallState, ChatParticipant, DeviceManagerState, LocalVideoStreamState, MessageState,
        ParticipantState, ReadReceipt, ThreadState, TypingIndicator,
    },
};

/// Props for calling selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallProps {
    /// Call the view is bound to, if any.
    pub call_id: Option<CallId>,
}

impl CallProps {
    /// Props bound to `call_id`.
    pub fn new(call_id: impl Into<CallId>) -> Self {
        Self { call_id: Some(call_id.into()) }
    }
}

/// Props for a single participant's tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileProps {
    /// Call.
    pub call_id: CallId,
    /// Remote participant.
    pub participant_id: ParticipantId,
}

/// Props for chat selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatProps {
    /// Thread the view is bound to.
    pub thread_id: ThreadId,
    /// Render time, used to age typing indicators.
    pub now: DateTime<Utc>,
}

impl ChatProps {
    /// Props bound to `thread_id` at `now`.
    pub fn new(thread_id: impl Into<ThreadId>, now: DateTime<Utc>) -> Self {
        Self { thread_id: thread_id.into(), now }
    }
}

/// Active call with the props' id.
pub fn call(state: &Snapshot, props: &CallProps) -> Option<Arc<CallState>> {
    props.call_id.as_ref().and_then(|id| state.call(id)).cloned()
}

/// The props' call is active.
pub fn call_exists(state: &Snapshot, props: &CallProps) -> bool {
    props.call_id.as_ref().is_some_and(|id| state.calls.contains_key(id))
}

/// Most recent ended call with the props' id.
pub fn ended_call(state: &Snapshot, props: &CallProps) -> Option<Arc<CallState>> {
    props.call_id.as_ref().and_then(|id| state.ended_call(id)).cloned()
}

/// Local microphone muted in the props' call.
pub fn is_muted(state: &Snapshot, props: &CallProps) -> bool {
    props.call_id.as_ref().and_then(|id| state.call(id)).is_some_and(|c| c.is_muted)
}

/// Local screen share active in the props' call.
pub fn is_screen_sharing_on(state: &Snapshot, props: &CallProps) -> bool {
    props.call_id.as_ref().and_then(|id| state.call(id)).is_some_and(|c| c.is_screen_sharing_on)
}

/// Local outgoing streams of the props' call.
pub fn local_video_streams(
    state: &Snapshot,
    props: &CallProps,
) -> Option<Arc<Vec<LocalVideoStreamState>>> {
    props
        .call_id
        .as_ref()
        .and_then(|id| state.call(id))
        .map(|c| Arc::clone(&c.local_video_streams))
}

/// Remote participants of the props' call.
pub fn remote_participants(
    state: &Snapshot,
    props: &CallProps,
) -> Option<Arc<BTreeMap<ParticipantId, Arc<ParticipantState>>>> {
    props
        .call_id
        .as_ref()
        .and_then(|id| state.call(id))
        .map(|c| Arc::clone(&c.remote_participants))
}

/// Dominant speakers of the props' call.
pub fn dominant_speakers(state: &Snapshot, props: &CallProps) -> Option<Arc<Vec<ParticipantId>>> {
    props.call_id.as_ref().and_then(|id| state.call(id)).map(|c| Arc::clone(&c.dominant_speakers))
}

/// Devices and permissions.
pub fn device_manager(state: &Snapshot) -> Arc<DeviceManagerState> {
    Arc::clone(&state.device_manager)
}

/// Flat id of the local user.
pub fn user_id(state: &Snapshot) -> ParticipantId {
    state.local_participant_id()
}

/// Local display name.
pub fn display_name(state: &Snapshot) -> Option<String> {
    state.display_name.clone()
}

/// The props' thread.
pub fn thread(state: &Snapshot, props: &ChatProps) -> Option<Arc<ThreadState>> {
    state.thread(&props.thread_id).cloned()
}

/// Messages of the props' thread.
pub fn messages(state: &Snapshot, props: &ChatProps) -> Option<Arc<Vec<Arc<MessageState>>>> {
    state.thread(&props.thread_id).map(|t| Arc::clone(&t.messages))
}

/// Typing indicators of the props' thread.
pub fn typing_indicators(state: &Snapshot, props: &ChatProps) -> Option<Arc<Vec<TypingIndicator>>> {
    state.thread(&props.thread_id).map(|t| Arc::clone(&t.typing_indicators))
}

/// Read receipts of the props' thread.
pub fn read_receipts(state: &Snapshot, props: &ChatProps) -> Option<Arc<Vec<ReadReceipt>>> {
    state.thread(&props.thread_id).map(|t| Arc::clone(&t.read_receipts))
}

/// Members of the props' thread.
pub fn chat_participants(
    state: &Snapshot,
    props: &ChatProps,
) -> Option<Arc<BTreeMap<ParticipantId, ChatParticipant>>> {
    state.thread(&props.thread_id).map(|t| Arc::clone(&t.participants))
}
