//! The immutable snapshot.
//!
//! A [`Snapshot`] is the whole client-visible world at one instant. It is
//! never mutated after publication. Every independently changing sub-tree
//! sits behind an [`Arc`], so a reducer that touches one participant shares
//! every other branch with the previous snapshot and selectors can detect
//! "unchanged" with [`Arc::ptr_eq`].
//!
//! Nothing here holds a reference into the SDK. The one foreign value is
//! [`RenderHandle`], an opaque token owned by the UI layer.

mod call;
mod chat;
mod device;

use std::{collections::BTreeMap, sync::Arc};

pub use call::{
    AttachedView, CallDirection, CallEndKind, CallEndReason, CallState, CallStatus,
    LocalVideoStreamState, MediaStreamType, ParticipantState, ParticipantStatus, RenderHandle,
    ScalingMode, StreamView, VideoStreamState,
};
pub use chat::{
    ChatParticipant, MessageState, MessageType, ReadReceipt, ThreadState, TypingIndicator,
};
pub use device::{
    AudioDeviceInfo, AudioDeviceType, DeviceAccess, DeviceManagerState, VideoDeviceInfo,
    VideoDeviceType,
};
use serde::{Deserialize, Serialize};

use crate::{CallId, CommunicationIdentifier, ParticipantId, ThreadId};

/// Number of ended calls kept in [`Snapshot::calls_ended`].
pub const MAX_ENDED_CALLS: usize = 10;

/// The client-visible world at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Local user.
    pub user_id: CommunicationIdentifier,
    /// Local display name.
    pub display_name: Option<String>,
    /// Active calls by id.
    pub calls: Arc<BTreeMap<CallId, Arc<CallState>>>,
    /// Recently ended calls, oldest first, at most [`MAX_ENDED_CALLS`].
    pub calls_ended: Arc<Vec<Arc<CallState>>>,
    /// Devices and permissions.
    pub device_manager: Arc<DeviceManagerState>,
    /// Chat threads by id.
    pub threads: Arc<BTreeMap<ThreadId, Arc<ThreadState>>>,
}

impl Snapshot {
    /// Empty world for the given local user.
    pub fn new(user_id: CommunicationIdentifier) -> Self {
        Self {
            user_id,
            display_name: None,
            calls: Arc::default(),
            calls_ended: Arc::default(),
            device_manager: Arc::default(),
            threads: Arc::default(),
        }
    }

    /// Set the local display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Flat id of the local user.
    pub fn local_participant_id(&self) -> ParticipantId {
        self.user_id.to_flat()
    }

    /// Active call by id.
    pub fn call(&self, id: &CallId) -> Option<&Arc<CallState>> {
        self.calls.get(id)
    }

    /// Most recent ended call with this id.
    pub fn ended_call(&self, id: &CallId) -> Option<&Arc<CallState>> {
        self.calls_ended.iter().rev().find(|c| &c.id == id)
    }

    /// Chat thread by id.
    pub fn thread(&self, id: &ThreadId) -> Option<&Arc<ThreadState>> {
        self.threads.get(id)
    }
}
