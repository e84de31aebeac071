//! Adapter error types.

use switchboard_core::{CallId, ParticipantId, StreamId};
use thiserror::Error;

/// Failure raised by the SDK or the view renderer.
///
/// Inside notification handlers these are logged and dropped. They surface
/// to callers only from [`crate::Adapter::attach`] and the view calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// The SDK failed while producing a notification.
    #[error("sdk internal error: {0}")]
    Internal(String),

    /// Device enumeration or permission query failed.
    #[error("device query failed: {0}")]
    DeviceQuery(String),

    /// The renderer could not create a view.
    #[error("render failed: {0}")]
    Render(String),
}

/// Errors returned by caller-facing adapter operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Underlying SDK or renderer failure.
    #[error(transparent)]
    Sdk(#[from] SdkError),

    /// No active call with this id.
    #[error("call {0} not found")]
    CallNotFound(CallId),

    /// No such remote stream in the current snapshot.
    #[error("stream {stream_id} of {participant_id} in call {call_id} not found")]
    StreamNotFound {
        /// Call.
        call_id: CallId,
        /// Owner.
        participant_id: ParticipantId,
        /// Stream.
        stream_id: StreamId,
    },

    /// The stream exists but carries no media to render.
    #[error("stream {stream_id} of {participant_id} is not available")]
    StreamUnavailable {
        /// Owner.
        participant_id: ParticipantId,
        /// Stream.
        stream_id: StreamId,
    },

    /// The call is not sending camera video.
    #[error("call {0} has no local video stream")]
    NoLocalStream(CallId),

    /// The operation needs an attached device manager.
    #[error("no device manager attached")]
    NoDeviceManager,
}
