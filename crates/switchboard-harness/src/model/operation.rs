//! Operations for model-based testing.
//!
//! Operations represent what the SDK and the UI can do to the system. They
//! are generated randomly and applied to both the model and the real
//! adapter. Slots are small integers folded onto a handful of ids so that
//! random sequences keep hitting the same entities.

use arbitrary::{Arbitrary, Unstructured};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use switchboard_core::{CallId, CommunicationIdentifier, MessageId, StreamId, ThreadId};

/// Call slot.
pub type CallSlot = u8;

/// Participant slot. Slot 0 is the local user.
pub type ParticipantSlot = u8;

/// Stream slot.
pub type StreamSlot = u8;

/// Thread slot.
pub type ThreadSlot = u8;

/// Distinct calls.
pub const CALLS: u8 = 3;
/// Distinct participants, the local user included.
pub const PARTICIPANTS: u8 = 4;
/// Distinct streams per participant.
pub const STREAMS: u8 = 2;
/// Threads known to the chat client.
pub const THREADS: u8 = 2;
/// Raw id of the local user.
pub const LOCAL_USER: &str = "me";

/// Call id for a slot.
pub fn call_id(slot: CallSlot) -> CallId {
    CallId::new(format!("call-{}", slot % CALLS))
}

/// Identifier for a slot.
pub fn participant(slot: ParticipantSlot) -> CommunicationIdentifier {
    match slot % PARTICIPANTS {
        0 => CommunicationIdentifier::user(LOCAL_USER),
        n => CommunicationIdentifier::user(format!("user-{n}")),
    }
}

/// Stream id for a slot.
pub fn stream_id(slot: StreamSlot) -> StreamId {
    StreamId::new(format!("s{}", slot % STREAMS))
}

/// Thread id for a slot.
pub fn thread_id(slot: ThreadSlot) -> ThreadId {
    ThreadId::new(format!("thread-{}", slot % THREADS))
}

/// Message id for a sequence number.
pub fn message_id(sequence: u8) -> MessageId {
    MessageId::new(format!("m{sequence}"))
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// A connected call appears on the call agent.
    StartCall {
        /// Call.
        call: CallSlot,
    },

    /// The call disconnects and leaves the call agent.
    EndCall {
        /// Call.
        call: CallSlot,
        /// Someone else removed the local user.
        removed: bool,
    },

    /// Local microphone toggled.
    SetMuted {
        /// Call.
        call: CallSlot,
        /// Muted.
        is_muted: bool,
    },

    /// A participant joins.
    Join {
        /// Call.
        call: CallSlot,
        /// Participant.
        participant: ParticipantSlot,
    },

    /// A participant leaves.
    Leave {
        /// Call.
        call: CallSlot,
        /// Participant.
        participant: ParticipantSlot,
    },

    /// A participant's microphone toggled.
    MuteParticipant {
        /// Call.
        call: CallSlot,
        /// Participant.
        participant: ParticipantSlot,
        /// Muted.
        is_muted: bool,
    },

    /// A participant starts a stream.
    StartVideo {
        /// Call.
        call: CallSlot,
        /// Participant.
        participant: ParticipantSlot,
        /// Stream.
        stream: StreamSlot,
        /// Screen share instead of camera.
        screen_share: bool,
    },

    /// A participant stops a stream.
    StopVideo {
        /// Call.
        call: CallSlot,
        /// Participant.
        participant: ParticipantSlot,
        /// Stream.
        stream: StreamSlot,
    },

    /// A stream's media starts or stops flowing.
    SetAvailable {
        /// Call.
        call: CallSlot,
        /// Participant.
        participant: ParticipantSlot,
        /// Stream.
        stream: StreamSlot,
        /// Available.
        is_available: bool,
    },

    /// The UI renders a stream.
    Render {
        /// Call.
        call: CallSlot,
        /// Participant.
        participant: ParticipantSlot,
        /// Stream.
        stream: StreamSlot,
    },

    /// The UI disposes a stream's view.
    Dispose {
        /// Call.
        call: CallSlot,
        /// Participant.
        participant: ParticipantSlot,
        /// Stream.
        stream: StreamSlot,
    },

    /// A chat message arrives.
    ReceiveMessage {
        /// Thread.
        thread: ThreadSlot,
        /// Sequence number, also the message id.
        sequence: u8,
        /// Sender.
        sender: ParticipantSlot,
    },

    /// A chat message is deleted.
    DeleteMessage {
        /// Thread.
        thread: ThreadSlot,
        /// Sequence number of the message.
        sequence: u8,
    },

    /// The SDK fails while producing a call notification.
    SdkFailure {
        /// Call.
        call: CallSlot,
    },
}

impl Operation {
    /// Deterministic operation sequence expanded from `seed`.
    pub fn random_walk(seed: u64, steps: usize) -> Vec<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut bytes = vec![0u8; steps * 8];
        rng.fill_bytes(&mut bytes);

        let mut unstructured = Unstructured::new(&bytes);
        (0..steps).map_while(|_| Self::arbitrary(&mut unstructured).ok()).collect()
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with expected error.
    Error(OperationError),
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, OperationResult::Ok)
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// No such call.
    CallNotFound,
    /// The call is already active.
    CallExists,
    /// No such participant in the call.
    ParticipantNotFound,
    /// The participant is already in the call.
    ParticipantExists,
    /// No such stream, or a stream the snapshot never holds.
    StreamNotFound,
    /// The participant already has this stream.
    StreamExists,
    /// The stream carries no media to render.
    StreamUnavailable,
    /// The renderer or SDK refused.
    Rejected,
}
