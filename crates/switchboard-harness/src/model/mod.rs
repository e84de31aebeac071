//! Model-based testing.
//!
//! A [`ModelWorld`] is a reference implementation that tracks what the
//! snapshot should contain after each [`Operation`]. Tests apply the same
//! operations to the model and to a [`crate::SimWorld`], then compare
//! results and [`ObservableState`].

mod operation;
mod world;

pub use operation::{
    CALLS, CallSlot, LOCAL_USER, Operation, OperationError, OperationResult, PARTICIPANTS,
    ParticipantSlot, STREAMS, StreamSlot, THREADS, ThreadSlot, call_id, message_id, participant,
    stream_id, thread_id,
};
pub use world::{
    ModelWorld, ObservableCall, ObservableParticipant, ObservableState, ObservableStream,
};
