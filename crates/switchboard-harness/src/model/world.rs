//! Model world: the reference the real adapter is checked against.
//!
//! The model keeps plain maps of what should be in the snapshot and applies
//! each [`Operation`] directly, with no SDK objects, listeners, or renderer
//! in between.

use std::collections::BTreeMap;

use serde::Serialize;
use switchboard_core::{CallId, MessageId, ParticipantId, Snapshot, StreamId, ThreadId};

use super::operation::{
    self, CallSlot, Operation, OperationError, OperationResult, ParticipantSlot, StreamSlot,
    THREADS,
};

/// Subset of the snapshot compared between model and real system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservableState {
    /// Active calls.
    pub calls: BTreeMap<CallId, ObservableCall>,
    /// Per thread, `(message, deleted)` in sequence order.
    pub threads: BTreeMap<ThreadId, Vec<(MessageId, bool)>>,
}

/// Observable part of a call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservableCall {
    /// Local microphone muted.
    pub is_muted: bool,
    /// Remote participants.
    pub participants: BTreeMap<ParticipantId, ObservableParticipant>,
}

/// Observable part of a participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservableParticipant {
    /// Muted.
    pub is_muted: bool,
    /// Streams.
    pub streams: BTreeMap<StreamId, ObservableStream>,
}

/// Observable part of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ObservableStream {
    /// Media flowing.
    pub is_available: bool,
    /// A view is attached.
    pub rendered: bool,
}

impl ObservableState {
    /// Project a snapshot.
    pub fn from_snapshot(state: &Snapshot) -> Self {
        let calls = state
            .calls
            .iter()
            .map(|(id, call)| {
                let participants = call
                    .remote_participants
                    .iter()
                    .map(|(id, p)| {
                        let streams = p
                            .video_streams
                            .iter()
                            .map(|(id, s)| {
                                let stream = ObservableStream {
                                    is_available: s.is_available,
                                    rendered: s.view.is_some(),
                                };
                                (id.clone(), stream)
                            })
                            .collect();
                        (id.clone(), ObservableParticipant { is_muted: p.is_muted, streams })
                    })
                    .collect();
                (id.clone(), ObservableCall { is_muted: call.is_muted, participants })
            })
            .collect();

        let threads = state
            .threads
            .iter()
            .map(|(id, thread)| {
                let messages =
                    thread.messages.iter().map(|m| (m.id.clone(), m.is_deleted())).collect();
                (id.clone(), messages)
            })
            .collect();

        Self { calls, threads }
    }
}

#[derive(Debug, Clone, Default)]
struct ModelCall {
    is_muted: bool,
    // The local user is tracked here but never observable.
    participants: BTreeMap<ParticipantId, ObservableParticipant>,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    local: ParticipantId,
    calls: BTreeMap<CallId, ModelCall>,
    threads: BTreeMap<ThreadId, BTreeMap<u8, bool>>,
}

impl Default for ModelWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelWorld {
    /// World with no calls and [`THREADS`] empty threads.
    pub fn new() -> Self {
        let threads =
            (0..THREADS).map(|slot| (operation::thread_id(slot), BTreeMap::new())).collect();
        Self {
            local: operation::participant(0).to_flat(),
            calls: BTreeMap::new(),
            threads,
        }
    }

    /// Apply an operation and return the result.
    ///
    /// The result should match the real implementation's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match self.try_apply(op) {
            Ok(()) => OperationResult::Ok,
            Err(err) => OperationResult::Error(err),
        }
    }

    fn try_apply(&mut self, op: &Operation) -> Result<(), OperationError> {
        match *op {
            Operation::StartCall { call } => {
                let id = operation::call_id(call);
                if self.calls.contains_key(&id) {
                    return Err(OperationError::CallExists);
                }
                self.calls.insert(id, ModelCall::default());
            },
            Operation::EndCall { call, .. } => {
                self.calls.remove(&operation::call_id(call)).ok_or(OperationError::CallNotFound)?;
            },
            Operation::SetMuted { call, is_muted } => {
                self.call(call)?.is_muted = is_muted;
            },
            Operation::Join { call, participant } => {
                let id = operation::participant(participant).to_flat();
                let call = self.call(call)?;
                if call.participants.contains_key(&id) {
                    return Err(OperationError::ParticipantExists);
                }
                call.participants.insert(id, ObservableParticipant::default());
            },
            Operation::Leave { call, participant } => {
                let id = operation::participant(participant).to_flat();
                self.call(call)?
                    .participants
                    .remove(&id)
                    .ok_or(OperationError::ParticipantNotFound)?;
            },
            Operation::MuteParticipant { call, participant, is_muted } => {
                self.participant(call, participant)?.is_muted = is_muted;
            },
            Operation::StartVideo { call, participant, stream, .. } => {
                let id = operation::stream_id(stream);
                let participant = self.participant(call, participant)?;
                if participant.streams.contains_key(&id) {
                    return Err(OperationError::StreamExists);
                }
                participant
                    .streams
                    .insert(id, ObservableStream { is_available: true, rendered: false });
            },
            Operation::StopVideo { call, participant, stream } => {
                let id = operation::stream_id(stream);
                self.participant(call, participant)?
                    .streams
                    .remove(&id)
                    .ok_or(OperationError::StreamNotFound)?;
            },
            Operation::SetAvailable { call, participant, stream, is_available } => {
                self.stream(call, participant, stream)?.is_available = is_available;
            },
            Operation::Render { call, participant: slot, stream } => {
                let is_local = self.is_local(slot);
                let stream = self.stream(call, slot, stream)?;
                if is_local {
                    return Err(OperationError::StreamNotFound);
                }
                if !stream.rendered && !stream.is_available {
                    return Err(OperationError::StreamUnavailable);
                }
                stream.rendered = true;
            },
            Operation::Dispose { call, participant, stream } => {
                self.stream(call, participant, stream)?.rendered = false;
            },
            Operation::ReceiveMessage { thread, sequence, .. } => {
                if let Some(messages) = self.threads.get_mut(&operation::thread_id(thread)) {
                    messages.entry(sequence).or_insert(false);
                }
            },
            Operation::DeleteMessage { thread, sequence } => {
                if let Some(deleted) = self
                    .threads
                    .get_mut(&operation::thread_id(thread))
                    .and_then(|messages| messages.get_mut(&sequence))
                {
                    *deleted = true;
                }
            },
            Operation::SdkFailure { call } => {
                self.call(call)?;
            },
        }
        Ok(())
    }

    fn is_local(&self, slot: ParticipantSlot) -> bool {
        operation::participant(slot).to_flat() == self.local
    }

    fn call(&mut self, slot: CallSlot) -> Result<&mut ModelCall, OperationError> {
        self.calls.get_mut(&operation::call_id(slot)).ok_or(OperationError::CallNotFound)
    }

    fn participant(
        &mut self,
        call: CallSlot,
        slot: ParticipantSlot,
    ) -> Result<&mut ObservableParticipant, OperationError> {
        let id = operation::participant(slot).to_flat();
        self.call(call)?.participants.get_mut(&id).ok_or(OperationError::ParticipantNotFound)
    }

    fn stream(
        &mut self,
        call: CallSlot,
        participant: ParticipantSlot,
        slot: StreamSlot,
    ) -> Result<&mut ObservableStream, OperationError> {
        let id = operation::stream_id(slot);
        self.participant(call, participant)?
            .streams
            .get_mut(&id)
            .ok_or(OperationError::StreamNotFound)
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let calls = self
            .calls
            .iter()
            .map(|(id, call)| {
                let participants = call
                    .participants
                    .iter()
                    .filter(|(id, _)| **id != self.local)
                    .map(|(id, p)| (id.clone(), p.clone()))
                    .collect();
                (id.clone(), ObservableCall { is_muted: call.is_muted, participants })
            })
            .collect();

        let threads = self
            .threads
            .iter()
            .map(|(id, messages)| {
                let messages = messages
                    .iter()
                    .map(|(sequence, deleted)| (operation::message_id(*sequence), *deleted))
                    .collect();
                (id.clone(), messages)
            })
            .collect();

        ObservableState { calls, threads }
    }
}
