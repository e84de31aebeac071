//! Simulated world: the real store and adapter driven through fake SDK
//! objects.
//!
//! [`SimWorld::apply`] turns each [`Operation`] into the SDK-side mutation
//! that would cause it (a call appearing on the agent, a stream starting) or
//! the UI-side adapter call (render, dispose), and reports the same
//! [`OperationResult`] the [`crate::ModelWorld`] computes.

use std::rc::Rc;

use chrono::{DateTime, TimeDelta, Utc};
use switchboard_adapter::{
    Adapter, AdapterError, SubscriptionToken, ViewOptions, ViewRenderer, ViewTarget,
    sdk::{CallAgentObject, ChatClientObject, ChatNotification, EventKind, SdkRoot},
};
use switchboard_core::{
    CallId, Snapshot, Store,
    state::{CallEndReason, CallStatus, MediaStreamType, MessageState, ThreadState},
};
use tracing::trace;

use crate::{
    fake::{
        FakeCall, FakeCallAgent, FakeChatClient, FakeParticipant, FakeStream, RecordingRenderer,
    },
    invariants::{InvariantRegistry, SystemSnapshot, Violation},
    model::{self, ObservableState, Operation, OperationError, OperationResult, THREADS},
};

/// Real system under test.
pub struct SimWorld {
    adapter: Adapter,
    renderer: Rc<RecordingRenderer>,
    agent: Rc<FakeCallAgent>,
    chat: Rc<FakeChatClient>,
    tokens: Vec<SubscriptionToken>,
    invariants: InvariantRegistry,
}

impl SimWorld {
    /// Store, adapter, and renderer with a call agent and a chat client
    /// attached. The chat client knows [`THREADS`] empty threads.
    pub fn new() -> Result<Self, AdapterError> {
        let local = model::participant(0);
        let store = Rc::new(Store::new(Snapshot::new(local)));
        let renderer = RecordingRenderer::new();
        let adapter = Adapter::new(store, Rc::clone(&renderer) as Rc<dyn ViewRenderer>);

        let agent = FakeCallAgent::new(Some("Local User"));
        let threads = (0..THREADS).map(|slot| ThreadState::new(model::thread_id(slot))).collect();
        let chat = FakeChatClient::new(threads);

        // Neither root touches a device manager, so attach completes on first poll.
        let tokens = futures::executor::block_on(async {
            let calls = Rc::clone(&agent) as Rc<dyn CallAgentObject>;
            let calls = adapter.attach(SdkRoot::CallAgent(calls)).await?;
            let chat = Rc::clone(&chat) as Rc<dyn ChatClientObject>;
            let chat = adapter.attach(SdkRoot::ChatClient(chat)).await?;
            Ok::<_, AdapterError>(vec![calls, chat])
        })?;

        Ok(Self {
            adapter,
            renderer,
            agent,
            chat,
            tokens,
            invariants: InvariantRegistry::standard(),
        })
    }

    /// The adapter under test.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// The recording renderer.
    pub fn renderer(&self) -> &Rc<RecordingRenderer> {
        &self.renderer
    }

    /// The fake call agent.
    pub fn agent(&self) -> &Rc<FakeCallAgent> {
        &self.agent
    }

    /// The fake chat client.
    pub fn chat(&self) -> &Rc<FakeChatClient> {
        &self.chat
    }

    /// Release every subscription.
    pub fn detach_all(&mut self) {
        for token in self.tokens.drain(..) {
            self.adapter.detach(token);
        }
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        trace!(?op, "apply");
        match self.try_apply(op) {
            Ok(()) => OperationResult::Ok,
            Err(err) => OperationResult::Error(err),
        }
    }

    fn try_apply(&mut self, op: &Operation) -> Result<(), OperationError> {
        match *op {
            Operation::StartCall { call } => {
                let id = model::call_id(call);
                if self.agent.call(&id).is_some() {
                    return Err(OperationError::CallExists);
                }
                self.agent.add_call(FakeCall::new(id, CallStatus::Connected));
            },
            Operation::EndCall { call, removed } => {
                let id = model::call_id(call);
                let fake = self.call(&id)?;
                fake.end(if removed { CallEndReason::REMOVED } else { CallEndReason::default() });
                self.agent.remove_call(&id);
            },
            Operation::SetMuted { call, is_muted } => {
                self.call(&model::call_id(call))?.set_muted(is_muted);
            },
            Operation::Join { call, participant } => {
                let identifier = model::participant(participant);
                let fake = self.call(&model::call_id(call))?;
                if fake.participant(&identifier.to_flat()).is_some() {
                    return Err(OperationError::ParticipantExists);
                }
                fake.add_participant(FakeParticipant::new(identifier));
            },
            Operation::Leave { call, participant } => {
                let id = model::participant(participant).to_flat();
                self.call(&model::call_id(call))?
                    .remove_participant(&id)
                    .ok_or(OperationError::ParticipantNotFound)?;
            },
            Operation::MuteParticipant { call, participant, is_muted } => {
                self.participant(call, participant)?.set_muted(is_muted);
            },
            Operation::StartVideo { call, participant, stream, screen_share } => {
                let id = model::stream_id(stream);
                let fake = self.participant(call, participant)?;
                if fake.stream(&id).is_some() {
                    return Err(OperationError::StreamExists);
                }
                let media_stream_type = if screen_share {
                    MediaStreamType::ScreenSharing
                } else {
                    MediaStreamType::Video
                };
                fake.add_stream(FakeStream::new(id, media_stream_type, true));
            },
            Operation::StopVideo { call, participant, stream } => {
                self.participant(call, participant)?
                    .remove_stream(&model::stream_id(stream))
                    .ok_or(OperationError::StreamNotFound)?;
            },
            Operation::SetAvailable { call, participant, stream, is_available } => {
                self.stream(call, participant, stream)?.set_available(is_available);
            },
            Operation::Render { call, participant, stream } => {
                self.stream(call, participant, stream)?;
                let target = remote_target(call, participant, stream);
                self.adapter.create_view(&target, ViewOptions::default()).map_err(expected)?;
            },
            Operation::Dispose { call, participant, stream } => {
                self.stream(call, participant, stream)?;
                self.adapter.dispose_view(&remote_target(call, participant, stream));
            },
            Operation::ReceiveMessage { thread, sequence, sender } => {
                let sender = model::participant(sender).to_flat();
                let message = MessageState::text(
                    model::message_id(sequence),
                    u64::from(sequence),
                    sender,
                    format!("message {sequence}"),
                    at(sequence),
                );
                self.chat.notify(ChatNotification::MessageReceived {
                    thread_id: model::thread_id(thread),
                    message,
                });
            },
            Operation::DeleteMessage { thread, sequence } => {
                self.chat.notify(ChatNotification::MessageDeleted {
                    thread_id: model::thread_id(thread),
                    message_id: model::message_id(sequence),
                    deleted_on: at(u8::MAX),
                });
            },
            Operation::SdkFailure { call } => {
                self.call(&model::call_id(call))?
                    .emitter
                    .fail(EventKind::StateChanged, "media stack restarted");
            },
        }
        Ok(())
    }

    fn call(&self, id: &CallId) -> Result<Rc<FakeCall>, OperationError> {
        self.agent.call(id).ok_or(OperationError::CallNotFound)
    }

    fn participant(&self, call: u8, slot: u8) -> Result<Rc<FakeParticipant>, OperationError> {
        let id = model::participant(slot).to_flat();
        self.call(&model::call_id(call))?
            .participant(&id)
            .ok_or(OperationError::ParticipantNotFound)
    }

    fn stream(
        &self,
        call: u8,
        participant: u8,
        slot: u8,
    ) -> Result<Rc<FakeStream>, OperationError> {
        self.participant(call, participant)?
            .stream(&model::stream_id(slot))
            .ok_or(OperationError::StreamNotFound)
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState::from_snapshot(&self.adapter.store().get_state())
    }

    /// Capture the store, listener set, and live surfaces.
    pub fn capture(&self) -> SystemSnapshot {
        SystemSnapshot::capture(&self.adapter, &self.renderer)
    }

    /// Run the standard invariants against a fresh capture.
    pub fn check_invariants(&self) -> Result<(), Vec<Violation>> {
        self.invariants.check_all(&self.capture())
    }
}

impl std::fmt::Debug for SimWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimWorld")
            .field("adapter", &self.adapter)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

fn remote_target(call: u8, participant: u8, stream: u8) -> ViewTarget {
    ViewTarget::Remote {
        call_id: model::call_id(call),
        participant_id: model::participant(participant).to_flat(),
        stream_id: model::stream_id(stream),
    }
}

fn at(offset: u8) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(i64::from(offset))
}

fn expected(err: AdapterError) -> OperationError {
    match err {
        AdapterError::CallNotFound(_) => OperationError::CallNotFound,
        AdapterError::StreamNotFound { .. } => OperationError::StreamNotFound,
        AdapterError::StreamUnavailable { .. } => OperationError::StreamUnavailable,
        AdapterError::Sdk(_) | AdapterError::NoLocalStream(_) | AdapterError::NoDeviceManager => {
            OperationError::Rejected
        },
    }
}
