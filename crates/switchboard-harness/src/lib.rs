//! Test harness for switchboard.
//!
//! In-process fakes of the SDK object graph that emit notifications
//! synchronously, plus a recording view renderer, so adapter behavior can be
//! driven step by step without a real SDK.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the [`ModelWorld`] and a
//! [`SimWorld`] running the real store and adapter, and their observable
//! states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the common
//! snapshot, listener, and view invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fake;
pub mod invariants;
pub mod model;
pub mod sim_world;

pub use fake::{
    Emitter, FakeCall, FakeCallAgent, FakeChatClient, FakeDeviceManager, FakeParticipant,
    FakeStream, RecordingRenderer,
};
pub use invariants::{
    EndedCallsBounded, Invariant, InvariantRegistry, InvariantResult, ListenerSetMatchesEntities,
    MessagesOrderedAndUnique, NoLocalUserInParticipants, SystemSnapshot, Violation,
    ViewsOnlyOnLiveStreams,
};
pub use model::{
    ModelWorld, ObservableCall, ObservableParticipant, ObservableState, ObservableStream,
    Operation, OperationError, OperationResult,
};
pub use sim_world::SimWorld;
