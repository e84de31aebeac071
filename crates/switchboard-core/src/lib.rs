//! Switchboard state core.
//!
//! An immutable, serializable projection of a calling and chat SDK's object
//! graph. The pieces, leaves first:
//!
//! - [`state`]: the [`Snapshot`] tree. Every independently changing branch is
//!   an [`std::sync::Arc`] so unchanged branches are shared between versions.
//! - [`Event`]: typed records of what the SDK reported.
//! - [`reduce`]: pure copy-on-write transitions from one snapshot to the next.
//! - [`Store`]: holds the current snapshot, applies updates in order, and
//!   notifies listeners once per committed change.
//!
//! The crate is single-threaded by construction. Nothing here talks to the
//! SDK; `switchboard-adapter` turns SDK notifications into [`Event`]s.

#![forbid(unsafe_code)]

mod error;
mod event;
mod identifier;
mod reducer;
pub mod state;
mod store;

pub use error::CoreError;
pub use event::Event;
pub use identifier::{
    CallId, CommunicationIdentifier, MessageId, ParticipantId, StreamId, TeamsCloud, ThreadId,
};
pub use reducer::reduce;
pub use state::Snapshot;
pub use store::{ListenerId, Store};
