//! Adapter
//!
//! Bridges a calling and chat SDK's live object graph to the
//! [`switchboard_core::Store`].
//!
//! # Architecture
//!
//! The SDK is seen only through the traits in [`sdk`]. [`Adapter::attach`]
//! seeds the store from a root object, subscribes to it and every child
//! object, and from then on turns each notification into an
//! [`switchboard_core::Event`]. Children are subscribed and unsubscribed in
//! the same step as the event that adds or removes them.
//!
//! # Components
//!
//! - [`Adapter`]: attach, detach, and explicit view and device calls
//! - [`ViewRenderer`]: UI-layer hook that creates and disposes video surfaces
//! - [`sdk`]: the object-graph contract an SDK binding implements
//!
//! # Runtime
//!
//! Everything runs on one thread. Device list re-queries are async: an
//! adapter built with [`Adapter::with_spawner`] runs each on the given
//! [`TaskSpawner`] (a [`tokio::task::LocalSet`], for one), while a plain
//! [`Adapter::new`] queues them until [`Adapter::settle`] is awaited.

#![forbid(unsafe_code)]

mod adapter;
mod devices;
mod error;
mod project;
mod registry;
pub mod sdk;
mod view;

pub use adapter::Adapter;
pub use devices::TaskSpawner;
pub use error::{AdapterError, SdkError};
pub use registry::{EntityKey, SubscriptionToken};
pub use view::{ViewOptions, ViewRenderer, ViewTarget};
