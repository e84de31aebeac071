//! Bindings
//!
//! Memoized view-models ("selectors") derived from a
//! [`switchboard_core::Snapshot`].
//!
//! # Architecture
//!
//! Every selector is a [`Selector`]: extractors from [`base`] read inputs out
//! of the snapshot, and a combiner builds the view-model. The combiner runs
//! only when an input changed by [`Identity`], so a UI that compares results
//! with [`std::sync::Arc::ptr_eq`] re-renders only what changed.
//!
//! # Components
//!
//! - [`memo`]: [`Identity`], [`Memo`], [`Selector`], [`MemoTable`]
//! - [`base`]: extractors and selector props
//! - [`call_controls`], [`participants`], [`video_gallery`], [`page`]: calling
//!   surfaces
//! - [`chat`]: message thread, typing indicator, member list, send box

#![forbid(unsafe_code)]

pub mod base;
pub mod call_controls;
pub mod chat;
pub mod memo;
pub mod page;
pub mod participants;
pub mod video_gallery;

pub use base::{CallProps, ChatProps, TileProps};
pub use call_controls::{
    camera_button_selector, devices_button_selector, microphone_button_selector,
    screen_share_button_selector,
};
pub use chat::{
    TYPING_INDICATOR_MAX_AGE, chat_participant_list_selector, message_thread_selector,
    send_box_selector, typing_indicator_selector,
};
pub use memo::{Identity, Memo, MemoTable, Selector};
pub use page::{CallPage, call_page_selector};
pub use participants::participant_list_selector;
pub use video_gallery::{video_gallery_selector, video_tile_selector};
