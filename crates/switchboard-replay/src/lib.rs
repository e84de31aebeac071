//! Event log replay.
//!
//! Feeds a recorded sequence of [`Event`]s through a fresh [`Store`] and
//! renders the selector view-models a UI would see for one call and one chat
//! thread. Useful for reproducing a reported UI state from a captured log
//! without an SDK.
//!
//! # Log format
//!
//! A JSON array of events, each tagged by `"type"` with camelCase names and
//! fields, exactly as [`Event`] serializes:
//!
//! ```json
//! [
//!   { "type": "callStateChanged", "callId": "c1", "state": "Connected" },
//!   { "type": "callMuteChanged", "callId": "c1", "isMuted": true }
//! ]
//! ```
//!
//! # Components
//!
//! - [`ReplayConfig`]: local user, focus call/thread, render time
//! - [`Replay`]: store plus the selectors it renders
//! - [`Report`]: serialized view-models

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;

use std::{io::Read, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use switchboard_bindings::{
    CallPage, CallProps, ChatProps,
    call_controls::{
        CameraButton, CameraButtonSelector, MicrophoneButton, MicrophoneButtonSelector,
        ScreenShareButton, ScreenShareButtonSelector,
    },
    call_page_selector, camera_button_selector,
    chat::{
        ChatParticipantList, ChatParticipantListSelector, MessageThread, MessageThreadSelector,
        TypingIndicatorSelector, TypingIndicators,
    },
    chat_participant_list_selector, message_thread_selector, microphone_button_selector,
    page::CallPageSelector,
    participant_list_selector,
    participants::{ParticipantList, ParticipantListSelector},
    screen_share_button_selector, typing_indicator_selector,
    video_gallery::{VideoGallery, VideoGallerySelector},
    video_gallery_selector,
};
use switchboard_core::{CallId, CommunicationIdentifier, Event, Snapshot, Store, ThreadId};
use tracing::{debug, info};

pub use crate::error::ReplayError;

/// What to replay and which surfaces to render.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Local user the log was captured for.
    pub user: CommunicationIdentifier,
    /// Local display name.
    pub display_name: Option<String>,
    /// Call to render. Defaults to the first active call, then the most
    /// recently ended one.
    pub call_id: Option<CallId>,
    /// Thread to render. Defaults to the first known thread.
    pub thread_id: Option<ThreadId>,
    /// Clock used for typing indicator expiry.
    pub now: DateTime<Utc>,
}

impl ReplayConfig {
    /// Replay as `user`, rendering at `now`.
    pub fn new(user: CommunicationIdentifier, now: DateTime<Utc>) -> Self {
        Self { user, display_name: None, call_id: None, thread_id: None, now }
    }
}

/// Calling surfaces for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallReport {
    /// Call rendered.
    pub call_id: CallId,
    /// Top-level page.
    pub page: Arc<CallPage>,
    /// Participant list.
    pub participants: Arc<ParticipantList>,
    /// Video gallery.
    pub gallery: Arc<VideoGallery>,
    /// Microphone button.
    pub microphone: Arc<MicrophoneButton>,
    /// Camera button.
    pub camera: Arc<CameraButton>,
    /// Screen share button.
    pub screen_share: Arc<ScreenShareButton>,
}

/// Chat surfaces for one thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadReport {
    /// Thread rendered.
    pub thread_id: ThreadId,
    /// Message list.
    pub messages: Arc<MessageThread>,
    /// Typing indicator bar.
    pub typing: Arc<TypingIndicators>,
    /// Member list.
    pub participants: Arc<ChatParticipantList>,
}

/// View-models after a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Events dispatched.
    pub events: usize,
    /// Store version (committed snapshots).
    pub version: u64,
    /// Calling surfaces, when a call is known.
    pub call: Option<CallReport>,
    /// Chat surfaces, when a thread is known.
    pub thread: Option<ThreadReport>,
}

/// Parse an event log.
pub fn read_events(reader: impl Read) -> Result<Vec<Event>, ReplayError> {
    Ok(serde_json::from_reader(reader)?)
}

/// A store being fed a log, and the selectors rendering it.
pub struct Replay {
    config: ReplayConfig,
    store: Store,
    events: usize,
    call_page: CallPageSelector,
    participants: ParticipantListSelector,
    gallery: VideoGallerySelector,
    microphone: MicrophoneButtonSelector,
    camera: CameraButtonSelector,
    screen_share: ScreenShareButtonSelector,
    messages: MessageThreadSelector,
    typing: TypingIndicatorSelector,
    chat_participants: ChatParticipantListSelector,
}

impl Replay {
    /// Empty store for `config.user`.
    pub fn new(config: ReplayConfig) -> Self {
        let mut initial = Snapshot::new(config.user.clone());
        initial.display_name.clone_from(&config.display_name);
        Self {
            config,
            store: Store::new(initial),
            events: 0,
            call_page: call_page_selector(),
            participants: participant_list_selector(),
            gallery: video_gallery_selector(),
            microphone: microphone_button_selector(),
            camera: camera_button_selector(),
            screen_share: screen_share_button_selector(),
            messages: message_thread_selector(),
            typing: typing_indicator_selector(),
            chat_participants: chat_participant_list_selector(),
        }
    }

    /// The store being fed.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Dispatch one event.
    pub fn apply(&mut self, event: Event) {
        let before = self.store.version();
        let name = event.name();
        self.store.dispatch(event);
        self.events += 1;
        debug!(
            event = name,
            index = self.events - 1,
            changed = self.store.version() != before,
            "replayed"
        );
    }

    /// Dispatch every event in order.
    pub fn apply_all(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Render the configured surfaces against the current snapshot.
    pub fn report(&mut self) -> Report {
        let state = self.store.get_state();
        let call = self.focus_call(&state).map(|call_id| {
            let props = CallProps::new(call_id.clone());
            CallReport {
                call_id,
                page: self.call_page.select(&state, &props),
                participants: self.participants.select(&state, &props),
                gallery: self.gallery.select(&state, &props),
                microphone: self.microphone.select(&state, &props),
                camera: self.camera.select(&state, &props),
                screen_share: self.screen_share.select(&state, &props),
            }
        });
        let thread = self.focus_thread(&state).map(|thread_id| {
            let props = ChatProps::new(thread_id.clone(), self.config.now);
            ThreadReport {
                thread_id,
                messages: self.messages.select(&state, &props),
                typing: self.typing.select(&state, &props),
                participants: self.chat_participants.select(&state, &props),
            }
        });
        Report { events: self.events, version: self.store.version(), call, thread }
    }

    fn focus_call(&self, state: &Snapshot) -> Option<CallId> {
        if let Some(id) = &self.config.call_id {
            return Some(id.clone());
        }
        state
            .calls
            .keys()
            .next()
            .cloned()
            .or_else(|| state.calls_ended.last().map(|call| call.id.clone()))
    }

    fn focus_thread(&self, state: &Snapshot) -> Option<ThreadId> {
        if let Some(id) = &self.config.thread_id {
            return Some(id.clone());
        }
        state.threads.keys().next().cloned()
    }
}

impl std::fmt::Debug for Replay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replay")
            .field("config", &self.config)
            .field("events", &self.events)
            .field("version", &self.store.version())
            .finish_non_exhaustive()
    }
}

/// Replay `events` from an empty store and render the result.
pub fn replay(config: ReplayConfig, events: Vec<Event>) -> Report {
    info!(events = events.len(), user = %config.user.to_flat(), "replay starting");
    let mut replay = Replay::new(config);
    replay.apply_all(events);
    replay.report()
}

#[cfg(test)]
mod tests {
    use switchboard_core::state::{CallState, CallStatus};

    use super::*;

    fn config() -> ReplayConfig {
        ReplayConfig::new(CommunicationIdentifier::user("me"), DateTime::<Utc>::UNIX_EPOCH)
    }

    #[test]
    fn empty_log_renders_nothing() {
        let report = replay(config(), Vec::new());
        assert_eq!(report.events, 0);
        assert_eq!(report.version, 0);
        assert!(report.call.is_none());
        assert!(report.thread.is_none());
    }

    #[test]
    fn explicit_call_renders_configuration_before_it_exists() {
        let mut config = config();
        config.call_id = Some(CallId::new("later"));
        let report = replay(config, Vec::new());
        let call = report.call.expect("call report");
        assert_eq!(*call.page, CallPage::Configuration);
        assert_eq!(call.participants.participants.len(), 1);
    }

    #[test]
    fn first_active_call_is_the_default_focus() {
        let mut call = CallState::new(CallId::new("b"));
        call.state = CallStatus::Connected;
        let events = vec![
            Event::CallAdded { call },
            Event::CallAdded { call: CallState::new(CallId::new("c")) },
        ];

        let report = replay(config(), events);
        let call = report.call.expect("call report");
        assert_eq!(call.call_id, CallId::new("b"));
        assert_eq!(*call.page, CallPage::Call);
        assert_eq!(report.events, 2);
    }

    #[test]
    fn unchanged_state_reuses_view_models() {
        let mut replay = Replay::new(config());
        replay.apply(Event::CallAdded { call: CallState::new(CallId::new("a")) });
        let first = replay.report();
        let second = replay.report();
        let (first, second) = (first.call.expect("call"), second.call.expect("call"));
        assert!(Arc::ptr_eq(&first.gallery, &second.gallery));
        assert!(Arc::ptr_eq(&first.participants, &second.participants));
    }
}
