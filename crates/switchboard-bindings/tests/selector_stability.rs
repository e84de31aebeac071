//! Selector stability across reducer-produced snapshots.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use switchboard_bindings::{
    CallProps, ChatProps, MemoTable, TileProps, call_page_selector, microphone_button_selector,
    participant_list_selector, screen_share_button_selector, send_box_selector,
    video_gallery_selector, video_tile_selector,
};
use switchboard_core::{
    CallId, CommunicationIdentifier, Event, MessageId, ParticipantId, Snapshot, ThreadId, reduce,
    state::{CallState, CallStatus, MessageState, ParticipantState, ThreadState},
};

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).single().expect("valid timestamp")
}

fn apply(state: Arc<Snapshot>, events: impl IntoIterator<Item = Event>) -> Arc<Snapshot> {
    events.into_iter().fold(state, |state, event| reduce(&state, &event))
}

fn in_call() -> Arc<Snapshot> {
    let me = CommunicationIdentifier::user("me");
    let state = Arc::new(Snapshot::new(me).with_display_name("Me"));
    apply(state, [
        Event::CallAdded { call: CallState::new(CallId::from("c1")) },
        Event::CallStateChanged { call_id: CallId::from("c1"), state: CallStatus::Connected },
        Event::ParticipantAdded {
            call_id: CallId::from("c1"),
            participant: ParticipantState::new(CommunicationIdentifier::user("ann")),
        },
        Event::ParticipantAdded {
            call_id: CallId::from("c1"),
            participant: ParticipantState::new(CommunicationIdentifier::user("bob")),
        },
        Event::ThreadAdded { thread: ThreadState::new(ThreadId::from("t1")) },
    ])
}

#[test]
fn unrelated_changes_keep_call_view_models() {
    let props = CallProps::new("c1");
    let mut gallery = video_gallery_selector();
    let mut participants = participant_list_selector();
    let mut page = call_page_selector();

    let state = in_call();
    let gallery_before = gallery.select(&state, &props);
    let list_before = participants.select(&state, &props);
    let page_before = page.select(&state, &props);

    let next = apply(Arc::clone(&state), [Event::MessageReceived {
        thread_id: ThreadId::from("t1"),
        message: MessageState::text(MessageId::from("m1"), 1, "ann".into(), "hi", at(0)),
    }]);
    assert!(!Arc::ptr_eq(&state, &next));

    assert!(Arc::ptr_eq(&gallery_before, &gallery.select(&next, &props)));
    assert!(Arc::ptr_eq(&list_before, &participants.select(&next, &props)));
    assert!(Arc::ptr_eq(&page_before, &page.select(&next, &props)));
}

#[test]
fn one_participant_change_recomputes_one_tile() {
    let mut tiles = MemoTable::new(video_tile_selector);
    let tile_props = |id: &str| TileProps {
        call_id: CallId::from("c1"),
        participant_id: ParticipantId::from(id),
    };

    let state = in_call();
    let ann = tiles.get(ParticipantId::from("ann")).select(&state, &tile_props("ann"));
    let bob = tiles.get(ParticipantId::from("bob")).select(&state, &tile_props("bob"));

    let next = apply(state, [Event::ParticipantMuteChanged {
        call_id: CallId::from("c1"),
        participant_id: ParticipantId::from("bob"),
        is_muted: true,
    }]);

    let ann_after = tiles.get(ParticipantId::from("ann")).select(&next, &tile_props("ann"));
    let bob_after = tiles.get(ParticipantId::from("bob")).select(&next, &tile_props("bob"));
    assert!(Arc::ptr_eq(&ann, &ann_after));
    assert!(!Arc::ptr_eq(&bob, &bob_after));
    assert_eq!(Option::as_ref(&bob_after).map(|t| t.is_muted), Some(true));

    let left = apply(next, [Event::ParticipantRemoved {
        call_id: CallId::from("c1"),
        participant_id: ParticipantId::from("bob"),
    }]);
    assert!(tiles.get(ParticipantId::from("bob")).select(&left, &tile_props("bob")).is_none());
    assert!(tiles.release(&ParticipantId::from("bob")));
    assert_eq!(tiles.len(), 1);
}

#[test]
fn view_models_serialize_for_the_ui() {
    let state = in_call();
    let props = CallProps::new("c1");

    insta::assert_json_snapshot!(microphone_button_selector().select(&state, &props), @r#"
    {
      "disabled": false,
      "checked": true,
      "microphones": [],
      "speakers": [],
      "selectedMicrophone": null,
      "selectedSpeaker": null
    }
    "#);

    insta::assert_json_snapshot!(screen_share_button_selector().select(&state, &props), @r#"
    {
      "checked": false
    }
    "#);

    insta::assert_json_snapshot!(call_page_selector().select(&state, &props), @r#""call""#);

    insta::assert_json_snapshot!(
        send_box_selector().select(&state, &ChatProps::new("t1", at(0))),
        @r#"
    {
      "userId": "me",
      "displayName": "Me"
    }
    "#
    );
}

proptest! {
    #[test]
    fn repeated_select_is_pointer_stable(mutes in prop::collection::vec(any::<bool>(), 0..8)) {
        let props = CallProps::new("c1");
        let mut gallery = video_gallery_selector();
        let mut state = in_call();

        for is_muted in mutes {
            let event = Event::CallMuteChanged { call_id: CallId::from("c1"), is_muted };
            state = apply(state, [event]);
            let first = gallery.select(&state, &props);
            let second = gallery.select(&state, &props);
            prop_assert!(Arc::ptr_eq(&first, &second));
            prop_assert_eq!(first.local_participant.is_muted, is_muted);
        }
    }
}
