//! Store ordering, reentrancy, and notification tests.

use std::{
    cell::{Cell, RefCell},
    panic::{AssertUnwindSafe, catch_unwind},
    rc::Rc,
    sync::Arc,
};

use switchboard_core::{
    CallId, CommunicationIdentifier, Event, ParticipantId, Snapshot, Store, StreamId,
    state::{CallState, CallStatus, MediaStreamType, ParticipantState, VideoStreamState},
};

fn store() -> Rc<Store> {
    Rc::new(Store::new(Snapshot::new(CommunicationIdentifier::user("me"))))
}

fn call_status(store: &Store) -> Option<CallStatus> {
    store.get_state().call(&CallId::from("c1")).map(|c| c.state)
}

#[test]
fn alice_scenario_keeps_stream_map_reference() {
    let store = store();
    store.dispatch(Event::CallAdded { call: CallState::new("c1".into()) });

    store.dispatch(Event::ParticipantAdded {
        call_id: "c1".into(),
        participant: ParticipantState::new(CommunicationIdentifier::user("u1"))
            .with_display_name("Alice"),
    });
    let state = store.get_state();
    let alice = &state.calls[&CallId::from("c1")].remote_participants[&ParticipantId::from("u1")];
    assert_eq!(alice.display_name.as_deref(), Some("Alice"));

    store.dispatch(Event::StreamAdded {
        call_id: "c1".into(),
        participant_id: "u1".into(),
        stream: VideoStreamState::new("s1".into(), MediaStreamType::Video, true),
    });
    let before = store.get_state();
    let streams_before = Arc::clone(
        &before.calls[&CallId::from("c1")].remote_participants[&ParticipantId::from("u1")]
            .video_streams,
    );
    assert!(streams_before[&StreamId::from("s1")].is_available);

    store.dispatch(Event::ParticipantMuteChanged {
        call_id: "c1".into(),
        participant_id: "u1".into(),
        is_muted: true,
    });
    let after = store.get_state();
    let alice = &after.calls[&CallId::from("c1")].remote_participants[&ParticipantId::from("u1")];
    assert!(alice.is_muted);
    assert!(Arc::ptr_eq(&alice.video_streams, &streams_before));
    assert_eq!(alice.display_name.as_deref(), Some("Alice"));
}

#[test]
fn reentrant_updates_are_queued_in_order() {
    let store = store();
    store.dispatch(Event::CallAdded { call: CallState::new("c1".into()) });

    let observed = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&observed);
    let weak = Rc::downgrade(&store);
    store.on_change(move |snapshot| {
        let status = snapshot.call(&CallId::from("c1")).map(|c| c.state);
        log.borrow_mut().push(status);
        if status == Some(CallStatus::Connecting)
            && let Some(store) = weak.upgrade()
        {
            store.dispatch(Event::CallStateChanged {
                call_id: "c1".into(),
                state: CallStatus::Connected,
            });
        }
    });

    store.dispatch(Event::CallStateChanged { call_id: "c1".into(), state: CallStatus::Connecting });

    assert_eq!(*observed.borrow(), [Some(CallStatus::Connecting), Some(CallStatus::Connected)]);
    assert_eq!(call_status(&store), Some(CallStatus::Connected));
}

#[test]
fn listener_sees_latest_state_through_get_state() {
    let store = store();
    let matched = Rc::new(Cell::new(true));
    let flag = Rc::clone(&matched);
    let weak = Rc::downgrade(&store);
    store.on_change(move |snapshot| {
        if let Some(store) = weak.upgrade() {
            flag.set(flag.get() && Arc::ptr_eq(&store.get_state(), snapshot));
        }
    });

    store.dispatch(Event::CallAdded { call: CallState::new("c1".into()) });
    store.dispatch(Event::CallMuteChanged { call_id: "c1".into(), is_muted: true });
    assert!(matched.get());
}

#[test]
fn listener_removed_during_notification_still_completes_round() {
    let store = store();
    let second_calls = Rc::new(Cell::new(0));

    let weak = Rc::downgrade(&store);
    let removed = Rc::new(Cell::new(None));
    let target = Rc::clone(&removed);
    store.on_change(move |_| {
        if let (Some(store), Some(id)) = (weak.upgrade(), target.take()) {
            store.off_change(id);
        }
    });
    let counter = Rc::clone(&second_calls);
    let id = store.on_change(move |_| counter.set(counter.get() + 1));
    removed.set(Some(id));

    store.dispatch(Event::CallAdded { call: CallState::new("c1".into()) });
    store.dispatch(Event::CallMuteChanged { call_id: "c1".into(), is_muted: true });
    assert_eq!(second_calls.get(), 1);
}

#[test]
fn panicking_updater_does_not_wedge_the_store() {
    let store = store();
    let result = catch_unwind(AssertUnwindSafe(|| {
        store.set_state(|_| panic!("updater failure"));
    }));
    assert!(result.is_err());

    store.dispatch(Event::CallAdded { call: CallState::new("c1".into()) });
    assert_eq!(call_status(&store), Some(CallStatus::None));
}

#[tokio::test]
async fn watch_channel_tracks_commits() {
    let store = store();
    let mut rx = store.subscribe();
    assert!(rx.borrow().calls.is_empty());

    store.dispatch(Event::CallAdded { call: CallState::new("c1".into()) });
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().call(&CallId::from("c1")).is_some());

    store.dispatch(Event::CallRemoved { call_id: "missing".into() });
    assert!(!rx.has_changed().unwrap());
}
