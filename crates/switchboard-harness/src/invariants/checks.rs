//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::{BTreeSet, HashSet};

use switchboard_core::state::MAX_ENDED_CALLS;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// The local user is never a remote participant.
///
/// Holds for active calls and for the ended-call history alike.
pub struct NoLocalUserInParticipants;

impl Invariant for NoLocalUserInParticipants {
    fn name(&self) -> &'static str {
        "no_local_user_in_participants"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let local = state.state.local_participant_id();
        let calls = state.state.calls.values().chain(state.state.calls_ended.iter());
        for call in calls {
            if call.remote_participants.contains_key(&local) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("call {}: local user {local} listed as remote", call.id),
                });
            }
        }
        Ok(())
    }
}

/// Subscribed entities are exactly the entities in the snapshot.
///
/// A subscribed entity missing from the snapshot is a leaked listener; an
/// entity without a subscription will never see another update.
pub struct ListenerSetMatchesEntities;

impl Invariant for ListenerSetMatchesEntities {
    fn name(&self) -> &'static str {
        "listener_set_matches_entities"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(live) = &state.live_entities else {
            return Ok(());
        };
        let expected = state.snapshot_entities();
        if *live == expected {
            return Ok(());
        }

        let leaked: Vec<_> = live.difference(&expected).collect();
        let orphaned: Vec<_> = expected.difference(live).collect();
        Err(Violation {
            invariant: self.name(),
            message: format!("leaked listeners {leaked:?}, unsubscribed entities {orphaned:?}"),
        })
    }
}

/// Every view in the snapshot is a live surface, and every live surface is
/// referenced by exactly one view.
pub struct ViewsOnlyOnLiveStreams;

impl Invariant for ViewsOnlyOnLiveStreams {
    fn name(&self) -> &'static str {
        "views_only_on_live_streams"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let handles = state.snapshot_views();
        let mut seen = BTreeSet::new();
        for handle in &handles {
            if !seen.insert(*handle) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("handle {handle} attached twice"),
                });
            }
        }

        let Some(live) = &state.live_views else {
            return Ok(());
        };
        if *live == seen {
            return Ok(());
        }

        let leaked: Vec<_> = live.difference(&seen).collect();
        let disposed: Vec<_> = seen.difference(live).collect();
        Err(Violation {
            invariant: self.name(),
            message: format!(
                "surfaces never disposed {leaked:?}, disposed but attached {disposed:?}"
            ),
        })
    }
}

/// Messages in a thread are in sequence order and ids are unique.
pub struct MessagesOrderedAndUnique;

impl Invariant for MessagesOrderedAndUnique {
    fn name(&self) -> &'static str {
        "messages_ordered_and_unique"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (thread_id, thread) in state.state.threads.iter() {
            for window in thread.messages.windows(2) {
                if window[1].sequence_id < window[0].sequence_id {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "thread {thread_id}: sequence {} after {}",
                            window[1].sequence_id, window[0].sequence_id
                        ),
                    });
                }
            }

            let mut ids = HashSet::new();
            if let Some(duplicate) = thread.messages.iter().find(|m| !ids.insert(&m.id)) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("thread {thread_id}: message {} stored twice", duplicate.id),
                });
            }
        }
        Ok(())
    }
}

/// The ended-call history stays bounded and holds each call once.
pub struct EndedCallsBounded;

impl Invariant for EndedCallsBounded {
    fn name(&self) -> &'static str {
        "ended_calls_bounded"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let ended = &state.state.calls_ended;
        if ended.len() > MAX_ENDED_CALLS {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{} ended calls kept, limit {MAX_ENDED_CALLS}", ended.len()),
            });
        }
        let mut ids = HashSet::new();
        if let Some(duplicate) = ended.iter().find(|c| !ids.insert(&c.id)) {
            return Err(Violation {
                invariant: self.name(),
                message: format!("call {} ended twice in history", duplicate.id),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, sync::Arc};

    use switchboard_adapter::EntityKey;
    use switchboard_core::{
        CallId, CommunicationIdentifier, MessageId, Snapshot, ThreadId,
        state::{CallState, MessageState, ParticipantState, ThreadState},
    };

    use super::*;

    fn with_call(participant: &str) -> Snapshot {
        let mut state = Snapshot::new(CommunicationIdentifier::user("me"));
        let mut call = CallState::new(CallId::from("c1"));
        let p = ParticipantState::new(CommunicationIdentifier::user(participant));
        Arc::make_mut(&mut call.remote_participants).insert(p.id(), Arc::new(p));
        Arc::make_mut(&mut state.calls).insert(call.id.clone(), Arc::new(call));
        state
    }

    #[test]
    fn local_user_as_remote_is_a_violation() {
        let ok = SystemSnapshot::new(Arc::new(with_call("bob")));
        assert!(NoLocalUserInParticipants.check(&ok).is_ok());

        let bad = SystemSnapshot::new(Arc::new(with_call("me")));
        let violation = NoLocalUserInParticipants.check(&bad).unwrap_err();
        assert_eq!(violation.invariant, "no_local_user_in_participants");
    }

    #[test]
    fn listener_set_reports_leaks_and_orphans() {
        let mut snapshot = SystemSnapshot::new(Arc::new(with_call("bob")));
        assert!(ListenerSetMatchesEntities.check(&snapshot).is_ok());

        snapshot.live_entities = Some(BTreeSet::from([EntityKey::Call(CallId::from("c1"))]));
        let violation = ListenerSetMatchesEntities.check(&snapshot).unwrap_err();
        assert!(violation.message.contains("unsubscribed"), "{violation}");

        snapshot.live_entities = Some(snapshot.snapshot_entities());
        assert!(ListenerSetMatchesEntities.check(&snapshot).is_ok());
    }

    #[test]
    fn out_of_order_messages_are_a_violation() {
        let mut state = Snapshot::new(CommunicationIdentifier::user("me"));
        let mut thread = ThreadState::new(ThreadId::from("t1"));
        let at = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
        Arc::make_mut(&mut thread.messages).extend([
            Arc::new(MessageState::text(MessageId::from("m2"), 2, "bob".into(), "b", at)),
            Arc::new(MessageState::text(MessageId::from("m1"), 1, "bob".into(), "a", at)),
        ]);
        Arc::make_mut(&mut state.threads).insert(thread.thread_id.clone(), Arc::new(thread));

        let snapshot = SystemSnapshot::new(Arc::new(state));
        assert!(MessagesOrderedAndUnique.check(&snapshot).is_err());
    }
}
