//! Chat thread reducers.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};

use super::{replace_root, update_thread};
use crate::{
    MessageId, ParticipantId, ThreadId,
    state::{ChatParticipant, MessageState, ReadReceipt, Snapshot, ThreadState, TypingIndicator},
};

/// Thread with messages sorted by sequence id and duplicate ids removed.
fn normalized(thread: &ThreadState) -> ThreadState {
    let mut seen = HashSet::new();
    let mut messages: Vec<Arc<MessageState>> =
        thread.messages.iter().filter(|m| seen.insert(m.id.clone())).cloned().collect();
    messages.sort_by_key(|m| m.sequence_id);
    ThreadState { messages: Arc::new(messages), ..thread.clone() }
}

pub(super) fn thread_added(state: &Arc<Snapshot>, thread: &ThreadState) -> Arc<Snapshot> {
    if state.threads.contains_key(&thread.thread_id) {
        return Arc::clone(state);
    }
    let thread = normalized(thread);
    replace_root(state, |s| {
        Arc::make_mut(&mut s.threads).insert(thread.thread_id.clone(), Arc::new(thread));
    })
}

pub(super) fn thread_removed(state: &Arc<Snapshot>, thread_id: &ThreadId) -> Arc<Snapshot> {
    if !state.threads.contains_key(thread_id) {
        return Arc::clone(state);
    }
    replace_root(state, |s| {
        Arc::make_mut(&mut s.threads).remove(thread_id);
    })
}

pub(super) fn participants_added(
    state: &Arc<Snapshot>,
    thread_id: &ThreadId,
    participants: &[ChatParticipant],
) -> Arc<Snapshot> {
    update_thread(state, thread_id, |thread| {
        let fresh: Vec<&ChatParticipant> = participants
            .iter()
            .filter(|p| thread.participants.get(&p.id()) != Some(*p))
            .collect();
        if fresh.is_empty() {
            return None;
        }
        let mut thread = thread.clone();
        let members = Arc::make_mut(&mut thread.participants);
        for participant in fresh {
            members.insert(participant.id(), participant.clone());
        }
        Some(thread)
    })
}

/// Remove members along with their typing indicators.
pub(super) fn participants_removed(
    state: &Arc<Snapshot>,
    thread_id: &ThreadId,
    participant_ids: &[ParticipantId],
) -> Arc<Snapshot> {
    update_thread(state, thread_id, |thread| {
        let present = participant_ids.iter().any(|id| thread.participants.contains_key(id));
        let typing = thread.typing_indicators.iter().any(|t| participant_ids.contains(&t.sender));
        if !present && !typing {
            return None;
        }

        let mut thread = thread.clone();
        if present {
            let members = Arc::make_mut(&mut thread.participants);
            for id in participant_ids {
                members.remove(id);
            }
        }
        if typing {
            Arc::make_mut(&mut thread.typing_indicators)
                .retain(|t| !participant_ids.contains(&t.sender));
        }
        Some(thread)
    })
}

/// Insert in sequence order. A message from someone clears their indicator.
pub(super) fn message_received(
    state: &Arc<Snapshot>,
    thread_id: &ThreadId,
    message: &MessageState,
) -> Arc<Snapshot> {
    update_thread(state, thread_id, |thread| {
        if thread.message(&message.id).is_some() {
            return None;
        }

        let mut thread = thread.clone();
        let messages = Arc::make_mut(&mut thread.messages);
        let at = messages.partition_point(|m| m.sequence_id <= message.sequence_id);
        messages.insert(at, Arc::new(message.clone()));

        if let Some(sender) = &message.sender
            && thread.typing_indicators.iter().any(|t| &t.sender == sender)
        {
            Arc::make_mut(&mut thread.typing_indicators).retain(|t| &t.sender != sender);
        }
        Some(thread)
    })
}

fn update_message(
    state: &Arc<Snapshot>,
    thread_id: &ThreadId,
    message_id: &MessageId,
    f: impl FnOnce(&MessageState) -> Option<MessageState>,
) -> Arc<Snapshot> {
    update_thread(state, thread_id, |thread| {
        let index = thread.messages.iter().position(|m| &m.id == message_id)?;
        let next = f(&thread.messages[index])?;
        let mut thread = thread.clone();
        Arc::make_mut(&mut thread.messages)[index] = Arc::new(next);
        Some(thread)
    })
}

/// Edits to a deleted message are dropped.
pub(super) fn message_edited(
    state: &Arc<Snapshot>,
    thread_id: &ThreadId,
    message_id: &MessageId,
    content: Option<&str>,
    edited_on: DateTime<Utc>,
) -> Arc<Snapshot> {
    update_message(state, thread_id, message_id, |message| {
        if message.is_deleted()
            || (message.content.as_deref() == content && message.edited_on == Some(edited_on))
        {
            return None;
        }
        Some(MessageState {
            content: content.map(str::to_owned),
            edited_on: Some(edited_on),
            ..message.clone()
        })
    })
}

pub(super) fn message_deleted(
    state: &Arc<Snapshot>,
    thread_id: &ThreadId,
    message_id: &MessageId,
    deleted_on: DateTime<Utc>,
) -> Arc<Snapshot> {
    update_message(state, thread_id, message_id, |message| {
        if message.is_deleted() {
            return None;
        }
        Some(MessageState { content: None, deleted_on: Some(deleted_on), ..message.clone() })
    })
}

/// One indicator per sender; an older notification never replaces a newer one.
pub(super) fn typing_indicator_received(
    state: &Arc<Snapshot>,
    thread_id: &ThreadId,
    indicator: &TypingIndicator,
) -> Arc<Snapshot> {
    update_thread(state, thread_id, |thread| {
        let existing = thread.typing_indicators.iter().position(|t| t.sender == indicator.sender);
        if let Some(index) = existing
            && thread.typing_indicators[index].received_on >= indicator.received_on
        {
            return None;
        }

        let mut thread = thread.clone();
        let indicators = Arc::make_mut(&mut thread.typing_indicators);
        match existing {
            Some(index) => indicators[index] = indicator.clone(),
            None => indicators.push(indicator.clone()),
        }
        Some(thread)
    })
}

/// One receipt per reader, the latest by `read_on`.
pub(super) fn read_receipt_received(
    state: &Arc<Snapshot>,
    thread_id: &ThreadId,
    receipt: &ReadReceipt,
) -> Arc<Snapshot> {
    update_thread(state, thread_id, |thread| {
        let existing = thread.read_receipts.iter().position(|r| r.sender == receipt.sender);
        if let Some(index) = existing
            && thread.read_receipts[index].read_on >= receipt.read_on
        {
            return None;
        }

        let mut thread = thread.clone();
        let receipts = Arc::make_mut(&mut thread.read_receipts);
        match existing {
            Some(index) => receipts[index] = receipt.clone(),
            None => receipts.push(receipt.clone()),
        }
        Some(thread)
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::{CommunicationIdentifier, Event, reducer::reduce};

    fn at(seconds: i64) -> DateTime<Utc> {
        let base = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default();
        base + TimeDelta::seconds(seconds)
    }

    fn with_thread() -> Arc<Snapshot> {
        let state = Arc::new(Snapshot::new(CommunicationIdentifier::user("me")));
        reduce(&state, &Event::ThreadAdded { thread: ThreadState::new("t1".into()) })
    }

    fn text(id: &str, seq: u64, sender: &str) -> MessageState {
        MessageState::text(id.into(), seq, sender.into(), format!("body {id}"), at(seq as i64))
    }

    fn ids(state: &Snapshot) -> Vec<String> {
        state.threads[&ThreadId::from("t1")]
            .messages
            .iter()
            .map(|m| m.id.to_string())
            .collect()
    }

    #[test]
    fn out_of_order_messages_are_sorted_and_deduplicated() {
        let mut state = with_thread();
        let arrivals =
            [text("m3", 3, "a"), text("m1", 1, "b"), text("m2", 2, "a"), text("m1", 1, "b")];
        for message in arrivals {
            state = reduce(&state, &Event::MessageReceived { thread_id: "t1".into(), message });
        }
        assert_eq!(ids(&state), ["m1", "m2", "m3"]);
    }

    #[test]
    fn message_clears_sender_typing_indicator() {
        let state = with_thread();
        let state = reduce(&state, &Event::TypingIndicatorReceived {
            thread_id: "t1".into(),
            indicator: TypingIndicator {
                sender: "a".into(),
                sender_display_name: None,
                received_on: at(0),
            },
        });
        assert_eq!(state.threads[&ThreadId::from("t1")].typing_indicators.len(), 1);

        let state = reduce(&state, &Event::MessageReceived {
            thread_id: "t1".into(),
            message: text("m1", 1, "a"),
        });
        assert!(state.threads[&ThreadId::from("t1")].typing_indicators.is_empty());
    }

    #[test]
    fn edit_and_delete() {
        let state = reduce(&with_thread(), &Event::MessageReceived {
            thread_id: "t1".into(),
            message: text("m1", 1, "a"),
        });
        let state = reduce(&state, &Event::MessageEdited {
            thread_id: "t1".into(),
            message_id: "m1".into(),
            content: Some("fixed".into()),
            edited_on: at(5),
        });
        let message = &state.threads[&ThreadId::from("t1")].messages[0];
        assert_eq!(message.content.as_deref(), Some("fixed"));
        assert_eq!(message.edited_on, Some(at(5)));

        let state = reduce(&state, &Event::MessageDeleted {
            thread_id: "t1".into(),
            message_id: "m1".into(),
            deleted_on: at(6),
        });
        let message = &state.threads[&ThreadId::from("t1")].messages[0];
        assert!(message.is_deleted());
        assert_eq!(message.content, None);

        let late_edit = reduce(&state, &Event::MessageEdited {
            thread_id: "t1".into(),
            message_id: "m1".into(),
            content: Some("again".into()),
            edited_on: at(7),
        });
        assert!(Arc::ptr_eq(&state, &late_edit));
    }

    #[test]
    fn read_receipts_keep_latest_per_reader() {
        let receipt = |message: &str, seconds| ReadReceipt {
            sender: "a".into(),
            message_id: message.into(),
            read_on: at(seconds),
        };
        let state = reduce(&with_thread(), &Event::ReadReceiptReceived {
            thread_id: "t1".into(),
            receipt: receipt("m2", 10),
        });
        let stale = reduce(&state, &Event::ReadReceiptReceived {
            thread_id: "t1".into(),
            receipt: receipt("m1", 5),
        });
        assert!(Arc::ptr_eq(&state, &stale));

        let newer = reduce(&state, &Event::ReadReceiptReceived {
            thread_id: "t1".into(),
            receipt: receipt("m3", 20),
        });
        let receipts = &newer.threads[&ThreadId::from("t1")].read_receipts;
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].message_id, MessageId::from("m3"));
    }

    #[test]
    fn removing_a_member_drops_their_indicator() {
        let state = reduce(&with_thread(), &Event::ChatParticipantsAdded {
            thread_id: "t1".into(),
            participants: vec![ChatParticipant::new(CommunicationIdentifier::user("a"), None)],
        });
        let state = reduce(&state, &Event::TypingIndicatorReceived {
            thread_id: "t1".into(),
            indicator: TypingIndicator {
                sender: "a".into(),
                sender_display_name: None,
                received_on: at(1),
            },
        });
        let state = reduce(&state, &Event::ChatParticipantsRemoved {
            thread_id: "t1".into(),
            participant_ids: vec!["a".into()],
        });
        let thread = &state.threads[&ThreadId::from("t1")];
        assert!(thread.participants.is_empty());
        assert!(thread.typing_indicators.is_empty());
    }
}
