//! Chat view-models.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use switchboard_core::{
    MessageId, ParticipantId,
    state::{ChatParticipant, MessageState, MessageType, ReadReceipt, TypingIndicator},
};

use crate::{ChatProps, Selector, base};

/// Typing indicators older than this are not shown.
pub const TYPING_INDICATOR_MAX_AGE: TimeDelta = TimeDelta::seconds(8);

/// How a message bubble joins its neighbours from the same sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Attached {
    /// First of a run.
    Top,
    /// Inside a run.
    Middle,
    /// Last of a run.
    Bottom,
    /// Stands alone.
    None,
}

impl Attached {
    fn from_neighbours(joins_previous: bool, joins_next: bool) -> Self {
        match (joins_previous, joins_next) {
            (false, true) => Self::Top,
            (true, true) => Self::Middle,
            (true, false) => Self::Bottom,
            (false, false) => Self::None,
        }
    }
}

/// Delivery state of the local user's own message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageStatus {
    /// Stored by the service.
    Delivered,
    /// Some other participant has read it.
    Seen,
}

/// A participant-authored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message id.
    pub message_id: MessageId,
    /// Position in the thread.
    pub sequence_id: u64,
    /// Text, HTML, or rich text.
    pub content_type: MessageType,
    /// Body. `None` once deleted.
    pub content: Option<String>,
    /// Author.
    pub sender_id: Option<ParticipantId>,
    /// Author display name.
    pub sender_display_name: Option<String>,
    /// Creation time.
    pub created_on: DateTime<Utc>,
    /// Last edit.
    pub edited_on: Option<DateTime<Utc>>,
    /// Deletion time.
    pub deleted_on: Option<DateTime<Utc>>,
    /// Sent by the local user.
    pub mine: bool,
    /// Grouping with neighbouring messages.
    pub attached: Attached,
    /// Set on the local user's messages only.
    pub status: Option<MessageStatus>,
}

/// A message generated by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMessage {
    /// Message id.
    pub message_id: MessageId,
    /// Position in the thread.
    pub sequence_id: u64,
    /// Topic change, join, or leave.
    pub system_message_type: MessageType,
    /// Body, if any.
    pub content: Option<String>,
    /// Creation time.
    pub created_on: DateTime<Utc>,
}

/// One entry of the message thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "messageType", rename_all = "camelCase")]
pub enum ThreadMessage {
    /// Participant message.
    Chat(ChatMessage),
    /// Service message.
    System(SystemMessage),
}

/// The message thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageThread {
    /// Flat id of the local user.
    pub user_id: ParticipantId,
    /// Messages in sequence order.
    pub messages: Vec<ThreadMessage>,
}

/// Someone currently typing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUser {
    /// Flat identifier.
    pub user_id: ParticipantId,
    /// Display name, from the member list when known.
    pub display_name: Option<String>,
}

/// Typing indicator bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicators {
    /// Users typing right now, excluding the local user.
    pub typing_users: Vec<TypingUser>,
}

/// One row of the chat member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParticipantRow {
    /// Flat identifier.
    pub user_id: ParticipantId,
    /// Display name.
    pub display_name: Option<String>,
}

/// Chat member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParticipantList {
    /// Members.
    pub participants: Vec<ChatParticipantRow>,
    /// Flat id of the local user.
    pub my_user_id: ParticipantId,
}

/// Send box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBox {
    /// Flat id of the local user.
    pub user_id: ParticipantId,
    /// Local display name.
    pub display_name: Option<String>,
}

type Participants = Option<Arc<BTreeMap<ParticipantId, ChatParticipant>>>;

/// Selector for [`MessageThread`].
pub type MessageThreadSelector = Selector<
    ChatProps,
    (ParticipantId, Option<Arc<Vec<Arc<MessageState>>>>, Option<Arc<Vec<ReadReceipt>>>),
    MessageThread,
>;

/// Selector for [`TypingIndicators`].
pub type TypingIndicatorSelector = Selector<
    ChatProps,
    (ParticipantId, Option<Arc<Vec<TypingIndicator>>>, Participants, DateTime<Utc>),
    TypingIndicators,
>;

/// Selector for [`ChatParticipantList`].
pub type ChatParticipantListSelector =
    Selector<ChatProps, (ParticipantId, Participants), ChatParticipantList>;

/// Selector for [`SendBox`].
pub type SendBoxSelector = Selector<ChatProps, (ParticipantId, Option<String>), SendBox>;

/// Highest sequence id another participant has read.
fn seen_up_to(
    user_id: &ParticipantId,
    messages: &[Arc<MessageState>],
    receipts: &[ReadReceipt],
) -> Option<u64> {
    receipts
        .iter()
        .filter(|r| &r.sender != user_id)
        .filter_map(|r| messages.iter().find(|m| m.id == r.message_id))
        .map(|m| m.sequence_id)
        .max()
}

fn thread_messages(
    user_id: &ParticipantId,
    messages: &[Arc<MessageState>],
    receipts: &[ReadReceipt],
) -> Vec<ThreadMessage> {
    let seen = seen_up_to(user_id, messages, receipts);
    let author = |i: usize| {
        messages.get(i).filter(|m| m.message_type.is_chat()).and_then(|m| m.sender.as_ref())
    };

    messages
        .iter()
        .enumerate()
        .map(|(i, message)| {
            if !message.message_type.is_chat() {
                return ThreadMessage::System(SystemMessage {
                    message_id: message.id.clone(),
                    sequence_id: message.sequence_id,
                    system_message_type: message.message_type,
                    content: message.content.clone(),
                    created_on: message.created_on,
                });
            }

            let sender = message.sender.as_ref();
            let joins = |j: Option<usize>| sender.is_some() && j.and_then(author) == sender;
            let mine = sender == Some(user_id);
            let status = mine.then(|| {
                if seen.is_some_and(|s| message.sequence_id <= s) {
                    MessageStatus::Seen
                } else {
                    MessageStatus::Delivered
                }
            });

            ThreadMessage::Chat(ChatMessage {
                message_id: message.id.clone(),
                sequence_id: message.sequence_id,
                content_type: message.message_type,
                content: message.content.clone(),
                sender_id: message.sender.clone(),
                sender_display_name: message.sender_display_name.clone(),
                created_on: message.created_on,
                edited_on: message.edited_on,
                deleted_on: message.deleted_on,
                mine,
                attached: Attached::from_neighbours(joins(i.checked_sub(1)), joins(Some(i + 1))),
                status,
            })
        })
        .collect()
}

/// New [`MessageThread`] selector.
pub fn message_thread_selector() -> MessageThreadSelector {
    Selector::new(
        "message_thread",
        |state, props| {
            (base::user_id(state), base::messages(state, props), base::read_receipts(state, props))
        },
        |(user_id, messages, receipts)| MessageThread {
            user_id: user_id.clone(),
            messages: thread_messages(
                user_id,
                messages.as_deref().map_or(&[][..], Vec::as_slice),
                receipts.as_deref().map_or(&[][..], Vec::as_slice),
            ),
        },
    )
}

/// New [`TypingIndicators`] selector.
///
/// Only thread members other than the local user are shown, and only while
/// their indicator is younger than [`TYPING_INDICATOR_MAX_AGE`] at
/// [`ChatProps::now`].
/// A new `now` that leaves the visible set unchanged returns the previous
/// view-model.
pub fn typing_indicator_selector() -> TypingIndicatorSelector {
    Selector::new(
        "typing_indicator",
        |state, props| {
            (
                base::user_id(state),
                base::typing_indicators(state, props),
                base::chat_participants(state, props),
                props.now,
            )
        },
        |(user_id, indicators, participants, now)| {
            let typing_users = indicators
                .iter()
                .flat_map(|i| i.iter())
                .filter(|i| &i.sender != user_id)
                .filter(|i| *now - i.received_on < TYPING_INDICATOR_MAX_AGE)
                .filter_map(|i| {
                    let member = participants.as_deref()?.get(&i.sender)?;
                    Some(TypingUser {
                        user_id: i.sender.clone(),
                        display_name: member
                            .display_name
                            .clone()
                            .or_else(|| i.sender_display_name.clone()),
                    })
                })
                .collect();
            TypingIndicators { typing_users }
        },
    )
    .reusing_equal_output()
}

/// New [`ChatParticipantList`] selector.
pub fn chat_participant_list_selector() -> ChatParticipantListSelector {
    Selector::new(
        "chat_participant_list",
        |state, props| (base::user_id(state), base::chat_participants(state, props)),
        |(user_id, participants)| ChatParticipantList {
            participants: participants
                .iter()
                .flat_map(|p| p.iter())
                .map(|(id, p)| ChatParticipantRow {
                    user_id: id.clone(),
                    display_name: p.display_name.clone(),
                })
                .collect(),
            my_user_id: user_id.clone(),
        },
    )
}

/// New [`SendBox`] selector.
pub fn send_box_selector() -> SendBoxSelector {
    Selector::new(
        "send_box",
        |state, _| (base::user_id(state), base::display_name(state)),
        |(user_id, display_name)| SendBox {
            user_id: user_id.clone(),
            display_name: display_name.clone(),
        },
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use switchboard_core::{CommunicationIdentifier, Snapshot, ThreadId, state::ThreadState};

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).single().expect("valid timestamp")
    }

    fn thread_state(build: impl FnOnce(&mut ThreadState)) -> Snapshot {
        let mut state = Snapshot::new(CommunicationIdentifier::user("me"));
        let mut thread = ThreadState::new(ThreadId::from("t1"));
        for (id, name) in [("me", "Me"), ("ann", "Ann")] {
            let member = ChatParticipant::new(CommunicationIdentifier::user(id), Some(name.into()));
            Arc::make_mut(&mut thread.participants).insert(member.id(), member);
        }
        build(&mut thread);
        Arc::make_mut(&mut state.threads).insert(thread.thread_id.clone(), Arc::new(thread));
        state
    }

    fn text(id: &str, seq: u64, sender: &str) -> Arc<MessageState> {
        Arc::new(MessageState::text(id.into(), seq, sender.into(), id, at(0)))
    }

    #[test]
    fn runs_from_one_sender_are_attached() {
        let state = thread_state(|t| {
            t.messages = Arc::new(vec![
                text("m1", 1, "ann"),
                text("m2", 2, "ann"),
                text("m3", 3, "ann"),
                text("m4", 4, "me"),
            ]);
        });
        let thread = message_thread_selector().select(&state, &ChatProps::new("t1", at(0)));
        let attached: Vec<Attached> = thread
            .messages
            .iter()
            .filter_map(|m| match m {
                ThreadMessage::Chat(c) => Some(c.attached),
                ThreadMessage::System(_) => None,
            })
            .collect();
        assert_eq!(attached, [Attached::Top, Attached::Middle, Attached::Bottom, Attached::None]);
    }

    #[test]
    fn own_messages_are_seen_once_covered_by_a_receipt() {
        let state = thread_state(|t| {
            t.messages = Arc::new(vec![text("m1", 1, "me"), text("m2", 2, "me")]);
            t.read_receipts = Arc::new(vec![
                ReadReceipt { sender: "ann".into(), message_id: "m1".into(), read_on: at(1) },
                ReadReceipt { sender: "me".into(), message_id: "m2".into(), read_on: at(1) },
            ]);
        });
        let thread = message_thread_selector().select(&state, &ChatProps::new("t1", at(2)));
        let statuses: Vec<Option<MessageStatus>> = thread
            .messages
            .iter()
            .map(|m| match m {
                ThreadMessage::Chat(c) => c.status,
                ThreadMessage::System(_) => None,
            })
            .collect();
        assert_eq!(statuses, [Some(MessageStatus::Seen), Some(MessageStatus::Delivered)]);
    }

    #[test]
    fn deleted_and_system_messages_keep_their_position() {
        let state = thread_state(|t| {
            let mut deleted = MessageState::text("m1".into(), 1, "ann".into(), "oops", at(0));
            deleted.content = None;
            deleted.deleted_on = Some(at(3));
            let topic = MessageState {
                message_type: MessageType::TopicUpdated,
                sender: None,
                ..MessageState::text("m2".into(), 2, "ann".into(), "Standup", at(1))
            };
            t.messages = Arc::new(vec![Arc::new(deleted), Arc::new(topic), text("m3", 3, "me")]);
        });
        let thread = message_thread_selector().select(&state, &ChatProps::new("t1", at(4)));

        insta::assert_json_snapshot!(thread, @r#"
        {
          "userId": "me",
          "messages": [
            {
              "messageType": "chat",
              "messageId": "m1",
              "sequenceId": 1,
              "contentType": "text",
              "content": null,
              "senderId": "ann",
              "senderDisplayName": null,
              "createdOn": "2023-11-14T22:13:20Z",
              "editedOn": null,
              "deletedOn": "2023-11-14T22:13:23Z",
              "mine": false,
              "attached": "none",
              "status": null
            },
            {
              "messageType": "system",
              "messageId": "m2",
              "sequenceId": 2,
              "systemMessageType": "topicUpdated",
              "content": "Standup",
              "createdOn": "2023-11-14T22:13:21Z"
            },
            {
              "messageType": "chat",
              "messageId": "m3",
              "sequenceId": 3,
              "contentType": "text",
              "content": "m3",
              "senderId": "me",
              "senderDisplayName": null,
              "createdOn": "2023-11-14T22:13:20Z",
              "editedOn": null,
              "deletedOn": null,
              "mine": true,
              "attached": "none",
              "status": "delivered"
            }
          ]
        }
        "#);
    }

    #[test]
    fn stale_and_own_typing_indicators_are_hidden() {
        let indicator = |sender: &str, seconds| TypingIndicator {
            sender: sender.into(),
            sender_display_name: None,
            received_on: at(seconds),
        };
        let state = thread_state(|t| {
            t.typing_indicators =
                Arc::new(vec![indicator("ann", 0), indicator("me", 5), indicator("stranger", 5)]);
        });
        let mut selector = typing_indicator_selector();

        let fresh = selector.select(&state, &ChatProps::new("t1", at(7)));
        assert_eq!(fresh.typing_users, [TypingUser {
            user_id: "ann".into(),
            display_name: Some("Ann".into())
        }]);

        let stale = selector.select(&state, &ChatProps::new("t1", at(8)));
        assert!(stale.typing_users.is_empty());
    }

    #[test]
    fn clock_ticks_keep_the_same_typing_view_model() {
        let state = thread_state(|t| {
            t.typing_indicators = Arc::new(vec![TypingIndicator {
                sender: "ann".into(),
                sender_display_name: None,
                received_on: at(0),
            }]);
        });
        let mut selector = typing_indicator_selector();

        let first = selector.select(&state, &ChatProps::new("t1", at(1)));
        let later = selector.select(&state, &ChatProps::new("t1", at(6)));
        assert!(Arc::ptr_eq(&first, &later));
        assert_eq!(selector.recomputations(), 2);

        let expired = selector.select(&state, &ChatProps::new("t1", at(9)));
        assert!(expired.typing_users.is_empty());
        let still_expired = selector.select(&state, &ChatProps::new("t1", at(30)));
        assert!(Arc::ptr_eq(&expired, &still_expired));
    }
}
