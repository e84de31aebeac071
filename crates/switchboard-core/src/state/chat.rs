//! Chat thread and message records.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CommunicationIdentifier, MessageId, ParticipantId, ThreadId};

/// Kind of chat message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    /// Plain text.
    #[default]
    Text,
    /// HTML.
    Html,
    /// Rich-text HTML.
    #[serde(rename = "richtext/html")]
    RichTextHtml,
    /// System: topic changed.
    TopicUpdated,
    /// System: participants joined.
    ParticipantAdded,
    /// System: participants left.
    ParticipantRemoved,
}

impl MessageType {
    /// Authored by a participant rather than generated by the service.
    pub fn is_chat(self) -> bool {
        matches!(self, Self::Text | Self::Html | Self::RichTextHtml)
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageState {
    /// Message id, unique within the thread.
    pub id: MessageId,
    /// Server-assigned position in the thread.
    pub sequence_id: u64,
    /// Kind of message.
    pub message_type: MessageType,
    /// Body. `None` once deleted.
    pub content: Option<String>,
    /// Author, absent for system messages.
    pub sender: Option<ParticipantId>,
    /// Author display name at send time.
    pub sender_display_name: Option<String>,
    /// Creation time.
    pub created_on: DateTime<Utc>,
    /// Last edit time.
    pub edited_on: Option<DateTime<Utc>>,
    /// Deletion time.
    pub deleted_on: Option<DateTime<Utc>>,
    /// Application metadata.
    pub metadata: BTreeMap<String, String>,
}

impl MessageState {
    /// Text message from `sender`.
    pub fn text(
        id: MessageId,
        sequence_id: u64,
        sender: ParticipantId,
        content: impl Into<String>,
        created_on: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sequence_id,
            message_type: MessageType::Text,
            content: Some(content.into()),
            sender: Some(sender),
            sender_display_name: None,
            created_on,
            edited_on: None,
            deleted_on: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Message has been deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_on.is_some()
    }
}

/// A member of a chat thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParticipant {
    /// SDK identifier.
    pub identifier: CommunicationIdentifier,
    /// Display name if known.
    pub display_name: Option<String>,
    /// History visible to this participant starts here.
    pub share_history_time: Option<DateTime<Utc>>,
}

impl ChatParticipant {
    /// Participant with a display name.
    pub fn new(identifier: CommunicationIdentifier, display_name: Option<String>) -> Self {
        Self { identifier, display_name, share_history_time: None }
    }

    /// Flat id used as the map key.
    pub fn id(&self) -> ParticipantId {
        self.identifier.to_flat()
    }
}

/// Someone is typing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    /// Who is typing.
    pub sender: ParticipantId,
    /// Display name from the notification.
    pub sender_display_name: Option<String>,
    /// When the notification arrived.
    pub received_on: DateTime<Utc>,
}

/// A participant has read up to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    /// Reader.
    pub sender: ParticipantId,
    /// Message that was read.
    pub message_id: MessageId,
    /// When it was read.
    pub read_on: DateTime<Utc>,
}

/// A chat thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadState {
    /// Thread id.
    pub thread_id: ThreadId,
    /// Topic if set.
    pub topic: Option<String>,
    /// Members by flat id.
    pub participants: Arc<BTreeMap<ParticipantId, ChatParticipant>>,
    /// Messages ordered by `sequence_id`, ids unique.
    pub messages: Arc<Vec<Arc<MessageState>>>,
    /// At most one indicator per sender.
    pub typing_indicators: Arc<Vec<TypingIndicator>>,
    /// At most one receipt per reader, the latest.
    pub read_receipts: Arc<Vec<ReadReceipt>>,
}

impl ThreadState {
    /// Empty thread.
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            topic: None,
            participants: Arc::default(),
            messages: Arc::default(),
            typing_indicators: Arc::default(),
            read_receipts: Arc::default(),
        }
    }

    /// Message by id.
    pub fn message(&self, id: &MessageId) -> Option<&Arc<MessageState>> {
        self.messages.iter().find(|m| &m.id == id)
    }
}
