use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageThread};

/// Events pushed from the server to viewers.
///
/// Both transport strategies carry the same envelope:
/// `{"type": "<event>", "data": <payload>}`. Delivery is at-least-once on
/// the hosted relay, so consumers must tolerate duplicates (the view
/// reducer dedups by message id).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ChatEvent {
    /// A message was committed to the store.
    NewMessage(Message),

    /// A message was removed. The id may belong to a top-level message or
    /// a reply; viewers must check both.
    MessageDeleted { id: i64 },

    /// Response to a `load_messages` request, delivered only to the
    /// requesting connection. Threads are in descending creation order.
    MessagesLoaded(Vec<MessageThread>),

    /// Live connection count for the scope. Only the direct-hub strategy
    /// emits this; the hosted relay has no connection lifecycle to count.
    OnlineCount { count: usize },

    /// A rejected operation, reported to the originating connection only.
    ErrorMessage { message: String },
}

impl ChatEvent {
    /// Wire name of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::MessagesLoaded(_) => "messages_loaded",
            Self::OnlineCount { .. } => "online_count",
            Self::ErrorMessage { .. } => "error_message",
        }
    }
}

/// Commands sent from a viewer to the server over the live connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// Post a guest message, optionally as a reply to a top-level message.
    SendMessage {
        name: String,
        content: String,
        #[serde(default)]
        reply_to_id: Option<i64>,
    },

    /// Post an operator reply. Requires a valid bearer token.
    AdminReply {
        content: String,
        reply_to_id: i64,
        token: String,
    },

    /// Delete a message by id. Requires a valid bearer token.
    AdminDelete { id: i64, token: String },

    /// Fetch a page of threads older than `cursor` (most recent page when
    /// absent). Answered with `messages_loaded` on this connection only.
    LoadMessages {
        #[serde(default)]
        cursor: Option<i64>,
    },
}
