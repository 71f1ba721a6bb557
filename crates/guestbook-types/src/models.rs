use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single guestbook entry. Immutable once created: entries can be
/// deleted but never edited.
///
/// Wire JSON is camelCase so both transport strategies serialize the
/// identical client-observable shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Assigned by the store at creation; strictly increasing, never reused.
    pub id: i64,
    pub name: String,
    pub content: String,
    /// True only for operator-authored messages.
    pub is_admin: bool,
    /// Present on replies. The target is always a top-level message.
    pub reply_to_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_top_level(&self) -> bool {
        self.reply_to_id.is_none()
    }
}

/// A top-level message with its replies in ascending creation order.
///
/// The tree is never persisted — it is reconstructed from flat rows at
/// read time and mutated incrementally by live events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageThread {
    #[serde(flatten)]
    pub message: Message,
    #[serde(default)]
    pub replies: Vec<Message>,
}

impl MessageThread {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            replies: Vec::new(),
        }
    }
}
