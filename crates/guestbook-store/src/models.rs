//! Database row types — these map directly to SQLite rows.
//! Distinct from the guestbook-types wire model to keep the store layer
//! independent of serialization concerns.

use guestbook_types::models::Message;
use tracing::warn;

pub struct MessageRow {
    pub id: i64,
    pub name: String,
    pub content: String,
    pub is_admin: bool,
    pub reply_to_id: Option<i64>,
    pub created_at: String,
}

impl MessageRow {
    /// Convert into the wire model. SQLite's `datetime('now')` default
    /// stores `YYYY-MM-DD HH:MM:SS` without a timezone, so fall back to a
    /// naive-UTC parse when the RFC 3339 one fails.
    pub fn into_message(self) -> Message {
        let created_at = self
            .created_at
            .parse::<chrono::DateTime<chrono::Utc>>()
            .or_else(|_| {
                chrono::NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| ndt.and_utc())
            })
            .unwrap_or_else(|e| {
                warn!(
                    "Corrupt created_at '{}' on message #{}: {}",
                    self.created_at, self.id, e
                );
                chrono::DateTime::default()
            });

        Message {
            id: self.id,
            name: self.name,
            content: self.content,
            is_admin: self.is_admin,
            reply_to_id: self.reply_to_id,
            created_at,
        }
    }
}
