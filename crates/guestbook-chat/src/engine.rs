//! Transport-agnostic orchestration of every guestbook operation.
//!
//! The REST handlers and the live gateway both call into [`ChatEngine`],
//! so authorization, validation, persistence and broadcast behave
//! identically no matter how a request arrived. Mutations follow one
//! pipeline: authorize (privileged ops) → validate → persist →
//! broadcast. Reads never broadcast.

use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::broadcast;
use tracing::{error, info};

use guestbook_store::Database;
use guestbook_store::models::MessageRow;
use guestbook_types::events::ChatEvent;
use guestbook_types::models::{Message, MessageThread};

use crate::auth::Authorizer;
use crate::error::ChatError;
use crate::hub::Hub;
use crate::threads;
use crate::transport::Transport;

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 200;

const MAX_NAME_CHARS: usize = 50;
const MAX_CONTENT_CHARS: usize = 500;

/// Operator replies post under a fixed display name.
const ADMIN_NAME: &str = "Admin";

pub struct ChatEngine {
    db: Arc<Database>,
    hub: Hub,
    authorizer: Authorizer,
    scope: String,
}

impl ChatEngine {
    pub fn new(
        db: Arc<Database>,
        transport: Arc<dyn Transport>,
        jwt_secret: &str,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            db,
            hub: Hub::new(transport),
            authorizer: Authorizer::new(jwt_secret),
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Live event feed, when the deployed transport keeps subscribers in
    /// this process. `None` on hosted-relay deployments.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<ChatEvent>> {
        self.hub.subscribe(&self.scope)
    }

    /// Post a guest message, optionally as a reply to a top-level
    /// message. On success every subscriber sees one `new_message`.
    pub async fn send_message(
        &self,
        name: &str,
        content: &str,
        reply_to_id: Option<i64>,
    ) -> Result<Message, ChatError> {
        let (name, content) = validate_guest(name, content)?;

        let guard = self.hub.lock_scope(&self.scope).await;
        let row = self
            .run_store(move |db| {
                if let Some(parent) = reply_to_id {
                    check_reply_target(db, parent)?;
                }
                Ok(db.create(&name, &content, false, reply_to_id)?)
            })
            .await?;

        let message = row.into_message();
        info!("Message #{} posted by '{}'", message.id, message.name);
        self.hub.message_created(guard, message.clone());
        Ok(message)
    }

    /// Post an operator reply under the fixed admin identity. The token
    /// is checked first: an unauthorized caller learns nothing about the
    /// reply target.
    pub async fn admin_reply(
        &self,
        content: &str,
        reply_to_id: i64,
        token: &str,
    ) -> Result<Message, ChatError> {
        self.authorizer.verify(token)?;
        let content = validate_admin_content(content)?;

        let guard = self.hub.lock_scope(&self.scope).await;
        let row = self
            .run_store(move |db| {
                check_reply_target(db, reply_to_id)?;
                Ok(db.create(ADMIN_NAME, &content, true, Some(reply_to_id))?)
            })
            .await?;

        let message = row.into_message();
        info!("Admin reply #{} to #{}", message.id, reply_to_id);
        self.hub.message_created(guard, message.clone());
        Ok(message)
    }

    /// Delete any message by id. A missing id is `NotFound` and nothing
    /// is broadcast; on success subscribers see one `message_deleted`.
    pub async fn admin_delete(&self, id: i64, token: &str) -> Result<(), ChatError> {
        self.authorizer.verify(token)?;

        let guard = self.hub.lock_scope(&self.scope).await;
        let deleted = self.run_store(move |db| Ok(db.delete(id)?)).await?;
        if !deleted {
            return Err(ChatError::NotFound(id));
        }

        info!("Message #{} deleted", id);
        self.hub.message_deleted(guard, id);
        Ok(())
    }

    /// One backward page of threads, newest first, each top-level message
    /// carrying its full reply list oldest first. With a cursor, only
    /// messages with `id` strictly below it are returned.
    pub async fn load_messages(
        &self,
        cursor: Option<i64>,
        limit: u32,
    ) -> Result<Vec<MessageThread>, ChatError> {
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);

        let (page, replies) = self
            .run_store(move |db| {
                let page = db.top_level_page(cursor, limit)?;
                let parent_ids: Vec<i64> = page.iter().map(|row| row.id).collect();
                let replies = db.replies_for(&parent_ids)?;
                Ok((page, replies))
            })
            .await?;

        let top_level: Vec<Message> = page.into_iter().map(MessageRow::into_message).collect();
        let replies: Vec<Message> = replies.into_iter().map(MessageRow::into_message).collect();
        Ok(threads::assemble(top_level, replies))
    }

    /// Total stored messages, replies included.
    pub async fn message_count(&self) -> Result<i64, ChatError> {
        self.run_store(|db| Ok(db.count()?)).await
    }

    /// Run a store closure on the blocking pool; rusqlite must stay off
    /// the async runtime.
    async fn run_store<T, F>(&self, f: F) -> Result<T, ChatError>
    where
        F: FnOnce(&Database) -> Result<T, ChatError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ChatError::Store(anyhow!("store task failed: {}", e))
            })?
    }
}

fn validate_guest(name: &str, content: &str) -> Result<(String, String), ChatError> {
    let name = name.trim();
    let content = content.trim();
    if name.is_empty() || content.is_empty() {
        return Err(ChatError::validation("Name and content are required."));
    }
    if name.chars().count() > MAX_NAME_CHARS || content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ChatError::validation(
            "Name (max 50) or content (max 500) too long.",
        ));
    }
    Ok((name.to_string(), content.to_string()))
}

fn validate_admin_content(content: &str) -> Result<String, ChatError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ChatError::validation("Content is required."));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ChatError::validation("Content too long (max 500)."));
    }
    Ok(content.to_string())
}

/// A reply may only attach to an existing top-level message; anything
/// else is rejected before the insert.
fn check_reply_target(db: &Database, id: i64) -> Result<(), ChatError> {
    match db.find(id)? {
        Some(row) if row.reply_to_id.is_none() => Ok(()),
        _ => Err(ChatError::validation(
            "Reply target not found or not a top-level message.",
        )),
    }
}
