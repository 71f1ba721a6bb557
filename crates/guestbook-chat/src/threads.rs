//! Two-level thread reconstruction.
//!
//! The store is flat: a reply is just a row whose `reply_to_id` points at
//! a top-level row. The tree shape exists only in memory — assembled here
//! at read time, and mutated incrementally by live events on the client
//! side via [`ThreadView`].

use std::collections::HashMap;

use guestbook_types::events::ChatEvent;
use guestbook_types::models::{Message, MessageThread};

/// Group a flat page into threads. `top_level` keeps its (descending)
/// order; each reply lands under its parent in the order given
/// (ascending from the store). Replies whose parent is not in this page
/// are dropped, and a reply is never treated as a parent.
pub fn assemble(top_level: Vec<Message>, replies: Vec<Message>) -> Vec<MessageThread> {
    let mut threads: Vec<MessageThread> = top_level
        .into_iter()
        .filter(Message::is_top_level)
        .map(MessageThread::new)
        .collect();

    let index: HashMap<i64, usize> = threads
        .iter()
        .enumerate()
        .map(|(i, t)| (t.message.id, i))
        .collect();

    for reply in replies {
        let Some(parent_id) = reply.reply_to_id else {
            continue;
        };
        if let Some(&i) = index.get(&parent_id) {
            threads[i].replies.push(reply);
        }
    }

    threads
}

/// A viewer's local copy of the guestbook: threads in ascending display
/// order, oldest first.
///
/// Pages arrive newest-first from the server, so the initial load is
/// reversed, older pages are reversed and prepended, and live events
/// append. The reducer tolerates at-least-once delivery: applying the
/// same event twice leaves the view unchanged.
#[derive(Debug, Default)]
pub struct ThreadView {
    threads: Vec<MessageThread>,
}

impl ThreadView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(&self) -> &[MessageThread] {
        &self.threads
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Cursor for the next `load_messages` call: the oldest id on screen.
    pub fn oldest_id(&self) -> Option<i64> {
        self.threads.first().map(|t| t.message.id)
    }

    /// Replace the view with the first fetched page.
    pub fn load_initial(&mut self, mut page: Vec<MessageThread>) {
        page.reverse();
        self.threads = page;
    }

    /// Prepend an older page fetched with `cursor = oldest_id()`.
    pub fn prepend_older(&mut self, mut page: Vec<MessageThread>) {
        page.reverse();
        page.append(&mut self.threads);
        self.threads = page;
    }

    /// Fold one live event into the view. `messages_loaded` is not
    /// handled here — whether it is an initial or an older page depends
    /// on the request the caller made.
    pub fn apply(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::NewMessage(message) => self.insert(message),
            ChatEvent::MessageDeleted { id } => self.remove(*id),
            _ => {}
        }
    }

    fn insert(&mut self, message: &Message) {
        if let Some(parent_id) = message.reply_to_id {
            // A reply attaches under its top-level parent. If the parent
            // is not loaded (older page, or itself a reply), drop the
            // event: a reply without visible context is meaningless.
            if let Some(thread) = self
                .threads
                .iter_mut()
                .find(|t| t.message.id == parent_id)
            {
                if !thread.replies.iter().any(|r| r.id == message.id) {
                    thread.replies.push(message.clone());
                }
            }
            return;
        }

        if !self.threads.iter().any(|t| t.message.id == message.id) {
            self.threads.push(MessageThread::new(message.clone()));
        }
    }

    /// The deleted id may be a top-level message or a reply; we do not
    /// know which, so check both. Deleting a top-level message takes its
    /// replies with it.
    fn remove(&mut self, id: i64) {
        self.threads.retain(|t| t.message.id != id);
        for thread in &mut self.threads {
            thread.replies.retain(|r| r.id != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: i64, reply_to_id: Option<i64>) -> Message {
        Message {
            id,
            name: format!("guest-{}", id),
            content: format!("message {}", id),
            is_admin: false,
            reply_to_id,
            created_at: chrono::Utc::now(),
        }
    }

    fn thread(id: i64) -> MessageThread {
        MessageThread::new(message(id, None))
    }

    #[test]
    fn assemble_attaches_replies_under_parents() {
        let top = vec![message(10, None), message(8, None)];
        let replies = vec![message(11, Some(8)), message(12, Some(8)), message(13, Some(10))];

        let threads = assemble(top, replies);
        assert_eq!(threads[0].message.id, 10);
        assert_eq!(threads[0].replies.iter().map(|r| r.id).collect::<Vec<_>>(), vec![13]);
        assert_eq!(threads[1].replies.iter().map(|r| r.id).collect::<Vec<_>>(), vec![11, 12]);
    }

    #[test]
    fn assemble_drops_replies_without_a_parent_in_page() {
        let threads = assemble(vec![message(10, None)], vec![message(11, Some(5))]);
        assert!(threads[0].replies.is_empty());
    }

    #[test]
    fn assemble_never_nests_below_one_level() {
        // 12 replies to 11, which is itself a reply: 12 must not appear anywhere.
        let threads = assemble(
            vec![message(10, None), message(11, Some(10))],
            vec![message(12, Some(11))],
        );
        assert_eq!(threads.len(), 1);
        assert!(threads[0].replies.is_empty());
    }

    #[test]
    fn new_message_appends_in_display_order() {
        let mut view = ThreadView::new();
        assert!(view.is_empty());
        assert_eq!(view.oldest_id(), None);

        view.load_initial(vec![thread(10), thread(8)]);
        assert_eq!(view.oldest_id(), Some(8));

        view.apply(&ChatEvent::NewMessage(message(12, None)));
        let ids: Vec<i64> = view.threads().iter().map(|t| t.message.id).collect();
        assert_eq!(ids, vec![8, 10, 12]);
    }

    #[test]
    fn duplicate_new_message_is_ignored() {
        let mut view = ThreadView::new();
        let event = ChatEvent::NewMessage(message(5, None));
        view.apply(&event);
        view.apply(&event);
        assert_eq!(view.threads().len(), 1);
    }

    #[test]
    fn duplicate_reply_is_ignored() {
        let mut view = ThreadView::new();
        view.load_initial(vec![thread(10)]);
        let event = ChatEvent::NewMessage(message(11, Some(10)));
        view.apply(&event);
        view.apply(&event);
        assert_eq!(view.threads()[0].replies.len(), 1);
    }

    #[test]
    fn reply_without_loaded_parent_is_dropped() {
        let mut view = ThreadView::new();
        view.load_initial(vec![thread(10)]);
        view.apply(&ChatEvent::NewMessage(message(11, Some(4))));
        assert_eq!(view.threads().len(), 1);
        assert!(view.threads()[0].replies.is_empty());
    }

    #[test]
    fn delete_removes_top_level_thread_with_its_replies() {
        let mut view = ThreadView::new();
        view.load_initial(vec![thread(10), thread(8)]);
        view.apply(&ChatEvent::NewMessage(message(11, Some(10))));

        view.apply(&ChatEvent::MessageDeleted { id: 10 });
        let ids: Vec<i64> = view.threads().iter().map(|t| t.message.id).collect();
        assert_eq!(ids, vec![8]);
    }

    #[test]
    fn delete_removes_a_reply_from_its_thread() {
        let mut view = ThreadView::new();
        view.load_initial(vec![thread(10)]);
        view.apply(&ChatEvent::NewMessage(message(11, Some(10))));

        view.apply(&ChatEvent::MessageDeleted { id: 11 });
        assert_eq!(view.threads().len(), 1);
        assert!(view.threads()[0].replies.is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let mut view = ThreadView::new();
        view.load_initial(vec![thread(10), thread(8)]);
        view.apply(&ChatEvent::MessageDeleted { id: 10 });
        view.apply(&ChatEvent::MessageDeleted { id: 10 });
        assert_eq!(view.threads().len(), 1);
    }

    #[test]
    fn older_pages_prepend_and_live_updates_append() {
        let mut view = ThreadView::new();
        // Server pages are newest-first: [10, 8] then, older, [5].
        view.load_initial(vec![thread(10), thread(8)]);
        view.prepend_older(vec![thread(5)]);
        view.apply(&ChatEvent::NewMessage(message(12, None)));

        let ids: Vec<i64> = view.threads().iter().map(|t| t.message.id).collect();
        assert_eq!(ids, vec![5, 8, 10, 12]);
        assert_eq!(view.oldest_id(), Some(5));
    }
}
