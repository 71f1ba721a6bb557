//! The strategy-agnostic fan-out point.
//!
//! Committed mutations become events here, exactly once, in commit order.
//! Callers take the per-scope sequencing guard before writing to the
//! store and hand it to [`Hub::message_created`] / [`Hub::message_deleted`]
//! afterwards, so for any one scope no publish can overtake another and a
//! failed commit (guard dropped on the error path) broadcasts nothing.
//! Scopes are independent: mutations on different scopes never wait on
//! each other.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedMutexGuard, broadcast};
use tracing::debug;

use guestbook_types::events::ChatEvent;
use guestbook_types::models::Message;

use crate::transport::Transport;

/// How many recently published events each scope remembers for duplicate
/// suppression. Ids are store-assigned and unique, so duplicates only
/// come from redundant commit notifications (e.g. a retried request).
const DEDUP_WINDOW: usize = 256;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum PublishKey {
    Created(i64),
    Deleted(i64),
}

#[derive(Default)]
struct RecentPublishes {
    order: VecDeque<PublishKey>,
    seen: HashSet<PublishKey>,
}

impl RecentPublishes {
    /// Record a key; false means it was already published within the window.
    fn insert(&mut self, key: PublishKey) -> bool {
        if !self.seen.insert(key) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > DEDUP_WINDOW {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

/// Holding this gates all mutations on one scope: the store write and the
/// matching publish happen under it, which is what keeps per-subscriber
/// delivery in commit order.
pub struct ScopeGuard {
    scope: String,
    recent: OwnedMutexGuard<RecentPublishes>,
}

pub struct Hub {
    transport: Arc<dyn Transport>,
    scopes: Mutex<HashMap<String, Arc<tokio::sync::Mutex<RecentPublishes>>>>,
}

impl Hub {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            scopes: Mutex::new(HashMap::new()),
        }
    }

    /// Enter the sequencing point for `scope`. Held across persist +
    /// publish; cross-scope callers proceed in parallel.
    pub async fn lock_scope(&self, scope: &str) -> ScopeGuard {
        let cell = {
            let mut scopes = self.scopes.lock().expect("hub scope map lock poisoned");
            scopes
                .entry(scope.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(RecentPublishes::default())))
                .clone()
        };
        ScopeGuard {
            scope: scope.to_string(),
            recent: cell.lock_owned().await,
        }
    }

    /// Announce a committed create. Consumes the guard: publishing is the
    /// last thing that happens in the critical section.
    pub fn message_created(&self, mut guard: ScopeGuard, message: Message) {
        if guard.recent.insert(PublishKey::Created(message.id)) {
            self.transport
                .publish(&guard.scope, ChatEvent::NewMessage(message));
        } else {
            debug!(
                "suppressed duplicate new_message #{} on '{}'",
                message.id, guard.scope
            );
        }
    }

    /// Announce a committed delete.
    pub fn message_deleted(&self, mut guard: ScopeGuard, id: i64) {
        if guard.recent.insert(PublishKey::Deleted(id)) {
            self.transport
                .publish(&guard.scope, ChatEvent::MessageDeleted { id });
        } else {
            debug!("suppressed duplicate message_deleted #{} on '{}'", id, guard.scope);
        }
    }

    /// Live event feed for `scope`, when the deployed transport keeps its
    /// own subscribers. The hosted relay does not: viewers attach to the
    /// relay service directly.
    pub fn subscribe(&self, scope: &str) -> Option<broadcast::Receiver<ChatEvent>> {
        self.transport.subscribe(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records publishes instead of delivering them.
    struct RecordingTransport {
        published: Mutex<Vec<(String, ChatEvent)>>,
    }

    impl RecordingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                published: Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<(String, ChatEvent)> {
            self.published.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn publish(&self, scope: &str, event: ChatEvent) {
            self.published.lock().unwrap().push((scope.into(), event));
        }

        fn subscribe(&self, _scope: &str) -> Option<broadcast::Receiver<ChatEvent>> {
            None
        }
    }

    fn message(id: i64) -> Message {
        Message {
            id,
            name: "guest".into(),
            content: "hi".into(),
            is_admin: false,
            reply_to_id: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_create_is_suppressed() {
        let transport = RecordingTransport::new();
        let hub = Hub::new(transport.clone());

        let guard = hub.lock_scope("guestbook").await;
        hub.message_created(guard, message(1));
        let guard = hub.lock_scope("guestbook").await;
        hub.message_created(guard, message(1));

        assert_eq!(transport.events().len(), 1);
    }

    #[tokio::test]
    async fn create_and_delete_of_same_id_are_distinct_events() {
        let transport = RecordingTransport::new();
        let hub = Hub::new(transport.clone());

        let guard = hub.lock_scope("guestbook").await;
        hub.message_created(guard, message(1));
        let guard = hub.lock_scope("guestbook").await;
        hub.message_deleted(guard, 1);

        let events = transport.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].1.kind(), "new_message");
        assert_eq!(events[1].1.kind(), "message_deleted");
    }

    #[tokio::test]
    async fn dedup_window_is_bounded() {
        let transport = RecordingTransport::new();
        let hub = Hub::new(transport.clone());

        for id in 0..(DEDUP_WINDOW as i64 + 1) {
            let guard = hub.lock_scope("guestbook").await;
            hub.message_created(guard, message(id));
        }
        // Id 0 has been evicted from the window, so it publishes again.
        let guard = hub.lock_scope("guestbook").await;
        hub.message_created(guard, message(0));

        assert_eq!(transport.events().len(), DEDUP_WINDOW + 2);
    }

    #[tokio::test]
    async fn scopes_do_not_share_dedup_state() {
        let transport = RecordingTransport::new();
        let hub = Hub::new(transport.clone());

        let guard = hub.lock_scope("a").await;
        hub.message_created(guard, message(1));
        let guard = hub.lock_scope("b").await;
        hub.message_created(guard, message(1));

        assert_eq!(transport.events().len(), 2);
    }
}
