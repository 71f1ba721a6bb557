//! Direct connection hub: strategy (b).
//!
//! Every viewer holds a live duplex connection to this process. Delivery
//! is exactly-once per connected viewer and simply lost for disconnected
//! ones — they re-fetch on reconnect. Because connections live here,
//! this strategy is also the one that can count presence.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::debug;

use guestbook_types::events::ChatEvent;

use crate::transport::Transport;

/// Events buffered per scope before slow receivers start lagging.
const SCOPE_CHANNEL_CAPACITY: usize = 1024;

struct ScopeState {
    tx: broadcast::Sender<ChatEvent>,
    online: usize,
}

impl ScopeState {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(SCOPE_CHANNEL_CAPACITY);
        Self { tx, online: 0 }
    }
}

/// Per-scope subscriber sets and presence counters behind one lock.
/// Critical sections only touch this in-memory state — never I/O — so
/// connects and disconnects never block an in-flight mutation for long.
pub struct LiveHub {
    scopes: Mutex<HashMap<String, ScopeState>>,
}

impl LiveHub {
    pub fn new() -> Self {
        Self {
            scopes: Mutex::new(HashMap::new()),
        }
    }

    /// Register a viewer connection on `scope`. Returns the new presence
    /// count and this connection's event feed; the count is also
    /// broadcast to every subscriber of the scope, this one included.
    pub fn connect(&self, scope: &str) -> (usize, broadcast::Receiver<ChatEvent>) {
        let mut scopes = self.scopes.lock().expect("live hub lock poisoned");
        let state = scopes.entry(scope.to_string()).or_insert_with(ScopeState::new);

        let rx = state.tx.subscribe();
        state.online += 1;
        let count = state.online;
        let _ = state.tx.send(ChatEvent::OnlineCount { count });
        (count, rx)
    }

    /// Remove a viewer connection. The count clamps at zero, so a
    /// duplicate disconnect (or one without a matching connect) can
    /// never drive it negative. Scope state is torn down once the last
    /// subscriber is gone.
    pub fn disconnect(&self, scope: &str) -> usize {
        let mut scopes = self.scopes.lock().expect("live hub lock poisoned");
        let Some(state) = scopes.get_mut(scope) else {
            return 0;
        };

        state.online = state.online.saturating_sub(1);
        let count = state.online;
        let _ = state.tx.send(ChatEvent::OnlineCount { count });

        if state.online == 0 && state.tx.receiver_count() == 0 {
            scopes.remove(scope);
            debug!("scope '{}' torn down", scope);
        }
        count
    }

    pub fn online_count(&self, scope: &str) -> usize {
        self.scopes
            .lock()
            .expect("live hub lock poisoned")
            .get(scope)
            .map_or(0, |state| state.online)
    }
}

impl Transport for LiveHub {
    fn name(&self) -> &'static str {
        "live"
    }

    fn publish(&self, scope: &str, event: ChatEvent) {
        let scopes = self.scopes.lock().expect("live hub lock poisoned");
        if let Some(state) = scopes.get(scope) {
            // send() errs when no receiver is connected — nothing to
            // deliver to, which is fine.
            let _ = state.tx.send(event);
        }
    }

    fn subscribe(&self, scope: &str) -> Option<broadcast::Receiver<ChatEvent>> {
        let mut scopes = self.scopes.lock().expect("live hub lock poisoned");
        let state = scopes.entry(scope.to_string()).or_insert_with(ScopeState::new);
        Some(state.tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_and_disconnect_track_the_count() {
        let hub = LiveHub::new();
        let (first, _rx1) = hub.connect("guestbook");
        let (second, _rx2) = hub.connect("guestbook");
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        assert_eq!(hub.disconnect("guestbook"), 1);
        assert_eq!(hub.online_count("guestbook"), 1);
    }

    #[test]
    fn count_never_goes_negative() {
        let hub = LiveHub::new();
        assert_eq!(hub.disconnect("guestbook"), 0);

        let (_, rx) = hub.connect("guestbook");
        drop(rx);
        assert_eq!(hub.disconnect("guestbook"), 0);
        assert_eq!(hub.disconnect("guestbook"), 0);
        assert_eq!(hub.online_count("guestbook"), 0);
    }

    #[test]
    fn count_stays_non_negative_under_interleavings() {
        let hub = LiveHub::new();
        let mut held = Vec::new();
        // Alternate extra disconnects with connects; the clamp holds throughout.
        for i in 0..20 {
            if i % 3 == 0 {
                hub.disconnect("guestbook");
            } else {
                held.push(hub.connect("guestbook").1);
            }
        }
        while !held.is_empty() {
            held.pop();
            hub.disconnect("guestbook");
        }
        assert_eq!(hub.online_count("guestbook"), 0);
    }

    #[test]
    fn every_presence_change_is_broadcast() {
        let hub = LiveHub::new();
        let (_, mut rx1) = hub.connect("guestbook");
        assert!(matches!(
            rx1.try_recv(),
            Ok(ChatEvent::OnlineCount { count: 1 })
        ));

        let (_, _rx2) = hub.connect("guestbook");
        assert!(matches!(
            rx1.try_recv(),
            Ok(ChatEvent::OnlineCount { count: 2 })
        ));

        hub.disconnect("guestbook");
        assert!(matches!(
            rx1.try_recv(),
            Ok(ChatEvent::OnlineCount { count: 1 })
        ));
    }

    #[test]
    fn publish_reaches_every_subscriber_in_order() {
        let hub = LiveHub::new();
        let (_, mut rx1) = hub.connect("guestbook");
        let (_, mut rx2) = hub.connect("guestbook");
        // Skip the presence events from the two connects.
        let _ = rx1.try_recv();
        let _ = rx1.try_recv();
        let _ = rx2.try_recv();

        hub.publish("guestbook", ChatEvent::MessageDeleted { id: 1 });
        hub.publish("guestbook", ChatEvent::MessageDeleted { id: 2 });

        for rx in [&mut rx1, &mut rx2] {
            assert!(matches!(rx.try_recv(), Ok(ChatEvent::MessageDeleted { id: 1 })));
            assert!(matches!(rx.try_recv(), Ok(ChatEvent::MessageDeleted { id: 2 })));
        }
    }

    #[test]
    fn publish_to_unknown_scope_is_a_no_op() {
        let hub = LiveHub::new();
        hub.publish("nowhere", ChatEvent::MessageDeleted { id: 1 });
    }

    #[test]
    fn scope_state_resets_after_teardown() {
        let hub = LiveHub::new();
        let (_, rx) = hub.connect("guestbook");
        drop(rx);
        hub.disconnect("guestbook");

        // Fresh scope: the next connect starts back at one.
        let (count, _rx) = hub.connect("guestbook");
        assert_eq!(count, 1);
    }
}
