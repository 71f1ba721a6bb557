//! The two interchangeable delivery strategies.
//!
//! A deployment runs exactly one: either every viewer holds a duplex
//! connection to this process ([`LiveHub`]), or the server pushes events
//! to a hosted pub/sub relay and viewers subscribe there
//! ([`RelayPublisher`]). The hub and engine never know which.

pub mod live;
pub mod relay;

pub use live::LiveHub;
pub use relay::RelayPublisher;

use tokio::sync::broadcast;

use guestbook_types::events::ChatEvent;

pub trait Transport: Send + Sync {
    /// Strategy name for startup logs.
    fn name(&self) -> &'static str;

    /// Queue one committed event for delivery to every subscriber of
    /// `scope`. Fire-and-forget: delivery failures are the strategy's
    /// problem (logged, retried, or dropped there), never the
    /// committing request's.
    fn publish(&self, scope: &str, event: ChatEvent);

    /// Live per-scope event feed, for transports that own their
    /// subscribers. The hosted relay returns `None`: viewers attach to
    /// the relay service directly, the server never observes them, and
    /// consequently there is no presence signal either.
    fn subscribe(&self, scope: &str) -> Option<broadcast::Receiver<ChatEvent>>;
}
