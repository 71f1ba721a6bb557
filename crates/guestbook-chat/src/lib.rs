//! The guestbook synchronization engine.
//!
//! Mutations flow through one pipeline regardless of how they arrive:
//! authorize (privileged ops) → validate → persist → broadcast. The
//! broadcast side is pluggable: a deployment runs either the direct
//! connection hub ([`LiveHub`]) or the hosted relay publisher
//! ([`RelayPublisher`]) behind the same [`Transport`] capability, and
//! everything upstream of the transport behaves identically.

pub mod auth;
pub mod engine;
pub mod error;
pub mod hub;
pub mod threads;
pub mod transport;

pub use engine::{ChatEngine, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use error::ChatError;
pub use hub::Hub;
pub use threads::ThreadView;
pub use transport::{LiveHub, RelayPublisher, Transport};
