//! Live connection handling for direct-hub deployments.
//!
//! Each WebSocket connection gets a forwarding task (scope broadcasts,
//! targeted replies, heartbeat) and a command-reading task. Commands go
//! through the same engine as REST requests, so a viewer sees identical
//! behavior on either surface.

pub mod connection;

pub use connection::{handle_connection, handle_unavailable};
