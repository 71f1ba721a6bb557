//! REST surface of the guestbook.
//!
//! Handlers are thin: extract, call the engine, render. On hosted-relay
//! deployments this is the only inbound surface; on direct-hub
//! deployments it coexists with the live gateway and behaves
//! identically, because both call the same engine.

pub mod chat;
pub mod error;

pub use error::ApiError;
