use thiserror::Error;

/// Errors reported to the originating client. A rejected operation leaves
/// the store and every subscriber's view unchanged: nothing is broadcast
/// unless the mutation committed.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Bad name/content, or a reply pointed at something that is not an
    /// existing top-level message. Rejected before persistence.
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, expired, or mis-signed operator token.
    #[error("Unauthorized.")]
    Unauthorized,

    /// Delete of a nonexistent id.
    #[error("Message #{0} not found")]
    NotFound(i64),

    /// No live channel on this deployment; clients stay on pull-only REST.
    #[error("Live connection unavailable.")]
    TransportUnavailable,

    /// Store failure. The detail is logged server-side; clients get a
    /// generic message.
    #[error("Internal error.")]
    Store(#[from] anyhow::Error),
}

impl ChatError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
